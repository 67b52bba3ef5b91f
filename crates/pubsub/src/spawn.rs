use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

fn runtime_handle() -> std::io::Result<Handle> {
	if let Ok(handle) = Handle::try_current() {
		return Ok(handle);
	}

	static GLOBAL_RT: OnceLock<Runtime> = OnceLock::new();
	if let Some(runtime) = GLOBAL_RT.get() {
		return Ok(runtime.handle().clone());
	}
	let runtime = Builder::new_multi_thread()
		.enable_all()
		.worker_threads(1)
		.thread_name("ndnkit-pubsub")
		.build()?;
	Ok(GLOBAL_RT.get_or_init(|| runtime).handle().clone())
}

/// Spawns a background task on the current runtime, or on a shared fallback
/// runtime when called outside of one.
pub(crate) fn spawn<F>(task: &'static str, fut: F) -> std::io::Result<JoinHandle<F::Output>>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(task, "pubsub.spawn");
	Ok(runtime_handle()?.spawn(fut))
}
