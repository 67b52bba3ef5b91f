//! Publishing side: answer interests under a prefix from a [`ContentStore`],
//! passing each outgoing [`Data`](ndnkit_primitives::Data) through a
//! [`Pipeline`] (typically a [`SigningStage`]).

#![warn(missing_docs)]

mod pipeline;
mod server;
mod signing;
mod store;

use ndnkit_face::FaceError;
use ndnkit_primitives::Name;

pub use pipeline::{Pipeline, ProcessingError, ProcessingStage};
pub use server::Server;
pub use signing::{SecurityError, Signer, SigningStage};
pub use store::{ContentStore, InMemoryContentStore};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The face refused the registration.
	#[error(transparent)]
	Face(#[from] FaceError),
	/// [`Server::open`] was called on an open server.
	#[error("server for {0} is already open")]
	AlreadyOpen(Name),
	/// Content was offered under a name the server does not answer for.
	#[error("{name} is outside the served prefix {prefix}")]
	OutsidePrefix {
		/// Prefix the server is registered under.
		prefix: Name,
		/// Name of the rejected content.
		name: Name,
	},
}
