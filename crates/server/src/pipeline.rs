use std::fmt;

use crate::SecurityError;

/// Failure of one [`ProcessingStage`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProcessingError {
	/// The signing provider failed.
	#[error("signing failed: {0}")]
	Security(#[from] SecurityError),
	/// Any other stage failure.
	#[error("stage {stage} failed: {reason}")]
	Stage {
		/// Name of the failing stage.
		stage: &'static str,
		/// What went wrong.
		reason: String,
	},
}

/// One transformation applied to every value passing through a [`Pipeline`].
pub trait ProcessingStage<T>: Send + Sync {
	/// Short name used in logs and errors.
	fn name(&self) -> &'static str;

	/// Transforms `value`.
	///
	/// # Errors
	///
	/// A failure aborts the whole pipeline run.
	fn process(&self, value: T) -> Result<T, ProcessingError>;
}

/// Ordered list of stages.
pub struct Pipeline<T> {
	stages: Vec<Box<dyn ProcessingStage<T>>>,
}

impl<T> Default for Pipeline<T> {
	fn default() -> Self {
		Self { stages: Vec::new() }
	}
}

impl<T> fmt::Debug for Pipeline<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.stages.iter().map(|s| s.name())).finish()
	}
}

impl<T> Pipeline<T> {
	/// Creates an empty pipeline, which passes values through unchanged.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `stage`.
	#[must_use]
	pub fn with_stage(mut self, stage: impl ProcessingStage<T> + 'static) -> Self {
		self.push(stage);
		self
	}

	/// Appends `stage`.
	pub fn push(&mut self, stage: impl ProcessingStage<T> + 'static) {
		self.stages.push(Box::new(stage));
	}

	/// Returns the number of stages.
	pub fn len(&self) -> usize {
		self.stages.len()
	}

	/// Returns true if there are no stages.
	pub fn is_empty(&self) -> bool {
		self.stages.is_empty()
	}

	/// Threads `value` through every stage in order.
	///
	/// # Errors
	///
	/// Returns the error of the first failing stage; later stages do not run.
	pub fn process(&self, value: T) -> Result<T, ProcessingError> {
		self.stages.iter().try_fold(value, |value, stage| {
			stage.process(value).inspect_err(|err| {
				tracing::warn!(stage = stage.name(), error = %err, "server.pipeline.failed");
			})
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Append(&'static str);

	impl ProcessingStage<String> for Append {
		fn name(&self) -> &'static str {
			"append"
		}

		fn process(&self, mut value: String) -> Result<String, ProcessingError> {
			value.push_str(self.0);
			Ok(value)
		}
	}

	struct Reject;

	impl ProcessingStage<String> for Reject {
		fn name(&self) -> &'static str {
			"reject"
		}

		fn process(&self, value: String) -> Result<String, ProcessingError> {
			Err(ProcessingError::Stage {
				stage: self.name(),
				reason: format!("refusing {value}"),
			})
		}
	}

	#[test]
	fn stages_run_in_order() {
		let pipeline = Pipeline::new().with_stage(Append("b")).with_stage(Append("c"));
		assert_eq!(pipeline.len(), 2);
		assert_eq!(pipeline.process("a".to_string()).expect("ok"), "abc");
	}

	#[test]
	fn empty_pipeline_is_identity() {
		let pipeline = Pipeline::<String>::new();
		assert!(pipeline.is_empty());
		assert_eq!(pipeline.process("x".to_string()).expect("ok"), "x");
	}

	#[test]
	fn first_failure_stops_the_run() {
		let pipeline = Pipeline::new().with_stage(Append("b")).with_stage(Reject).with_stage(Append("c"));
		match pipeline.process("a".to_string()) {
			Err(ProcessingError::Stage { stage, reason }) => {
				assert_eq!(stage, "reject");
				assert_eq!(reason, "refusing ab");
			}
			other => panic!("unexpected {other:?}"),
		}
	}
}
