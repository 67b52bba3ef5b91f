//! Signing of outgoing data through an external provider.

use std::fmt;
use std::sync::Arc;

use ndnkit_primitives::{Data, Name};

use crate::{ProcessingError, ProcessingStage};

/// Failure reported by a [`Signer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SecurityError {
	/// The provider has no default certificate.
	#[error("no default certificate")]
	NoCertificate,
	/// The provider does not hold the requested certificate.
	#[error("unknown certificate {0}")]
	UnknownCertificate(Name),
	/// The provider failed to produce a signature.
	#[error("signing failed: {0}")]
	Signing(String),
}

/// Signing provider. Key management and algorithms are its concern.
pub trait Signer: Send + Sync {
	/// Attaches a signature made with `certificate` to `data`.
	///
	/// # Errors
	///
	/// Returns an error if the certificate is unavailable or signing fails.
	fn sign(&self, data: &mut Data, certificate: &Name) -> Result<(), SecurityError>;

	/// Returns the certificate used when none is named explicitly.
	///
	/// # Errors
	///
	/// Returns [`SecurityError::NoCertificate`] if none is configured.
	fn default_certificate_name(&self) -> Result<Name, SecurityError>;
}

/// [`ProcessingStage`] signing each data packet with a fixed certificate.
pub struct SigningStage {
	signer: Arc<dyn Signer>,
	certificate: Name,
}

impl fmt::Debug for SigningStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SigningStage").field("certificate", &self.certificate).finish_non_exhaustive()
	}
}

impl SigningStage {
	/// Signs with `certificate`.
	pub fn new(signer: Arc<dyn Signer>, certificate: Name) -> Self {
		Self { signer, certificate }
	}

	/// Signs with the signer's default certificate, resolved once, now.
	///
	/// # Errors
	///
	/// Returns the signer's error if it has no default certificate.
	pub fn with_default_certificate(signer: Arc<dyn Signer>) -> Result<Self, SecurityError> {
		let certificate = signer.default_certificate_name()?;
		Ok(Self::new(signer, certificate))
	}

	/// Returns the certificate this stage signs with.
	pub fn certificate(&self) -> &Name {
		&self.certificate
	}
}

impl ProcessingStage<Data> for SigningStage {
	fn name(&self) -> &'static str {
		"signing"
	}

	fn process(&self, mut data: Data) -> Result<Data, ProcessingError> {
		self.signer.sign(&mut data, &self.certificate)?;
		tracing::trace!(name = %data.name(), certificate = %self.certificate, "server.signed");
		Ok(data)
	}
}
