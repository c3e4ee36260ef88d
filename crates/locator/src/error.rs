use std::path::PathBuf;

/// Error produced by an implementation's factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
	/// No binding exists for the requested capability.
	#[error("capability not registered: {capability}")]
	Unregistered { capability: &'static str },

	/// The implementation's factory failed; its error is passed through as-is.
	#[error(transparent)]
	Construction(BoxError),
}

impl ResolveError {
	/// Returns the factory's error if construction failed.
	pub fn construction(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
		match self {
			Self::Construction(err) => Some(err.as_ref()),
			Self::Unregistered { .. } => None,
		}
	}
}

/// Registration failures. The prior binding is left in place when one occurs.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
	#[error("unknown capability: {name:?}")]
	UnknownCapability { name: String },

	#[error("unknown implementation: {name:?}")]
	UnknownImplementation { name: String },

	/// The implementation satisfies a different capability than the one named.
	#[error("implementation {implementation:?} provides {provided}, not {expected}")]
	CapabilityMismatch {
		implementation: String,
		expected: &'static str,
		provided: &'static str,
	},

	/// Constructing an instance at registration time failed.
	#[error("implementation {implementation:?} of {capability} cannot be constructed: {source}")]
	NotConstructible {
		capability: &'static str,
		implementation: &'static str,
		#[source]
		source: BoxError,
	},
}

/// Locator configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read locator config {path}: {source}", path = .path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse locator config: {0}")]
	Parse(#[from] toml::de::Error),
}
