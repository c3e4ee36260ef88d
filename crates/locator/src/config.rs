//! Declarative wiring loaded from TOML.
//!
//! ```toml
//! [[binding]]
//! capability = "greeter"
//! implementation = "english"
//! lifetime = "singleton"
//! ```
//!
//! Names refer to entries of a [`Catalog`](crate::Catalog); see
//! [`Locator::apply`](crate::Locator::apply).

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::capability::Lifetime;
use crate::error::ConfigError;

/// Top-level locator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocatorConfig {
	/// Bindings applied in declaration order.
	#[serde(default, rename = "binding")]
	pub bindings: Vec<BindingConfig>,
}

/// One configured binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
	/// Catalog name of the capability.
	pub capability: String,
	/// Catalog name of the implementation.
	pub implementation: String,
	#[serde(default)]
	pub lifetime: Lifetime,
	/// Construct one instance before installing the binding. The first
	/// resolution receives it.
	#[serde(default)]
	pub verify: bool,
}

impl LocatorConfig {
	/// Parses a configuration from TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	/// Reads and parses a configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config = Self::from_toml_str(&text)?;
		tracing::debug!(path = %path.display(), bindings = config.bindings.len(), "loaded locator config");
		Ok(config)
	}
}

impl FromStr for LocatorConfig {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_toml_str(s)
	}
}
