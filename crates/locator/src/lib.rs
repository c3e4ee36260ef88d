//! Typed service locator.
//!
//! Callers bind an [`Implementation`] to a capability type (usually a trait
//! object such as `dyn Greeter`) and later resolve instances of it by string
//! key. Bindings are either [`Lifetime::Transient`] (a new instance per
//! resolution) or [`Lifetime::Singleton`] (one lazily constructed instance per
//! key, shared by every caller using that key).
//!
//! ```
//! use std::sync::Arc;
//!
//! use provisio_locator::{Implementation, Lifetime, Locator, provides};
//!
//! trait Greeter: Send + Sync {
//! 	fn greet(&self, name: &str) -> String;
//! }
//!
//! #[derive(Default)]
//! struct EnglishGreeter;
//!
//! impl Greeter for EnglishGreeter {
//! 	fn greet(&self, name: &str) -> String {
//! 		format!("Hello, {name}")
//! 	}
//! }
//!
//! provides!(EnglishGreeter => dyn Greeter);
//!
//! let locator = Locator::new();
//! locator.register(Implementation::<dyn Greeter>::of::<EnglishGreeter>(), Lifetime::Singleton);
//!
//! let a = locator.resolve::<dyn Greeter>("svc").unwrap();
//! let b = locator.resolve::<dyn Greeter>("svc").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(a.greet("Ada"), "Hello, Ada");
//! ```
//!
//! # Modules
//!
//! - [`locator`] - Binding table, registration and resolution
//! - [`capability`] - [`Provides`], [`Implementation`] and [`Lifetime`]
//! - [`catalog`] - Named capabilities/implementations for config-driven wiring
//! - [`config`] - TOML wiring format

use std::sync::{Arc, OnceLock};

mod binding;
mod cache;
pub mod capability;
pub mod catalog;
pub mod config;
mod error;
pub mod locator;

pub use capability::{Implementation, Lifetime, Provides};
pub use catalog::Catalog;
pub use config::{BindingConfig, LocatorConfig};
pub use error::{BindingError, BoxError, ConfigError, ResolveError};
pub use locator::{BindingInfo, BindingState, Locator};

/// Process-wide locator.
static GLOBAL: OnceLock<Locator> = OnceLock::new();

/// Returns the process-wide locator, creating it on first use.
///
/// Call [`Locator::reset`] on it to tear down state between tests.
pub fn global() -> &'static Locator {
	GLOBAL.get_or_init(Locator::new)
}

/// Registers on the [`global`] locator.
pub fn register<C>(implementation: Implementation<C>, lifetime: impl Into<Lifetime>)
where
	C: ?Sized + Send + Sync + 'static,
{
	global().register(implementation, lifetime);
}

/// Resolves from the [`global`] locator.
pub fn resolve<C>(key: &str) -> Result<Arc<C>, ResolveError>
where
	C: ?Sized + Send + Sync + 'static,
{
	global().resolve(key)
}
