//! Named capabilities and implementations for configuration-driven wiring.
//!
//! Typed registration checks contracts at compile time. When wiring comes
//! from a [`LocatorConfig`] the names are only known at runtime, so the
//! catalog records which capability each implementation provides and
//! [`Locator::apply`] rejects mismatches with [`BindingError`].

use std::any::{TypeId, type_name};
use std::fmt;

use rustc_hash::FxHashMap;

use crate::BoxError;
use crate::binding::{Binding, ErasedBinding};
use crate::capability::{Implementation, Lifetime};
use crate::config::{BindingConfig, LocatorConfig};
use crate::error::BindingError;
use crate::locator::Locator;

#[cfg(test)]
mod tests;

#[derive(Clone, Copy)]
struct CapabilityEntry {
	id: TypeId,
	type_name: &'static str,
}

struct ImplementationEntry {
	capability_id: TypeId,
	capability: &'static str,
	implementation: &'static str,
	/// Builds the binding; with `verify`, constructs its first instance up front.
	bind: Box<dyn Fn(Lifetime, bool) -> Result<ErasedBinding, BoxError> + Send + Sync>,
}

/// Name tables consulted by [`Locator::apply`].
#[derive(Default)]
pub struct Catalog {
	capabilities: FxHashMap<Box<str>, CapabilityEntry>,
	implementations: FxHashMap<Box<str>, ImplementationEntry>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Names capability `C`. A later entry with the same name replaces it.
	pub fn capability<C>(&mut self, name: &str) -> &mut Self
	where
		C: ?Sized + 'static,
	{
		let entry = CapabilityEntry {
			id: TypeId::of::<C>(),
			type_name: type_name::<C>(),
		};
		if self.capabilities.insert(Box::from(name), entry).is_some() {
			tracing::debug!(name, capability = entry.type_name, "catalog capability name replaced");
		}
		self
	}

	/// Names an implementation of `C`. A later entry with the same name replaces it.
	pub fn implementation<C>(&mut self, name: &str, implementation: Implementation<C>) -> &mut Self
	where
		C: ?Sized + Send + Sync + 'static,
	{
		let entry = ImplementationEntry {
			capability_id: TypeId::of::<C>(),
			capability: type_name::<C>(),
			implementation: implementation.name(),
			bind: Box::new(move |lifetime: Lifetime, verify: bool| -> Result<ErasedBinding, BoxError> {
				let binding = if verify {
					Binding::verified(implementation.clone(), lifetime)?
				} else {
					Binding::new(implementation.clone(), lifetime)
				};
				Ok(binding.erase())
			}),
		};
		if self.implementations.insert(Box::from(name), entry).is_some() {
			tracing::debug!(name, capability = type_name::<C>(), "catalog implementation name replaced");
		}
		self
	}

	/// Returns true if `name` is a known capability.
	pub fn has_capability(&self, name: &str) -> bool {
		self.capabilities.contains_key(name)
	}

	/// Returns true if `name` is a known implementation.
	pub fn has_implementation(&self, name: &str) -> bool {
		self.implementations.contains_key(name)
	}

	/// Builds the binding described by `entry` without installing it.
	pub(crate) fn bind(&self, entry: &BindingConfig) -> Result<ErasedBinding, BindingError> {
		let capability = self
			.capabilities
			.get(entry.capability.as_str())
			.ok_or_else(|| BindingError::UnknownCapability {
				name: entry.capability.clone(),
			})?;
		let implementation = self
			.implementations
			.get(entry.implementation.as_str())
			.ok_or_else(|| BindingError::UnknownImplementation {
				name: entry.implementation.clone(),
			})?;

		if implementation.capability_id != capability.id {
			return Err(BindingError::CapabilityMismatch {
				implementation: entry.implementation.clone(),
				expected: capability.type_name,
				provided: implementation.capability,
			});
		}

		(implementation.bind)(entry.lifetime, entry.verify).map_err(|source| BindingError::NotConstructible {
			capability: capability.type_name,
			implementation: implementation.implementation,
			source,
		})
	}
}

impl fmt::Debug for Catalog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut capabilities: Vec<_> = self.capabilities.keys().collect();
		capabilities.sort();
		let mut implementations: Vec<_> = self.implementations.keys().collect();
		implementations.sort();
		f.debug_struct("Catalog")
			.field("capabilities", &capabilities)
			.field("implementations", &implementations)
			.finish()
	}
}

impl Locator {
	/// Installs every binding of `config`, in order, using names from `catalog`.
	///
	/// Returns the number of bindings installed.
	///
	/// # Errors
	///
	/// Stops at the first entry that fails with a [`BindingError`]. That
	/// entry's capability keeps its previous binding; entries before it stay
	/// installed.
	pub fn apply(&self, config: &LocatorConfig, catalog: &Catalog) -> Result<usize, BindingError> {
		for (index, entry) in config.bindings.iter().enumerate() {
			let binding = catalog.bind(entry).inspect_err(|err| {
				tracing::warn!(index, capability = %entry.capability, implementation = %entry.implementation, error = %err, "config binding rejected");
			})?;
			self.install(binding);
		}
		tracing::debug!(bindings = config.bindings.len(), "applied locator config");
		Ok(config.bindings.len())
	}
}
