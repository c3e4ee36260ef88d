#![cfg_attr(doc, allow(rustdoc::private_intra_doc_links))]
//! Capability registry and resolver.
//!
//! # Mental Model
//!
//! 1. **Registration:** [`Locator::register`] binds an [`Implementation`] to capability `C`
//!    with a [`Lifetime`]. The binding replaces any previous one for `C`.
//! 2. **Resolution:** [`Locator::resolve`] finds the binding for `C` and either constructs a
//!    fresh instance (transient) or returns the instance cached under the key (singleton).
//!
//! # Concurrency
//!
//! - **Reads:** Wait-free load of the current binding table.
//! - **Writes:** Lock-free, linearizable (CAS retry loop publishing a new table).
//! - **Singleton construction:** One lock per (capability, key) slot.
//!
//! # Invariants
//!
//! - Must never expose a partially written binding.
//!   - Enforced in: [`Locator::update`] (table published as a whole by compare-and-swap).
//!   - Tested by: [`crate::locator::invariants::test_no_lost_registrations`]
//!
//! - Must construct at most one singleton instance per (capability, key).
//!   - Enforced in: [`crate::cache::InstanceCache::get_or_try_insert`].
//!   - Tested by: [`crate::locator::invariants::test_single_construction_per_key`]
//!
//! - Must discard cached singletons when a capability is rebound.
//!   - Enforced in: [`crate::binding::Binding`] (cache owned by the binding).
//!   - Tested by: [`crate::locator::invariants::test_rebind_invalidates_cache`]

use std::any::{TypeId, type_name};
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use crate::binding::{Binding, ErasedBinding};
use crate::capability::{Implementation, Lifetime};
use crate::error::{BindingError, ResolveError};

#[cfg(any(test, doc))]
pub(crate) mod invariants;


type Table = FxHashMap<TypeId, ErasedBinding>;

/// Observable registration state of one capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingState {
	Unbound,
	Transient,
	Singleton,
}

impl From<Lifetime> for BindingState {
	fn from(lifetime: Lifetime) -> Self {
		match lifetime {
			Lifetime::Transient => Self::Transient,
			Lifetime::Singleton => Self::Singleton,
		}
	}
}

/// Summary of one registered capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingInfo {
	pub capability: &'static str,
	pub implementation: &'static str,
	pub lifetime: Lifetime,
	pub cached: usize,
}

/// Service locator mapping capability types to bindings.
pub struct Locator {
	table: ArcSwap<Table>,
}

impl Default for Locator {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Locator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Locator").field("bindings", &self.bindings()).finish()
	}
}

impl Locator {
	/// Creates a locator with no bindings.
	pub fn new() -> Self {
		Self {
			table: ArcSwap::from_pointee(Table::default()),
		}
	}

	/// Binds `implementation` to capability `C`, replacing any previous binding.
	///
	/// Singleton instances cached by the replaced binding are discarded.
	pub fn register<C>(&self, implementation: Implementation<C>, lifetime: impl Into<Lifetime>)
	where
		C: ?Sized + Send + Sync + 'static,
	{
		self.install(Binding::new(implementation, lifetime.into()).erase());
	}

	/// Like [`Locator::register`], but constructs one instance first.
	///
	/// That instance is not discarded: the first resolution that would
	/// construct receives it, so no extra construction happens.
	///
	/// # Errors
	///
	/// Returns [`BindingError::NotConstructible`] if that construction fails. The
	/// previous binding for `C`, if any, is kept.
	pub fn register_verified<C>(&self, implementation: Implementation<C>, lifetime: impl Into<Lifetime>) -> Result<(), BindingError>
	where
		C: ?Sized + Send + Sync + 'static,
	{
		let name = implementation.name();
		let binding = Binding::verified(implementation, lifetime.into()).map_err(|source| {
			tracing::warn!(capability = type_name::<C>(), implementation = name, error = %source, "verification construction failed");
			BindingError::NotConstructible {
				capability: type_name::<C>(),
				implementation: name,
				source,
			}
		})?;
		self.install(binding.erase());
		Ok(())
	}

	/// Resolves an instance of capability `C`.
	///
	/// Singleton bindings return the instance cached under `key`, constructing
	/// it on first use. Transient bindings ignore `key` and construct anew.
	///
	/// # Errors
	///
	/// - [`ResolveError::Unregistered`] if `C` has no binding.
	/// - [`ResolveError::Construction`] carrying the factory's own error.
	pub fn resolve<C>(&self, key: &str) -> Result<Arc<C>, ResolveError>
	where
		C: ?Sized + Send + Sync + 'static,
	{
		let binding = self.binding::<C>().ok_or(ResolveError::Unregistered {
			capability: type_name::<C>(),
		})?;
		binding.resolve(key).map_err(|err| {
			tracing::warn!(capability = type_name::<C>(), key, error = %err, "construction failed");
			ResolveError::Construction(err)
		})
	}

	/// Removes the binding for `C`. Returns whether one existed.
	pub fn unregister<C>(&self) -> bool
	where
		C: ?Sized + 'static,
	{
		let removed = self.update(|table| table.remove(&TypeId::of::<C>()));
		if let Some(old) = &removed {
			tracing::debug!(capability = old.capability, implementation = old.implementation, "unregistered capability");
		}
		removed.is_some()
	}

	/// Drops every binding and cached instance.
	pub fn reset(&self) {
		let old = self.table.swap(Arc::new(Table::default()));
		tracing::debug!(bindings = old.len(), "locator reset");
	}

	/// Returns the registration state of `C`.
	pub fn state<C>(&self) -> BindingState
	where
		C: ?Sized + 'static,
	{
		self.table
			.load()
			.get(&TypeId::of::<C>())
			.map_or(BindingState::Unbound, |binding| binding.lifetime.into())
	}

	/// Returns true if `C` has a binding.
	pub fn is_registered<C>(&self) -> bool
	where
		C: ?Sized + 'static,
	{
		self.table.load().contains_key(&TypeId::of::<C>())
	}

	/// Number of singleton instances currently cached for `C`.
	pub fn cached_instances<C>(&self) -> usize
	where
		C: ?Sized + 'static,
	{
		self.table.load().get(&TypeId::of::<C>()).map_or(0, ErasedBinding::cached)
	}

	/// Returns summaries of all bindings sorted by capability name.
	pub fn bindings(&self) -> Vec<BindingInfo> {
		let table = self.table.load_full();
		let mut infos: Vec<_> = table
			.values()
			.map(|binding| BindingInfo {
				capability: binding.capability,
				implementation: binding.implementation,
				lifetime: binding.lifetime,
				cached: binding.cached(),
			})
			.collect();
		infos.sort_by(|a, b| a.capability.cmp(b.capability));
		infos
	}

	/// Number of bound capabilities.
	pub fn len(&self) -> usize {
		self.table.load().len()
	}

	/// Returns true if no capability is bound.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn binding<C>(&self) -> Option<Arc<Binding<C>>>
	where
		C: ?Sized + Send + Sync + 'static,
	{
		self.table.load().get(&TypeId::of::<C>())?.downcast::<C>()
	}

	/// Publishes `binding`, replacing the previous binding of its capability.
	pub(crate) fn install(&self, binding: ErasedBinding) {
		let (capability, implementation, lifetime) = (binding.capability, binding.implementation, binding.lifetime);
		let previous = self.update(|table| table.insert(binding.capability_id, binding.clone()));

		match previous {
			None => tracing::debug!(capability, implementation, ?lifetime, "registered capability"),
			Some(old) => {
				tracing::debug!(capability, implementation, ?lifetime, previous = old.implementation, "rebound capability");
				let discarded = old.cached();
				if discarded > 0 {
					tracing::warn!(capability, discarded, "rebind discarded cached singleton instances");
				}
			}
		}
	}

	/// Applies `edit` to a copy of the table and publishes it atomically.
	///
	/// `edit` may run more than once under contention and must be idempotent
	/// with respect to the table it is given.
	fn update<R>(&self, mut edit: impl FnMut(&mut Table) -> R) -> R {
		loop {
			let old = self.table.load_full();
			let mut next = Table::clone(&old);
			let result = edit(&mut next);

			let prev = self.table.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return result;
			}
			// CAS failed, retry against the newer table
		}
	}
}
