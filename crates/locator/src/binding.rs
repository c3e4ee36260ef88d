//! Binding records: a capability's implementation, sharing policy and cache.

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::BoxError;
use crate::cache::InstanceCache;
use crate::capability::{Implementation, Lifetime};

/// Typed binding for capability `C`.
///
/// The singleton cache is owned by the binding, so replacing or removing the
/// binding discards every instance it cached.
pub(crate) struct Binding<C: ?Sized> {
	implementation: Implementation<C>,
	lifetime: Lifetime,
	cache: InstanceCache<C>,
	/// Instance built while verifying the binding, handed out by the first construction.
	primed: Mutex<Option<Arc<C>>>,
	has_primed: AtomicBool,
}

impl<C: ?Sized + Send + Sync + 'static> Binding<C> {
	pub(crate) fn new(implementation: Implementation<C>, lifetime: Lifetime) -> Self {
		Self {
			implementation,
			lifetime,
			cache: InstanceCache::default(),
			primed: Mutex::new(None),
			has_primed: AtomicBool::new(false),
		}
	}

	/// Builds a binding after constructing one instance, which the first
	/// resolution then receives instead of constructing again.
	pub(crate) fn verified(implementation: Implementation<C>, lifetime: Lifetime) -> Result<Self, BoxError> {
		let instance = implementation.construct()?;
		let binding = Self::new(implementation, lifetime);
		*binding.primed.lock() = Some(instance);
		binding.has_primed.store(true, Ordering::Release);
		Ok(binding)
	}

	pub(crate) fn resolve(&self, key: &str) -> Result<Arc<C>, BoxError> {
		match self.lifetime {
			Lifetime::Transient => {
				tracing::trace!(implementation = self.implementation.name(), "constructing transient instance");
				self.construct()
			}
			Lifetime::Singleton => self.cache.get_or_try_insert(key, || self.construct()),
		}
	}

	fn construct(&self) -> Result<Arc<C>, BoxError> {
		if self.has_primed.load(Ordering::Acquire)
			&& let Some(instance) = self.primed.lock().take()
		{
			self.has_primed.store(false, Ordering::Release);
			tracing::trace!(implementation = self.implementation.name(), "handing out verified instance");
			return Ok(instance);
		}
		self.implementation.construct()
	}

	pub(crate) fn erase(self) -> ErasedBinding {
		ErasedBinding {
			capability_id: TypeId::of::<C>(),
			capability: type_name::<C>(),
			implementation: self.implementation.name(),
			lifetime: self.lifetime,
			record: Arc::new(self),
			cached: cached_len::<C>,
		}
	}
}

fn cached_len<C: ?Sized + Send + Sync + 'static>(record: &(dyn Any + Send + Sync)) -> usize {
	record.downcast_ref::<Binding<C>>().map_or(0, |binding| binding.cache.len())
}

/// Binding stored in the locator table, keyed by the capability's [`TypeId`].
#[derive(Clone)]
pub(crate) struct ErasedBinding {
	pub(crate) capability_id: TypeId,
	pub(crate) capability: &'static str,
	pub(crate) implementation: &'static str,
	pub(crate) lifetime: Lifetime,
	record: Arc<dyn Any + Send + Sync>,
	cached: fn(&(dyn Any + Send + Sync)) -> usize,
}

impl ErasedBinding {
	/// Recovers the typed binding. `None` if `C` is not the bound capability.
	pub(crate) fn downcast<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<Binding<C>>> {
		Arc::clone(&self.record).downcast::<Binding<C>>().ok()
	}

	/// Number of singleton instances cached by this binding.
	pub(crate) fn cached(&self) -> usize {
		(self.cached)(self.record.as_ref())
	}
}

impl std::fmt::Debug for ErasedBinding {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ErasedBinding")
			.field("capability", &self.capability)
			.field("implementation", &self.implementation)
			.field("lifetime", &self.lifetime)
			.finish_non_exhaustive()
	}
}
