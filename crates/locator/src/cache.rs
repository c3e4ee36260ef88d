//! Per-key singleton instance cache.
//!
//! # Invariants
//!
//! - At most one instance is constructed per key, even when first resolutions race.
//!   - Enforced in: [`InstanceCache::get_or_try_insert`] (slot `init` lock held across construct-and-store).
//!   - Tested by: [`crate::locator::invariants::test_single_construction_per_key`]
//! - Resolutions of different keys never wait on each other's construction.
//!   - Enforced in: [`InstanceCache::slot`] (map lock released before construction).
//!   - Tested by: [`crate::locator::invariants::test_keys_do_not_block_each_other`]
//! - Keys whose construction failed hold no slot.
//!   - Enforced in: [`InstanceCache::get_or_try_insert`] (failed slot retired and removed).
//!   - Tested by: `tests::failing_keys_do_not_accumulate_slots`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::BoxError;

struct Slot<C: ?Sized> {
	init: Mutex<()>,
	value: OnceLock<Arc<C>>,
	/// Set under `init` when the slot is dropped from the map after a failure.
	retired: AtomicBool,
}

impl<C: ?Sized> Default for Slot<C> {
	fn default() -> Self {
		Self {
			init: Mutex::new(()),
			value: OnceLock::new(),
			retired: AtomicBool::new(false),
		}
	}
}

/// Map from key to shared instance. Only failed keys are ever removed.
pub(crate) struct InstanceCache<C: ?Sized> {
	slots: RwLock<FxHashMap<Box<str>, Arc<Slot<C>>>>,
	populated: AtomicUsize,
}

impl<C: ?Sized> Default for InstanceCache<C> {
	fn default() -> Self {
		Self {
			slots: RwLock::new(FxHashMap::default()),
			populated: AtomicUsize::new(0),
		}
	}
}

impl<C: ?Sized> InstanceCache<C> {
	/// Returns the instance cached under `key`, constructing it on first use.
	///
	/// A failed construction removes the key's slot; resolvers waiting on it
	/// start over with a fresh one.
	pub(crate) fn get_or_try_insert<F>(&self, key: &str, mut construct: F) -> Result<Arc<C>, BoxError>
	where
		F: FnMut() -> Result<Arc<C>, BoxError>,
	{
		loop {
			let slot = self.slot(key);
			if let Some(instance) = slot.value.get() {
				tracing::trace!(key, "singleton cache hit");
				return Ok(Arc::clone(instance));
			}

			let _init = slot.init.lock();
			if let Some(instance) = slot.value.get() {
				tracing::trace!(key, "singleton constructed by concurrent resolver");
				return Ok(Arc::clone(instance));
			}
			if slot.retired.load(Ordering::Acquire) {
				continue;
			}

			tracing::trace!(key, "singleton cache miss");
			match construct() {
				Ok(instance) => {
					let stored = Arc::clone(slot.value.get_or_init(|| instance));
					self.populated.fetch_add(1, Ordering::Relaxed);
					return Ok(stored);
				}
				Err(err) => {
					slot.retired.store(true, Ordering::Release);
					let mut slots = self.slots.write();
					if slots.get(key).is_some_and(|live| Arc::ptr_eq(live, &slot)) {
						slots.remove(key);
					}
					return Err(err);
				}
			}
		}
	}

	/// Number of keys with a slot, constructed or in progress.
	#[cfg(test)]
	fn slot_count(&self) -> usize {
		self.slots.read().len()
	}

	/// Number of keys holding a constructed instance.
	pub(crate) fn len(&self) -> usize {
		self.populated.load(Ordering::Relaxed)
	}

	fn slot(&self, key: &str) -> Arc<Slot<C>> {
		if let Some(slot) = self.slots.read().get(key) {
			return Arc::clone(slot);
		}
		let mut slots = self.slots.write();
		Arc::clone(slots.entry(Box::from(key)).or_default())
	}
}
