#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

use crate::capability::{Implementation, Lifetime};
use crate::locator::Locator;

trait Tracked: Send + Sync {
	fn serial(&self) -> usize;
}

struct Numbered(usize);

impl Tracked for Numbered {
	fn serial(&self) -> usize {
		self.0
	}
}

fn counting(counter: &Arc<AtomicUsize>) -> Implementation<dyn Tracked> {
	let counter = Arc::clone(counter);
	Implementation::new("numbered", move || Arc::new(Numbered(counter.fetch_add(1, Ordering::SeqCst))) as Arc<dyn Tracked>)
}

/// Invariant: racing first-time resolutions of one singleton key construct exactly one instance.
pub(crate) fn inv_single_construction_per_key() {
	const THREADS: usize = 16;

	let locator = Locator::new();
	let constructed = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&constructed);
	locator.register(
		Implementation::new("slow", move || {
			thread::sleep(Duration::from_millis(5));
			Arc::new(Numbered(counter.fetch_add(1, Ordering::SeqCst))) as Arc<dyn Tracked>
		}),
		Lifetime::Singleton,
	);

	let barrier = Barrier::new(THREADS);
	let instances: Vec<Arc<dyn Tracked>> = thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					barrier.wait();
					locator.resolve::<dyn Tracked>("shared").unwrap()
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	assert_eq!(constructed.load(Ordering::SeqCst), 1, "exactly one construction expected");
	for instance in &instances {
		assert!(Arc::ptr_eq(instance, &instances[0]), "all callers must observe the same instance");
	}
	assert_eq!(locator.cached_instances::<dyn Tracked>(), 1);
}

#[cfg_attr(test, test)]
pub(crate) fn test_single_construction_per_key() {
	inv_single_construction_per_key()
}

/// Invariant: a construction in progress for one key does not block another key.
pub(crate) fn inv_keys_do_not_block_each_other() {
	let locator = Arc::new(Locator::new());
	let (entered_tx, entered_rx) = mpsc::channel::<()>();
	let (release_tx, release_rx) = mpsc::channel::<()>();
	let entered_tx = parking_lot::Mutex::new(entered_tx);
	let release_rx = parking_lot::Mutex::new(release_rx);
	let first = Arc::new(AtomicUsize::new(0));

	let gate = Arc::clone(&first);
	locator.register(
		Implementation::new("gated", move || {
			// Only the first construction waits for the test to release it.
			if gate.fetch_add(1, Ordering::SeqCst) == 0 {
				let _ = entered_tx.lock().send(());
				let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
			}
			Arc::new(Numbered(0)) as Arc<dyn Tracked>
		}),
		Lifetime::Singleton,
	);

	let blocked = {
		let locator = Arc::clone(&locator);
		thread::spawn(move || locator.resolve::<dyn Tracked>("slow").map(|_| ()))
	};
	entered_rx.recv_timeout(Duration::from_secs(5)).expect("first construction started");

	// "slow" is mid-construction; "fast" must complete without waiting for it.
	let (done_tx, done_rx) = mpsc::channel();
	{
		let locator = Arc::clone(&locator);
		thread::spawn(move || {
			let _ = done_tx.send(locator.resolve::<dyn Tracked>("fast").is_ok());
		});
	}
	let finished = done_rx.recv_timeout(Duration::from_secs(2));
	release_tx.send(()).unwrap();
	blocked.join().unwrap().unwrap();

	assert_eq!(finished, Ok(true), "independent key must resolve while another constructs");
}

#[cfg_attr(test, test)]
pub(crate) fn test_keys_do_not_block_each_other() {
	inv_keys_do_not_block_each_other()
}

/// Invariant: concurrent registrations of distinct capabilities are all retained.
pub(crate) fn inv_no_lost_registrations() {
	trait A: Send + Sync {}
	trait B: Send + Sync {}
	trait C: Send + Sync {}
	trait D: Send + Sync {}
	struct Unit;
	impl A for Unit {}
	impl B for Unit {}
	impl C for Unit {}
	impl D for Unit {}

	let locator = Locator::new();
	let barrier = Barrier::new(4);
	thread::scope(|s| {
		s.spawn(|| {
			barrier.wait();
			locator.register(Implementation::new("a", || Arc::new(Unit) as Arc<dyn A>), false);
		});
		s.spawn(|| {
			barrier.wait();
			locator.register(Implementation::new("b", || Arc::new(Unit) as Arc<dyn B>), true);
		});
		s.spawn(|| {
			barrier.wait();
			locator.register(Implementation::new("c", || Arc::new(Unit) as Arc<dyn C>), false);
		});
		s.spawn(|| {
			barrier.wait();
			locator.register(Implementation::new("d", || Arc::new(Unit) as Arc<dyn D>), true);
		});
	});

	assert_eq!(locator.len(), 4);
	assert!(locator.resolve::<dyn A>("k").is_ok());
	assert!(locator.resolve::<dyn B>("k").is_ok());
	assert!(locator.resolve::<dyn C>("k").is_ok());
	assert!(locator.resolve::<dyn D>("k").is_ok());
}

#[cfg_attr(test, test)]
pub(crate) fn test_no_lost_registrations() {
	inv_no_lost_registrations()
}

/// Invariant: rebinding a capability discards instances cached by the old binding.
pub(crate) fn inv_rebind_invalidates_cache() {
	let locator = Locator::new();
	let constructed = Arc::new(AtomicUsize::new(0));

	locator.register(counting(&constructed), Lifetime::Singleton);
	let before = locator.resolve::<dyn Tracked>("k").unwrap();
	assert_eq!(locator.cached_instances::<dyn Tracked>(), 1);

	locator.register(counting(&constructed), Lifetime::Singleton);
	assert_eq!(locator.cached_instances::<dyn Tracked>(), 0);

	let after = locator.resolve::<dyn Tracked>("k").unwrap();
	assert!(!Arc::ptr_eq(&before, &after), "rebind must not reuse the old singleton");
	assert_eq!(before.serial(), 0);
	assert_eq!(after.serial(), 1);
}

#[cfg_attr(test, test)]
pub(crate) fn test_rebind_invalidates_cache() {
	inv_rebind_invalidates_cache()
}
