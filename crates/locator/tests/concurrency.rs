//! Concurrent resolution against shared locators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use provisio_locator::{Implementation, Lifetime, Locator};

trait Session: Send + Sync {
	fn id(&self) -> usize;
}

struct Numbered(usize);

impl Session for Numbered {
	fn id(&self) -> usize {
		self.0
	}
}

fn counting_locator(lifetime: Lifetime) -> (Locator, Arc<AtomicUsize>) {
	let locator = Locator::new();
	let constructed = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&constructed);
	locator.register(
		Implementation::new("numbered", move || {
			Arc::new(Numbered(counter.fetch_add(1, Ordering::SeqCst))) as Arc<dyn Session>
		}),
		lifetime,
	);
	(locator, constructed)
}

#[test]
fn racing_keys_construct_once_each() {
	const THREADS: usize = 32;
	const KEYS: usize = 4;

	let (locator, constructed) = counting_locator(Lifetime::Singleton);
	let barrier = Barrier::new(THREADS);

	let resolved: Vec<(usize, usize)> = thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|i| {
				let (locator, barrier) = (&locator, &barrier);
				s.spawn(move || {
					let key = i % KEYS;
					barrier.wait();
					let session = locator.resolve::<dyn Session>(&format!("key-{key}")).unwrap();
					(key, session.id())
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	assert_eq!(constructed.load(Ordering::SeqCst), KEYS);
	assert_eq!(locator.cached_instances::<dyn Session>(), KEYS);

	let mut by_key: HashMap<usize, usize> = HashMap::new();
	for (key, id) in resolved {
		let seen = *by_key.entry(key).or_insert(id);
		assert_eq!(seen, id, "key-{key} resolved to two instances");
	}
	assert_eq!(by_key.len(), KEYS);
}

#[test]
fn concurrent_transient_resolutions_are_all_fresh() {
	const THREADS: usize = 16;

	let (locator, constructed) = counting_locator(Lifetime::Transient);
	let barrier = Barrier::new(THREADS);

	let mut ids: Vec<usize> = thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					barrier.wait();
					locator.resolve::<dyn Session>("same").unwrap().id()
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	ids.sort_unstable();
	ids.dedup();
	assert_eq!(ids.len(), THREADS);
	assert_eq!(constructed.load(Ordering::SeqCst), THREADS);
}

#[test]
fn rebinding_under_load_never_fails_resolution() {
	let (locator, _) = counting_locator(Lifetime::Singleton);

	thread::scope(|s| {
		s.spawn(|| {
			for i in 0..200 {
				let lifetime = Lifetime::from(i % 2 == 0);
				locator.register(Implementation::new("rebound", || Arc::new(Numbered(usize::MAX)) as Arc<dyn Session>), lifetime);
			}
		});
		for _ in 0..4 {
			s.spawn(|| {
				for i in 0..500 {
					assert!(locator.resolve::<dyn Session>(&format!("k{}", i % 8)).is_ok());
				}
			});
		}
	});

	assert!(locator.is_registered::<dyn Session>());
}
