use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Catalog;
use crate::capability::{Implementation, Lifetime};
use crate::config::LocatorConfig;
use crate::error::BindingError;
use crate::locator::{BindingState, Locator};
use crate::provides;

trait Greeter: Send + Sync {
	fn greet(&self) -> &'static str;
}

trait Storage: Send + Sync {
	fn kind(&self) -> &'static str;
}

#[derive(Default)]
struct English;

impl Greeter for English {
	fn greet(&self) -> &'static str {
		"hello"
	}
}

#[derive(Default)]
struct Memory;

impl Storage for Memory {
	fn kind(&self) -> &'static str {
		"memory"
	}
}

provides!(English => dyn Greeter);
provides!(Memory => dyn Storage);

fn catalog() -> Catalog {
	let mut catalog = Catalog::new();
	catalog
		.capability::<dyn Greeter>("greeter")
		.capability::<dyn Storage>("storage")
		.implementation("english", Implementation::<dyn Greeter>::of::<English>())
		.implementation("memory", Implementation::<dyn Storage>::of::<Memory>())
		.implementation(
			"offline",
			Implementation::<dyn Storage>::fallible("offline", || Err::<Arc<dyn Storage>, _>("disk not mounted")),
		);
	catalog
}

fn config(text: &str) -> LocatorConfig {
	LocatorConfig::from_toml_str(text).unwrap()
}

#[test]
fn applies_configured_bindings() {
	let locator = Locator::new();
	let applied = locator
		.apply(
			&config(
				r#"
				[[binding]]
				capability = "greeter"
				implementation = "english"
				lifetime = "singleton"

				[[binding]]
				capability = "storage"
				implementation = "memory"
			"#,
			),
			&catalog(),
		)
		.unwrap();

	assert_eq!(applied, 2);
	assert_eq!(locator.state::<dyn Greeter>(), BindingState::Singleton);
	assert_eq!(locator.state::<dyn Storage>(), BindingState::Transient);

	let a = locator.resolve::<dyn Greeter>("k").unwrap();
	let b = locator.resolve::<dyn Greeter>("k").unwrap();
	assert!(Arc::ptr_eq(&a, &b));
	assert_eq!(a.greet(), "hello");
	assert_eq!(locator.resolve::<dyn Storage>("k").unwrap().kind(), "memory");
}

#[test]
fn unknown_names_are_rejected() {
	let locator = Locator::new();
	let catalog = catalog();

	let err = locator
		.apply(&config("[[binding]]\ncapability = \"cache\"\nimplementation = \"memory\""), &catalog)
		.unwrap_err();
	assert!(matches!(err, BindingError::UnknownCapability { ref name } if name == "cache"));

	let err = locator
		.apply(&config("[[binding]]\ncapability = \"storage\"\nimplementation = \"redis\""), &catalog)
		.unwrap_err();
	assert!(matches!(err, BindingError::UnknownImplementation { ref name } if name == "redis"));
	assert!(locator.is_empty());
}

#[test]
fn mismatched_capability_keeps_prior_binding() {
	let locator = Locator::new();
	locator.register(Implementation::<dyn Storage>::of::<Memory>(), Lifetime::Singleton);

	let err = locator
		.apply(&config("[[binding]]\ncapability = \"storage\"\nimplementation = \"english\""), &catalog())
		.unwrap_err();

	match err {
		BindingError::CapabilityMismatch {
			implementation,
			expected,
			provided,
		} => {
			assert_eq!(implementation, "english");
			assert!(expected.contains("Storage"));
			assert!(provided.contains("Greeter"));
		}
		other => panic!("unexpected error: {other}"),
	}
	assert_eq!(locator.state::<dyn Storage>(), BindingState::Singleton);
}

#[test]
fn verify_constructs_at_apply_time() {
	let locator = Locator::new();
	let catalog = catalog();

	let unverified = config("[[binding]]\ncapability = \"storage\"\nimplementation = \"offline\"");
	assert_eq!(locator.apply(&unverified, &catalog).unwrap(), 1);
	assert!(locator.resolve::<dyn Storage>("k").is_err());

	locator.reset();
	let verified = config("[[binding]]\ncapability = \"storage\"\nimplementation = \"offline\"\nverify = true");
	let err = locator.apply(&verified, &catalog).unwrap_err();
	assert!(matches!(err, BindingError::NotConstructible { implementation: "offline", .. }));
	assert_eq!(err.to_string(), format!("implementation \"offline\" of {} cannot be constructed: disk not mounted", std::any::type_name::<dyn Storage>()));
	assert!(!locator.is_registered::<dyn Storage>());
}

#[test]
fn verified_singleton_reuses_its_instance() {
	let constructed = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&constructed);
	let mut catalog = catalog();
	catalog.implementation(
		"counted",
		Implementation::<dyn Storage>::new("counted", move || {
			counter.fetch_add(1, Ordering::SeqCst);
			Arc::new(Memory) as Arc<dyn Storage>
		}),
	);

	let locator = Locator::new();
	let verified = config("[[binding]]\ncapability = \"storage\"\nimplementation = \"counted\"\nlifetime = \"singleton\"\nverify = true");
	assert_eq!(locator.apply(&verified, &catalog).unwrap(), 1);
	assert_eq!(constructed.load(Ordering::SeqCst), 1);

	let first = locator.resolve::<dyn Storage>("k").unwrap();
	let second = locator.resolve::<dyn Storage>("k").unwrap();
	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(first.kind(), "memory");
	assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

#[test]
fn earlier_entries_survive_a_later_failure() {
	let locator = Locator::new();
	let err = locator
		.apply(
			&config(
				r#"
				[[binding]]
				capability = "greeter"
				implementation = "english"

				[[binding]]
				capability = "greeter"
				implementation = "missing"
			"#,
			),
			&catalog(),
		)
		.unwrap_err();

	assert!(matches!(err, BindingError::UnknownImplementation { .. }));
	assert_eq!(locator.state::<dyn Greeter>(), BindingState::Transient);
}

#[test]
fn catalog_lookups() {
	let catalog = catalog();
	assert!(catalog.has_capability("greeter"));
	assert!(!catalog.has_capability("english"));
	assert!(catalog.has_implementation("offline"));
	assert_eq!(
		format!("{catalog:?}"),
		r#"Catalog { capabilities: ["greeter", "storage"], implementations: ["english", "memory", "offline"] }"#
	);
}
