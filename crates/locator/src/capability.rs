//! Capability contracts and the implementations that satisfy them.
//!
//! A capability is any `'static` type, usually a trait object such as
//! `dyn Greeter`. An [`Implementation`] is a zero-argument factory producing
//! `Arc<C>`, so constructibility is checked by the compiler instead of being
//! discovered at resolution time.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::BoxError;

/// Conversion from a concrete type into a capability it satisfies.
///
/// Trait-object capabilities are wired with [`provides!`](crate::provides).
/// Every type provides itself.
pub trait Provides<C: ?Sized>: Send + Sync + 'static {
	/// Upcasts a shared instance to the capability.
	fn provide(self: Arc<Self>) -> Arc<C>;
}

impl<T: Send + Sync + 'static> Provides<T> for T {
	fn provide(self: Arc<Self>) -> Arc<T> {
		self
	}
}

/// Implements [`Provides`] for one concrete type and one or more capabilities.
///
/// ```
/// use provisio_locator::provides;
///
/// trait Greeter: Send + Sync {
/// 	fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct EnglishGreeter;
///
/// impl Greeter for EnglishGreeter {
/// 	fn greet(&self) -> String {
/// 		"hello".into()
/// 	}
/// }
///
/// provides!(EnglishGreeter => dyn Greeter);
/// ```
#[macro_export]
macro_rules! provides {
	($impl_ty:ty => $($cap:ty),+ $(,)?) => {
		$(
			impl $crate::Provides<$cap> for $impl_ty {
				fn provide(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$cap> {
					self
				}
			}
		)+
	};
}

/// Sharing policy of a binding, fixed at registration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
	/// Every resolution constructs a new instance; the key is ignored.
	#[default]
	Transient,
	/// Resolutions under the same key share one lazily constructed instance.
	Singleton,
}

impl Lifetime {
	#[inline]
	pub const fn is_singleton(self) -> bool {
		matches!(self, Self::Singleton)
	}
}

impl From<bool> for Lifetime {
	fn from(singleton: bool) -> Self {
		if singleton { Self::Singleton } else { Self::Transient }
	}
}

type Factory<C> = dyn Fn() -> Result<Arc<C>, BoxError> + Send + Sync;

/// A named, zero-argument constructor for capability `C`.
pub struct Implementation<C: ?Sized> {
	name: &'static str,
	factory: Arc<Factory<C>>,
}

impl<C: ?Sized + 'static> Implementation<C> {
	/// Default-constructs `I` and upcasts it to `C`.
	pub fn of<I>() -> Self
	where
		I: Default + Provides<C>,
	{
		Self::new(type_name::<I>(), || <I as Provides<C>>::provide(Arc::new(I::default())))
	}

	/// Wraps an infallible factory.
	pub fn new<F>(name: &'static str, factory: F) -> Self
	where
		F: Fn() -> Arc<C> + Send + Sync + 'static,
	{
		Self {
			name,
			factory: Arc::new(move || Ok(factory())),
		}
	}

	/// Wraps a factory whose construction may fail.
	///
	/// The factory's error reaches callers of `resolve` unchanged.
	pub fn fallible<F, E>(name: &'static str, factory: F) -> Self
	where
		F: Fn() -> Result<Arc<C>, E> + Send + Sync + 'static,
		E: Into<BoxError>,
	{
		Self {
			name,
			factory: Arc::new(move || factory().map_err(Into::into)),
		}
	}

	/// Diagnostic name of the implementation.
	pub fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn construct(&self) -> Result<Arc<C>, BoxError> {
		(self.factory)()
	}
}

impl<C: ?Sized> Clone for Implementation<C> {
	fn clone(&self) -> Self {
		Self {
			name: self.name,
			factory: Arc::clone(&self.factory),
		}
	}
}

impl<C: ?Sized> fmt::Debug for Implementation<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Implementation")
			.field("name", &self.name)
			.field("capability", &type_name::<C>())
			.finish_non_exhaustive()
	}
}
