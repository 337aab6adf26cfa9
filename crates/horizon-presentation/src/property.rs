//! Observable fields for binding data sources.
//!
//! Binding setters receive their data source by shared reference, so a
//! writable member needs interior mutability. [`Property<T>`] provides it:
//! `#[derive(DataSource)]` turns every `Property<T>` field into a readable
//! and writable binding member of type `T`, and leaves other fields
//! read-only.
//!
//! Bindings poll their sources during digest, so changing a property is
//! picked up on the next [`PresentationFoundation::update`] without any
//! explicit notification.
//!
//! [`PresentationFoundation::update`]: crate::foundation::PresentationFoundation::update
//!
//! # Example
//!
//! ```ignore
//! use horizon_presentation::{DataSource, Property};
//!
//! #[derive(DataSource)]
//! struct Person {
//!     name: Property<String>,
//!     age: Property<u32>,
//! }
//!
//! let person = Person { name: Property::new("Alice".into()), age: Property::new(30) };
//! assert!(person.name.set("Bob".into()));
//! assert!(!person.name.set("Bob".into()));
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::RwLock;

/// A field with interior mutability and change detection.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Overwrite the value without comparing.
    pub fn store(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if it changed.
    pub fn set(&self, value: T) -> bool {
        self.replace(value).is_some()
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> From<T> for Property<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("value", &*self.value.read()).finish()
    }
}

/// A value that a binding path can descend through.
///
/// Navigation strips ownership and observability layers (`Rc`, `Arc`,
/// `Option`, [`Property`]) and hands the innermost value to a continuation
/// as `&dyn Any`. `#[derive(DataSource)]` implements it for the deriving
/// type itself, so fields like `Property<Option<Rc<Address>>>` navigate
/// straight to the `Address`.
pub trait Navigable {
    /// The type the continuation receives.
    type Target: 'static;

    /// Call `f` with the innermost value. Not called for an empty `Option`.
    fn navigate(&self, f: &mut dyn FnMut(&dyn Any));
}

impl<N: Navigable> Navigable for Rc<N> {
    type Target = N::Target;

    fn navigate(&self, f: &mut dyn FnMut(&dyn Any)) {
        (**self).navigate(f);
    }
}

impl<N: Navigable> Navigable for Arc<N> {
    type Target = N::Target;

    fn navigate(&self, f: &mut dyn FnMut(&dyn Any)) {
        (**self).navigate(f);
    }
}

impl<N: Navigable> Navigable for Option<N> {
    type Target = N::Target;

    fn navigate(&self, f: &mut dyn FnMut(&dyn Any)) {
        if let Some(inner) = self {
            inner.navigate(f);
        }
    }
}

impl<N: Navigable> Navigable for Property<N> {
    type Target = N::Target;

    fn navigate(&self, f: &mut dyn FnMut(&dyn Any)) {
        self.value.read().navigate(f);
    }
}

impl Navigable for crate::object::DependencyObject {
    type Target = Self;

    fn navigate(&self, f: &mut dyn FnMut(&dyn Any)) {
        f(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Address {
        city: String,
    }

    impl Navigable for Address {
        type Target = Self;

        fn navigate(&self, f: &mut dyn FnMut(&dyn Any)) {
            f(self);
        }
    }

    #[test]
    fn test_set_detects_change() {
        let property = Property::new(42);
        assert!(!property.set(42));
        assert!(property.set(100));
        assert_eq!(property.get(), 100);
        assert_eq!(property.replace(7), Some(100));
        assert_eq!(property.replace(7), None);
        property.store(7);
        assert_eq!(property.with(|v| *v * 2), 14);
    }

    #[test]
    fn test_navigate_strips_layers() {
        let field: Property<Option<Rc<Address>>> = Property::new(Some(Rc::new(Address {
            city: "Oslo".into(),
        })));

        let mut city = None;
        field.navigate(&mut |inner| {
            city = inner.downcast_ref::<Address>().map(|a| a.city.clone());
        });
        assert_eq!(city.as_deref(), Some("Oslo"));

        field.store(None);
        let mut called = false;
        field.navigate(&mut |_| called = true);
        assert!(!called);
    }
}
