//! Value types that can be stored in dependency properties.
//!
//! Every dependency property value type implements [`PropertyValue`]. The
//! trait classifies how values of the type are compared (see
//! [`EqualityKind`]), how they interpolate during animation, and a handful
//! of hooks the value engine needs: nullable lifting for data binding,
//! resource-version reporting for wrapped resources, and access to
//! [`DependencyObject`] values for recursive digestion.
//!
//! Implementations ship for the primitive types, `String`, `Arc<str>`,
//! `Option<T>`, `Rc<T>`, `Arc<T>` and `Duration`. User types opt in with
//! [`property_value!`](crate::property_value):
//!
//! ```ignore
//! #[derive(Debug, Clone, PartialEq)]
//! struct Thickness { left: f32, top: f32, right: f32, bottom: f32 }
//! horizon_presentation::property_value!(Thickness);
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Visibility { Visible, Hidden, Collapsed }
//! horizon_presentation::property_value!(enum Visibility);
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::comparer::ValueComparerRegistry;
use crate::object::DependencyObject;

/// How the comparer registry decides whether two values are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqualityKind {
    /// Ordinal (byte-wise) string equality.
    Ordinal,
    /// Reference identity. All reference kinds share one comparer.
    Reference,
    /// The type's own equality contract.
    Equatable,
    /// Equality of an optional value, delegating to the inner type's comparer.
    Nullable,
    /// Discriminant equality of a fieldless enum.
    Enumeration,
    /// Type-erased equality used when nothing better is known.
    Opaque,
}

/// A type that can be the value of a dependency property.
pub trait PropertyValue: Clone + fmt::Debug + 'static {
    /// The equality strategy used when synthesizing a comparer.
    const EQUALITY: EqualityKind = EqualityKind::Equatable;

    /// Whether the value wraps an externally-owned resource whose contents
    /// can change without the value itself changing.
    const IS_RESOURCE_WRAPPER: bool = false;

    /// Whether values of the type are (or may hold) a [`DependencyObject`]
    /// that its owner digests before its own properties.
    const IS_DEPENDENCY_OBJECT: bool = false;

    /// Value equality.
    fn property_eq(&self, other: &Self) -> bool;

    /// The string contents, for ordinal comparison.
    fn ordinal_str(&self) -> Option<&str> {
        None
    }

    /// An address identifying the referenced allocation, for reference kinds.
    fn reference_identity(&self) -> Option<usize> {
        None
    }

    /// Interpolate towards `target` by the eased progress `t`.
    ///
    /// Types without a meaningful interpolation snap to `target` once `t`
    /// reaches 1.0.
    fn interpolate(&self, target: &Self, t: f32) -> Self {
        if t >= 1.0 {
            target.clone()
        } else {
            self.clone()
        }
    }

    /// The value as a dependency object, if it is one.
    fn as_dependency_object(&self) -> Option<&DependencyObject> {
        None
    }

    /// The version of the wrapped resource, for resource wrappers.
    fn resource_version(&self) -> Option<u64> {
        None
    }

    /// The inner type of a nullable value type.
    fn nullable_inner_type() -> Option<TypeId>
    where
        Self: Sized,
    {
        None
    }

    /// Wrap a boxed inner value into this nullable type.
    fn lift_nullable(_inner: Box<dyn Any>) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }

    /// Unwrap this nullable value into a boxed inner value, if present.
    fn lower_nullable(&self) -> Option<Box<dyn Any>> {
        None
    }
}

/// Implement [`PropertyValue`] for a user type.
///
/// - `property_value!(Type)` compares with `PartialEq` and snaps during animation.
/// - `property_value!(enum Type)` compares fieldless enums by discriminant.
///   Enums whose variants carry data are rejected at compile time, since
///   their payloads would be ignored by the comparison:
///
/// ```compile_fail
/// #[derive(Debug, Clone, PartialEq)]
/// enum Shape {
///     Circle(f32),
///     Square(f32),
/// }
/// horizon_presentation::property_value!(enum Shape);
/// ```
///
/// - `property_value!(Type, interpolate = path)` uses `path(&from, &to, t)` for animation.
#[macro_export]
macro_rules! property_value {
    (enum $ty:ty) => {
        // Only fieldless enums can be cast to an integer.
        const _: fn($ty) -> isize = |value| value as isize;

        impl $crate::value::PropertyValue for $ty {
            const EQUALITY: $crate::value::EqualityKind = $crate::value::EqualityKind::Enumeration;

            fn property_eq(&self, other: &Self) -> bool {
                ::std::mem::discriminant(self) == ::std::mem::discriminant(other)
            }
        }
    };
    ($ty:ty, interpolate = $interpolate:path) => {
        impl $crate::value::PropertyValue for $ty {
            fn property_eq(&self, other: &Self) -> bool {
                self == other
            }

            fn interpolate(&self, target: &Self, t: f32) -> Self {
                $interpolate(self, target, t)
            }
        }
    };
    ($ty:ty) => {
        impl $crate::value::PropertyValue for $ty {
            fn property_eq(&self, other: &Self) -> bool {
                self == other
            }
        }
    };
}

macro_rules! float_property_value {
    ($($ty:ty),*) => {
        $(
            impl PropertyValue for $ty {
                fn property_eq(&self, other: &Self) -> bool {
                    self == other
                }

                fn interpolate(&self, target: &Self, t: f32) -> Self {
                    self + (target - self) * (t as $ty)
                }
            }
        )*
    };
}

macro_rules! integer_property_value {
    ($($ty:ty),*) => {
        $(
            impl PropertyValue for $ty {
                fn property_eq(&self, other: &Self) -> bool {
                    self == other
                }

                fn interpolate(&self, target: &Self, t: f32) -> Self {
                    let from = *self as f64;
                    let to = *target as f64;
                    (from + (to - from) * t as f64).round() as $ty
                }
            }
        )*
    };
}

float_property_value!(f32, f64);
integer_property_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl PropertyValue for bool {
    fn property_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl PropertyValue for char {
    fn property_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl PropertyValue for Duration {
    fn property_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn interpolate(&self, target: &Self, t: f32) -> Self {
        let from = self.as_secs_f64();
        let to = target.as_secs_f64();
        Duration::from_secs_f64((from + (to - from) * t as f64).max(0.0))
    }
}

impl PropertyValue for String {
    const EQUALITY: EqualityKind = EqualityKind::Ordinal;

    fn property_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn ordinal_str(&self) -> Option<&str> {
        Some(self)
    }
}

impl PropertyValue for Arc<str> {
    const EQUALITY: EqualityKind = EqualityKind::Ordinal;

    fn property_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn ordinal_str(&self) -> Option<&str> {
        Some(self)
    }
}

impl<T: fmt::Debug + 'static> PropertyValue for Rc<T> {
    const EQUALITY: EqualityKind = EqualityKind::Reference;

    fn property_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }

    fn reference_identity(&self) -> Option<usize> {
        Some(Rc::as_ptr(self) as *const () as usize)
    }
}

impl<T: fmt::Debug + Send + Sync + 'static> PropertyValue for Arc<T> {
    const EQUALITY: EqualityKind = EqualityKind::Reference;

    fn property_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }

    fn reference_identity(&self) -> Option<usize> {
        Some(Arc::as_ptr(self) as *const () as usize)
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    const EQUALITY: EqualityKind = EqualityKind::Nullable;
    const IS_RESOURCE_WRAPPER: bool = T::IS_RESOURCE_WRAPPER;
    const IS_DEPENDENCY_OBJECT: bool = T::IS_DEPENDENCY_OBJECT;

    fn property_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => ValueComparerRegistry::comparison_function::<T>().equals(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn interpolate(&self, target: &Self, t: f32) -> Self {
        match (self, target) {
            (Some(from), Some(to)) => Some(from.interpolate(to, t)),
            _ if t >= 1.0 => target.clone(),
            _ => self.clone(),
        }
    }

    fn as_dependency_object(&self) -> Option<&DependencyObject> {
        self.as_ref().and_then(PropertyValue::as_dependency_object)
    }

    fn resource_version(&self) -> Option<u64> {
        self.as_ref().and_then(PropertyValue::resource_version)
    }

    fn nullable_inner_type() -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn lift_nullable(inner: Box<dyn Any>) -> Option<Self> {
        inner.downcast::<T>().ok().map(|value| Some(*value))
    }

    fn lower_nullable(&self) -> Option<Box<dyn Any>> {
        self.clone().map(|value| Box::new(value) as Box<dyn Any>)
    }
}

/// A type-erased property value.
///
/// Styles and trigger actions carry values for properties of arbitrary type;
/// `ErasedValue` stores one with its type information for later downcasting.
pub struct ErasedValue {
    inner: Box<dyn ErasedValueTrait>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ErasedValue {
    /// Creates a new erased value from a concrete value.
    pub fn new<T: PropertyValue>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the contained value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    /// The contained value as `&dyn Any`.
    pub fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }

    /// Clones the contained value into a new box.
    pub fn clone_boxed(&self) -> Box<dyn Any> {
        self.inner.clone_any()
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_erased(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt_value(f)
    }
}

trait ErasedValueTrait: Any {
    fn as_any(&self) -> &dyn Any;
    fn clone_erased(&self) -> Box<dyn ErasedValueTrait>;
    fn clone_any(&self) -> Box<dyn Any>;
    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: PropertyValue> ErasedValueTrait for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_erased(&self) -> Box<dyn ErasedValueTrait> {
        Box::new(self.clone())
    }

    fn clone_any(&self) -> Box<dyn Any> {
        Box::new(self.clone())
    }

    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Visibility {
        Visible,
        Collapsed,
    }
    crate::property_value!(enum Visibility);

    #[test]
    fn test_float_interpolation() {
        assert_eq!(0.0f32.interpolate(&1.0, 0.25), 0.25);
        assert_eq!(10.0f64.interpolate(&20.0, 0.5), 15.0);
    }

    #[test]
    fn test_integer_interpolation_rounds() {
        assert_eq!(0i32.interpolate(&10, 0.44), 4);
        assert_eq!(0i32.interpolate(&10, 0.46), 5);
    }

    #[test]
    fn test_non_interpolable_types_snap() {
        assert!(!false.interpolate(&true, 0.99));
        assert!(false.interpolate(&true, 1.0));
        assert_eq!(
            Visibility::Visible.interpolate(&Visibility::Collapsed, 0.5),
            Visibility::Visible
        );
    }

    #[test]
    fn test_enum_discriminant_equality() {
        assert!(Visibility::Visible.property_eq(&Visibility::Visible));
        assert!(!Visibility::Visible.property_eq(&Visibility::Collapsed));
        assert_eq!(<Visibility as PropertyValue>::EQUALITY, EqualityKind::Enumeration);
    }

    #[test]
    fn test_nullable_lifting() {
        assert_eq!(Option::<i32>::nullable_inner_type(), Some(TypeId::of::<i32>()));
        assert_eq!(Option::<i32>::lift_nullable(Box::new(7i32)), Some(Some(7)));
        assert_eq!(Option::<i32>::lift_nullable(Box::new(7u8)), None);

        let lowered = Some(3i32).lower_nullable().and_then(|b| b.downcast::<i32>().ok());
        assert_eq!(lowered.map(|b| *b), Some(3));
        assert!(None::<i32>.lower_nullable().is_none());
    }

    #[test]
    fn test_reference_identity() {
        let a = Rc::new(5);
        let b = a.clone();
        let c = Rc::new(5);
        assert_eq!(a.reference_identity(), b.reference_identity());
        assert_ne!(a.reference_identity(), c.reference_identity());
        assert!(!a.property_eq(&c));
    }

    #[test]
    fn test_erased_value() {
        let value = ErasedValue::new(42_i32);
        assert!(value.is::<i32>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.downcast_ref::<f64>(), None);

        let cloned = value.clone();
        assert_eq!(cloned.downcast_ref::<i32>(), Some(&42));
        assert_eq!(format!("{:?}", cloned), "42");
        assert_eq!(value.type_name(), "i32");
    }
}
