//! Equality comparers for dependency property values.
//!
//! The value engine compares old and new values on every digest, so each
//! value type needs an equality function. [`ValueComparerRegistry`] hands one
//! out per type and memoizes it in a process-wide map guarded by a single
//! lock. Comparers for common types are installed up front; all others are
//! synthesized on first request from the type's [`EqualityKind`]:
//!
//! 1. ordinal string types compare their contents byte-wise;
//! 2. reference types compare identity, and all of them share one comparer;
//! 3. with compiled accessors enabled, equatable and nullable types use their
//!    own equality contract;
//! 4. enums compare discriminants;
//! 5. everything else goes through type-erased equality.
//!
//! The registry is append-only. [`ValueComparerRegistry::clear`] exists so
//! tests can start from a known state.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::{AccessorStrategy, PresentationConfig};
use crate::logging::targets;
use crate::value::{EqualityKind, PropertyValue};

/// A type-erased equality function.
pub type ErasedComparer = dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync;

/// Identity of a referenced allocation. The shared reference comparer
/// operates on these rather than on the reference types themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReferenceIdentity(Option<usize>);

#[derive(Clone)]
struct ComparerEntry {
    kind: EqualityKind,
    function: Arc<ErasedComparer>,
}

/// A typed handle to a registered equality function.
pub struct ValueComparer<T> {
    kind: EqualityKind,
    function: Arc<ErasedComparer>,
    _marker: PhantomData<fn(&T, &T)>,
}

impl<T: PropertyValue> ValueComparer<T> {
    /// Returns `true` if the two values are equal.
    pub fn equals(&self, a: &T, b: &T) -> bool {
        if self.kind == EqualityKind::Reference {
            let a = ReferenceIdentity(a.reference_identity());
            let b = ReferenceIdentity(b.reference_identity());
            (self.function)(&a, &b)
        } else {
            (self.function)(a, b)
        }
    }

    /// The strategy this comparer was synthesized with.
    pub fn kind(&self) -> EqualityKind {
        self.kind
    }

    /// Returns `true` if both handles refer to the same registered function.
    pub fn shares_function_with<U>(&self, other: &ValueComparer<U>) -> bool {
        Arc::ptr_eq(&self.function, &other.function)
    }
}

impl<T> Clone for ValueComparer<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            function: self.function.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ValueComparer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueComparer")
            .field("type", &std::any::type_name::<T>())
            .field("kind", &self.kind)
            .finish()
    }
}

static COMPARERS: OnceLock<Mutex<HashMap<TypeId, ComparerEntry>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<TypeId, ComparerEntry>> {
    COMPARERS.get_or_init(|| Mutex::new(precompiled_comparers()))
}

fn precompiled_comparers() -> HashMap<TypeId, ComparerEntry> {
    let mut map = HashMap::new();
    map.insert(TypeId::of::<ReferenceIdentity>(), reference_comparer());
    map.insert(TypeId::of::<String>(), ordinal_comparer::<String>());
    map.insert(TypeId::of::<bool>(), equatable_comparer::<bool>());
    map.insert(TypeId::of::<i32>(), equatable_comparer::<i32>());
    map.insert(TypeId::of::<i64>(), equatable_comparer::<i64>());
    map.insert(TypeId::of::<u32>(), equatable_comparer::<u32>());
    map.insert(TypeId::of::<f32>(), equatable_comparer::<f32>());
    map.insert(TypeId::of::<f64>(), equatable_comparer::<f64>());
    map
}

fn typed<T: 'static>(a: &dyn Any, b: &dyn Any, eq: impl Fn(&T, &T) -> bool) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => eq(a, b),
        _ => false,
    }
}

fn ordinal_comparer<T: PropertyValue>() -> ComparerEntry {
    ComparerEntry {
        kind: EqualityKind::Ordinal,
        function: Arc::new(|a, b| typed::<T>(a, b, |a, b| a.ordinal_str() == b.ordinal_str())),
    }
}

fn reference_comparer() -> ComparerEntry {
    ComparerEntry {
        kind: EqualityKind::Reference,
        function: Arc::new(|a, b| typed::<ReferenceIdentity>(a, b, |a, b| a == b)),
    }
}

fn equatable_comparer<T: PropertyValue>() -> ComparerEntry {
    ComparerEntry {
        kind: T::EQUALITY,
        function: Arc::new(|a, b| typed::<T>(a, b, T::property_eq)),
    }
}

fn enumeration_comparer<T: PropertyValue>() -> ComparerEntry {
    ComparerEntry {
        kind: EqualityKind::Enumeration,
        function: Arc::new(|a, b| {
            typed::<T>(a, b, |a, b| std::mem::discriminant(a) == std::mem::discriminant(b))
        }),
    }
}

fn opaque_comparer<T: PropertyValue>() -> ComparerEntry {
    ComparerEntry {
        kind: EqualityKind::Opaque,
        function: Arc::new(|a, b| {
            a.type_id() == b.type_id() && typed::<T>(a, b, T::property_eq)
        }),
    }
}

/// The process-wide registry of value comparers.
pub struct ValueComparerRegistry;

impl ValueComparerRegistry {
    /// Get the equality function for `T`, synthesizing it on first use.
    ///
    /// Never fails: every type yields some comparer.
    pub fn comparison_function<T: PropertyValue>() -> ValueComparer<T> {
        let key = Self::registry_key::<T>();
        let entry = registry()
            .lock()
            .entry(key)
            .or_insert_with(Self::synthesize::<T>)
            .clone();

        ValueComparer {
            kind: entry.kind,
            function: entry.function,
            _marker: PhantomData,
        }
    }

    /// Install a custom equality function for `T`, replacing any existing one.
    pub fn register<T, F>(comparer: F)
    where
        T: PropertyValue,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let entry = ComparerEntry {
            kind: EqualityKind::Equatable,
            function: Arc::new(move |a, b| typed::<T>(a, b, &comparer)),
        };
        registry().lock().insert(TypeId::of::<T>(), entry);
    }

    /// Returns `true` if a comparer for `T` has been registered or synthesized.
    pub fn contains<T: PropertyValue>() -> bool {
        registry().lock().contains_key(&Self::registry_key::<T>())
    }

    /// Drop every synthesized comparer and restore the precompiled set.
    pub fn clear() {
        *registry().lock() = precompiled_comparers();
    }

    fn registry_key<T: PropertyValue>() -> TypeId {
        if T::EQUALITY == EqualityKind::Reference {
            TypeId::of::<ReferenceIdentity>()
        } else {
            TypeId::of::<T>()
        }
    }

    fn synthesize<T: PropertyValue>() -> ComparerEntry {
        let compiled = PresentationConfig::current().accessor_strategy == AccessorStrategy::Compiled;
        let entry = match T::EQUALITY {
            EqualityKind::Ordinal => ordinal_comparer::<T>(),
            EqualityKind::Reference => reference_comparer(),
            EqualityKind::Equatable | EqualityKind::Nullable if compiled => {
                equatable_comparer::<T>()
            }
            EqualityKind::Enumeration => enumeration_comparer::<T>(),
            _ => opaque_comparer::<T>(),
        };
        tracing::trace!(
            target: targets::PROPERTY,
            type_name = std::any::type_name::<T>(),
            kind = ?entry.kind,
            "synthesized value comparer"
        );
        entry
    }
}
