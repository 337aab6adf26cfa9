//! Dependency property identities and metadata.
//!
//! A [`DependencyProperty`] is a small copyable handle into a process-wide
//! registry. The registry records the property's name, owner type, value
//! type and read-only flag, plus [`PropertyMetadata`] per owner type: the
//! default value, whether the value is inherited down the element tree,
//! layout flags, and the coercion and change callbacks.
//!
//! ```ignore
//! use std::sync::LazyLock;
//! use horizon_presentation::{DependencyProperty, PropertyMetadata};
//!
//! struct Slider;
//!
//! static VALUE: LazyLock<DependencyProperty> = LazyLock::new(|| {
//!     DependencyProperty::register::<f64, Slider>(
//!         "Value",
//!         PropertyMetadata::new(0.0).coerce(|_, v| v.clamp(0.0, 100.0)),
//!     )
//!     .expect("Value registers once")
//! });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::binding::reflection::MemberType;
use crate::dependency_value::{self, ErasedPropertyValue};
use crate::error::{PresentationError, Result};
use crate::logging::targets;
use crate::object::DependencyObject;
use crate::value::PropertyValue;

/// Flags describing how a property participates in inheritance and layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyMetadataFlags(u8);

impl PropertyMetadataFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The value is inherited from the nearest ancestor that defines it.
    pub const INHERITS: Self = Self(1 << 0);
    /// A change invalidates the owner's measure pass.
    pub const AFFECTS_MEASURE: Self = Self(1 << 1);
    /// A change invalidates the owner's arrange pass.
    pub const AFFECTS_ARRANGE: Self = Self(1 << 2);
    /// A change invalidates the owner's style.
    pub const AFFECTS_STYLE: Self = Self(1 << 3);

    /// Returns `true` if all flags in `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any layout-affecting flag is set.
    pub const fn affects_layout(self) -> bool {
        self.0 & (Self::AFFECTS_MEASURE.0 | Self::AFFECTS_ARRANGE.0 | Self::AFFECTS_STYLE.0) != 0
    }

    /// Returns `true` if no flags are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Combine two flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for PropertyMetadataFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Callback that clamps or transforms a candidate value.
pub type CoerceValueCallback<T> = Arc<dyn Fn(&DependencyObject, T) -> T + Send + Sync>;

/// Callback invoked with the old and new effective values after a change.
pub type PropertyChangedCallback<T> = Arc<dyn Fn(&DependencyObject, &T, &T) + Send + Sync>;

/// Per-owner-type configuration of a dependency property.
pub struct PropertyMetadata<T> {
    default_value: Arc<dyn Fn() -> T + Send + Sync>,
    flags: PropertyMetadataFlags,
    coerce: Option<CoerceValueCallback<T>>,
    changed: Option<PropertyChangedCallback<T>>,
}

impl<T: PropertyValue> PropertyMetadata<T> {
    /// Metadata with the given default value.
    pub fn new(default_value: T) -> Self
    where
        T: Send + Sync,
    {
        Self::with_default_factory(move || default_value.clone())
    }

    /// Metadata whose default value is produced on demand.
    ///
    /// Use this for value types that are not `Send + Sync`, such as `Rc`.
    pub fn with_default_factory<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            default_value: Arc::new(factory),
            flags: PropertyMetadataFlags::NONE,
            coerce: None,
            changed: None,
        }
    }

    /// Inherit the value from ancestors in the element tree.
    pub fn inherits(mut self) -> Self {
        self.flags = self.flags | PropertyMetadataFlags::INHERITS;
        self
    }

    /// Invalidate measure when the value changes.
    pub fn affects_measure(mut self) -> Self {
        self.flags = self.flags | PropertyMetadataFlags::AFFECTS_MEASURE;
        self
    }

    /// Invalidate arrange when the value changes.
    pub fn affects_arrange(mut self) -> Self {
        self.flags = self.flags | PropertyMetadataFlags::AFFECTS_ARRANGE;
        self
    }

    /// Invalidate style when the value changes.
    pub fn affects_style(mut self) -> Self {
        self.flags = self.flags | PropertyMetadataFlags::AFFECTS_STYLE;
        self
    }

    /// Add arbitrary flags.
    pub fn with_flags(mut self, flags: PropertyMetadataFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }

    /// Set the coercion callback.
    pub fn coerce<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DependencyObject, T) -> T + Send + Sync + 'static,
    {
        self.coerce = Some(Arc::new(callback));
        self
    }

    /// Set the change callback.
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DependencyObject, &T, &T) + Send + Sync + 'static,
    {
        self.changed = Some(Arc::new(callback));
        self
    }

    /// Produce the default value.
    pub fn default_value(&self) -> T {
        (self.default_value)()
    }

    /// The metadata flags.
    pub fn flags(&self) -> PropertyMetadataFlags {
        self.flags
    }

    /// Returns `true` if the value is inherited.
    pub fn is_inherited(&self) -> bool {
        self.flags.contains(PropertyMetadataFlags::INHERITS)
    }

    /// Returns `true` if a coercion callback is set.
    pub fn is_coercible(&self) -> bool {
        self.coerce.is_some()
    }

    /// The coercion callback, if any.
    pub fn coerce_callback(&self) -> Option<CoerceValueCallback<T>> {
        self.coerce.clone()
    }

    /// The change callback, if any.
    pub fn changed_callback(&self) -> Option<PropertyChangedCallback<T>> {
        self.changed.clone()
    }
}

impl<T> fmt::Debug for PropertyMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("flags", &self.flags)
            .field("has_coerce_callback", &self.coerce.is_some())
            .field("has_changed_callback", &self.changed.is_some())
            .finish()
    }
}

type ValueFactory = fn(&DependencyObject, DependencyProperty) -> Option<Rc<dyn ErasedPropertyValue>>;

#[derive(Clone)]
struct ErasedMetadata {
    flags: PropertyMetadataFlags,
    typed: Arc<dyn Any + Send + Sync>,
}

impl ErasedMetadata {
    fn new<T: PropertyValue>(metadata: PropertyMetadata<T>) -> Self {
        Self {
            flags: metadata.flags,
            typed: Arc::new(metadata),
        }
    }
}

struct PropertyRecord {
    name: &'static str,
    owner: MemberType,
    value_type: MemberType,
    read_only: bool,
    metadata: ErasedMetadata,
    overrides: HashMap<TypeId, ErasedMetadata>,
    create_value: ValueFactory,
}

impl PropertyRecord {
    fn metadata_for(&self, owner: TypeId) -> &ErasedMetadata {
        self.overrides.get(&owner).unwrap_or(&self.metadata)
    }
}

#[derive(Default)]
struct PropertyRegistry {
    records: Vec<PropertyRecord>,
    by_name: HashMap<TypeId, HashMap<&'static str, DependencyProperty>>,
}

static PROPERTIES: OnceLock<RwLock<PropertyRegistry>> = OnceLock::new();

fn registry() -> &'static RwLock<PropertyRegistry> {
    PROPERTIES.get_or_init(|| RwLock::new(PropertyRegistry::default()))
}

/// A globally identified dependency property.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyProperty(u32);

/// Write access to a read-only dependency property.
///
/// Returned by [`DependencyProperty::register_read_only`]; only the holder
/// can change the property's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyPropertyKey {
    property: DependencyProperty,
}

impl DependencyPropertyKey {
    /// The property this key unlocks.
    pub fn property(&self) -> DependencyProperty {
        self.property
    }
}

impl DependencyProperty {
    /// Register a property of type `T` owned by `Owner`.
    pub fn register<T: PropertyValue, Owner: 'static>(
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Result<Self> {
        Self::register_internal::<T, Owner>(name, metadata, false)
    }

    /// Register a read-only property of type `T` owned by `Owner`.
    pub fn register_read_only<T: PropertyValue, Owner: 'static>(
        name: &'static str,
        metadata: PropertyMetadata<T>,
    ) -> Result<DependencyPropertyKey> {
        Self::register_internal::<T, Owner>(name, metadata, true)
            .map(|property| DependencyPropertyKey { property })
    }

    fn register_internal<T: PropertyValue, Owner: 'static>(
        name: &'static str,
        metadata: PropertyMetadata<T>,
        read_only: bool,
    ) -> Result<Self> {
        let owner = MemberType::of::<Owner>();
        let mut registry = registry().write();
        let owned = registry.by_name.get(&owner.id());
        if owned.is_some_and(|properties| properties.contains_key(name)) {
            return Err(PresentationError::DuplicateProperty {
                name,
                owner: owner.name(),
            });
        }

        let property = Self(registry.records.len() as u32);
        registry.records.push(PropertyRecord {
            name,
            owner,
            value_type: MemberType::of::<T>(),
            read_only,
            metadata: ErasedMetadata::new(metadata),
            overrides: HashMap::new(),
            create_value: dependency_value::construct::<T>,
        });
        registry
            .by_name
            .entry(owner.id())
            .or_default()
            .insert(name, property);

        tracing::debug!(
            target: targets::PROPERTY,
            name,
            owner = owner.name(),
            value_type = std::any::type_name::<T>(),
            read_only,
            id = property.0,
            "registered dependency property"
        );
        Ok(property)
    }

    /// Replace the property's metadata for objects whose owner type is `Owner`.
    pub fn override_metadata<T: PropertyValue, Owner: 'static>(
        self,
        metadata: PropertyMetadata<T>,
    ) -> Result<()> {
        let mut registry = registry().write();
        let record = registry
            .records
            .get_mut(self.0 as usize)
            .ok_or_else(PresentationError::type_mismatch::<(), T>)?;
        if !record.value_type.is::<T>() {
            return Err(PresentationError::TypeMismatch {
                expected: record.value_type.name(),
                got: std::any::type_name::<T>(),
            });
        }
        record
            .overrides
            .insert(TypeId::of::<Owner>(), ErasedMetadata::new(metadata));
        Ok(())
    }

    /// Find a property by owner type and name.
    pub fn find(owner: TypeId, name: &str) -> Option<Self> {
        registry()
            .read()
            .by_name
            .get(&owner)
            .and_then(|properties| properties.get(name))
            .copied()
    }

    fn with_record<R>(self, f: impl FnOnce(&PropertyRecord) -> R) -> Option<R> {
        registry().read().records.get(self.0 as usize).map(f)
    }

    /// Returns `true` if the property is present in the registry.
    pub fn is_registered(self) -> bool {
        self.with_record(|_| ()).is_some()
    }

    /// The global property id.
    pub fn id(self) -> u32 {
        self.0
    }

    /// The property name.
    pub fn name(self) -> &'static str {
        self.with_record(|record| record.name).unwrap_or("<unregistered>")
    }

    /// The type that registered the property.
    pub fn owner_type(self) -> MemberType {
        self.with_record(|record| record.owner)
            .unwrap_or_else(MemberType::of::<()>)
    }

    /// The declared value type.
    pub fn value_type(self) -> MemberType {
        self.with_record(|record| record.value_type)
            .unwrap_or_else(MemberType::of::<()>)
    }

    /// Returns `true` if the property was registered read-only.
    pub fn is_read_only(self) -> bool {
        self.with_record(|record| record.read_only).unwrap_or(false)
    }

    /// Metadata flags for objects of the given owner type.
    pub fn flags_for(self, owner: TypeId) -> PropertyMetadataFlags {
        self.with_record(|record| record.metadata_for(owner).flags)
            .unwrap_or_default()
    }

    /// Typed metadata for objects of the given owner type.
    pub fn metadata_for<T: PropertyValue>(self, owner: TypeId) -> Option<Arc<PropertyMetadata<T>>> {
        self.with_record(|record| record.metadata_for(owner).typed.clone())
            .and_then(|typed| typed.downcast::<PropertyMetadata<T>>().ok())
    }

    /// Create the value container for this property on `owner`.
    pub(crate) fn create_value(self, owner: &DependencyObject) -> Option<Rc<dyn ErasedPropertyValue>> {
        let factory = self.with_record(|record| record.create_value)?;
        factory(owner, self)
    }
}

impl fmt::Debug for DependencyProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DependencyProperty({}#{})", self.name(), self.0)
    }
}

impl fmt::Display for DependencyProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestOwner;
    struct DerivedOwner;

    #[test]
    fn test_register_and_query() {
        let property = DependencyProperty::register::<f32, TestOwner>(
            "RegisterAndQuery",
            PropertyMetadata::new(1.0f32).affects_measure(),
        )
        .unwrap();

        assert_eq!(property.name(), "RegisterAndQuery");
        assert!(property.owner_type().is::<TestOwner>());
        assert!(property.value_type().is::<f32>());
        assert!(!property.is_read_only());
        assert_eq!(
            DependencyProperty::find(TypeId::of::<TestOwner>(), "RegisterAndQuery"),
            Some(property)
        );

        let flags = property.flags_for(TypeId::of::<TestOwner>());
        assert!(flags.contains(PropertyMetadataFlags::AFFECTS_MEASURE));
        assert!(flags.affects_layout());
        assert!(!flags.contains(PropertyMetadataFlags::INHERITS));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        DependencyProperty::register::<i32, TestOwner>("Duplicate", PropertyMetadata::new(0)).unwrap();
        let err = DependencyProperty::register::<i32, TestOwner>("Duplicate", PropertyMetadata::new(0))
            .unwrap_err();
        assert!(matches!(err, PresentationError::DuplicateProperty { name: "Duplicate", .. }));
    }

    #[test]
    fn test_read_only_key() {
        let key = DependencyProperty::register_read_only::<f64, TestOwner>(
            "ReadOnlyKey",
            PropertyMetadata::new(0.0),
        )
        .unwrap();
        assert!(key.property().is_read_only());
    }

    #[test]
    fn test_metadata_override() {
        let property = DependencyProperty::register::<i32, TestOwner>(
            "Overridden",
            PropertyMetadata::new(1),
        )
        .unwrap();
        property
            .override_metadata::<i32, DerivedOwner>(PropertyMetadata::new(2).inherits())
            .unwrap();

        let base = property.metadata_for::<i32>(TypeId::of::<TestOwner>()).unwrap();
        let derived = property.metadata_for::<i32>(TypeId::of::<DerivedOwner>()).unwrap();
        assert_eq!(base.default_value(), 1);
        assert_eq!(derived.default_value(), 2);
        assert!(derived.is_inherited());
        assert!(property.metadata_for::<f32>(TypeId::of::<TestOwner>()).is_none());

        let err = property.override_metadata::<f32, DerivedOwner>(PropertyMetadata::new(0.0));
        assert!(matches!(err, Err(PresentationError::TypeMismatch { .. })));
    }

    #[test]
    fn test_metadata_callbacks() {
        let metadata = PropertyMetadata::new(5i32)
            .coerce(|_, value| value.clamp(0, 10))
            .on_changed(|_, _, _| {});
        assert!(metadata.is_coercible());
        assert!(metadata.changed_callback().is_some());
        assert_eq!(metadata.default_value(), 5);
    }
}
