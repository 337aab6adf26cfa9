//! Dependency objects.
//!
//! A [`DependencyObject`] is a cheap clonable handle to an object that owns
//! a value container per dependency property it has touched. Containers are
//! created lazily on first access through the constructor captured when the
//! property was registered, and live as long as the object.
//!
//! Besides the typed get/set API the object coordinates:
//!
//! - digestion: once per cycle it digests dependency objects held in its
//!   properties, then every value that can change on its own, then runs the
//!   post-digest hook;
//! - inheritance: inherited values are memoized and invalidated down the
//!   element tree when an ancestor's value changes or the object moves;
//! - data sources: bindings read the object's own data source, or the
//!   nearest ancestor's;
//! - triggers, per-object change subscriptions, and deferred change events.
//!
//! Objects are single-threaded (`!Send`).
//!
//! # Example
//!
//! ```ignore
//! struct Slider;
//!
//! let value = DependencyProperty::register::<f64, Slider>("Value", PropertyMetadata::new(0.0))?;
//! let slider = DependencyObject::new::<Slider>();
//! slider.set_value(value, 42.0)?;
//! assert_eq!(slider.get_value::<f64>(value)?, 42.0);
//! ```

use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::animation::{Animation, Clock, Easing};
use crate::binding::expression::is_null_binding_expression;
use crate::binding::reflection::MemberType;
use crate::config::PresentationConfig;
use crate::dependency_property::{DependencyProperty, DependencyPropertyKey, PropertyMetadataFlags};
use crate::dependency_value::{DependencyPropertyValue, ErasedPropertyValue, ValueSource};
use crate::error::{PresentationError, Result};
use crate::foundation::{PresentationFoundation, UpdateTime};
use crate::logging::targets;
use crate::tree::ElementId;
use crate::trigger::Trigger;
use crate::value::{EqualityKind, PropertyValue};

static_assertions::assert_not_impl_any!(DependencyObject: Send, Sync);

new_key_type! {
    /// Identifies a change subscription on one object.
    pub struct SubscriptionId;
}

type ChangeHandler = Rc<dyn Fn(&DependencyObject, DependencyProperty)>;

/// Extension points invoked by a dependency object.
///
/// Layout and rendering layers implement this to learn about invalidations
/// without the value engine depending on them. All methods default to no-ops.
pub trait DependencyObjectHooks {
    /// A property's effective value changed.
    fn on_property_changed(&self, _object: &DependencyObject, _property: DependencyProperty) {}

    /// A property whose metadata affects measure, arrange or style changed.
    fn on_layout_invalidated(
        &self,
        _object: &DependencyObject,
        _property: DependencyProperty,
        _flags: PropertyMetadataFlags,
    ) {
    }

    /// The object finished digesting for this cycle.
    fn on_digested(&self, _object: &DependencyObject, _time: UpdateTime) {}
}

#[derive(Default)]
struct ValueTable {
    by_property: HashMap<DependencyProperty, Rc<dyn ErasedPropertyValue>>,
    ordered: Vec<Rc<dyn ErasedPropertyValue>>,
    digest: BTreeSet<DependencyProperty>,
    object_valued: Vec<Rc<dyn ErasedPropertyValue>>,
}

struct AttachedTrigger {
    trigger: Rc<Trigger>,
    active: Cell<bool>,
}

struct ObjectInner {
    owner_type: MemberType,
    name: RefCell<String>,
    element: ElementId,
    values: RefCell<ValueTable>,
    last_digested_cycle_id: Cell<Option<u64>>,
    forced_invalidation_cycle_id: Cell<u64>,
    defer_depth: Cell<u32>,
    triggers: RefCell<Vec<Rc<AttachedTrigger>>>,
    data_source: RefCell<Option<(TypeId, Rc<dyn Any>)>>,
    hooks: RefCell<Option<Rc<dyn DependencyObjectHooks>>>,
    subscriptions: RefCell<SlotMap<SubscriptionId, ChangeHandler>>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        let element = self.element;
        PresentationFoundation::try_with_element_tree_mut(|tree| tree.remove(element));
    }
}

/// A handle to an object holding dependency property values.
#[derive(Clone)]
pub struct DependencyObject {
    inner: Rc<ObjectInner>,
}

/// A non-owning handle to a [`DependencyObject`].
#[derive(Clone, Default)]
pub struct WeakDependencyObject {
    inner: Weak<ObjectInner>,
}

impl WeakDependencyObject {
    /// A handle that never upgrades.
    pub fn new() -> Self {
        Self::default()
    }

    /// The object, if it is still alive.
    pub fn upgrade(&self) -> Option<DependencyObject> {
        self.inner.upgrade().map(|inner| DependencyObject { inner })
    }
}

impl fmt::Debug for WeakDependencyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(object) => write!(f, "Weak({object:?})"),
            None => f.write_str("Weak(<dropped>)"),
        }
    }
}

/// Defers change notifications on an object until dropped.
///
/// Returned by [`DependencyObject::defer_change_events`]. Guards nest; the
/// outermost one raises the pending notifications.
#[must_use = "change events are only deferred while the guard is alive"]
pub struct DeferChangeEvents {
    object: DependencyObject,
}

impl Drop for DeferChangeEvents {
    fn drop(&mut self) {
        let depth = self.object.inner.defer_depth.get().saturating_sub(1);
        self.object.inner.defer_depth.set(depth);
        if depth == 0 {
            self.object.raise_pending_change_events();
        }
    }
}

impl DependencyObject {
    /// Create an object whose owner type is `Owner`.
    ///
    /// The owner type selects per-type property metadata and the properties
    /// binding paths can name on the object.
    pub fn new<Owner: 'static>() -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let element = PresentationFoundation::with_element_tree_mut(|tree| {
                tree.insert(WeakDependencyObject { inner: weak.clone() })
            });
            ObjectInner {
                owner_type: MemberType::of::<Owner>(),
                name: RefCell::new(String::new()),
                element,
                values: RefCell::new(ValueTable::default()),
                last_digested_cycle_id: Cell::new(None),
                forced_invalidation_cycle_id: Cell::new(0),
                defer_depth: Cell::new(0),
                triggers: RefCell::new(Vec::new()),
                data_source: RefCell::new(None),
                hooks: RefCell::new(None),
                subscriptions: RefCell::new(SlotMap::with_key()),
            }
        });
        tracing::trace!(target: targets::CORE, owner = type_name::<Owner>(), "created dependency object");
        Self { inner }
    }

    /// A non-owning handle.
    pub fn downgrade(&self) -> WeakDependencyObject {
        WeakDependencyObject {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns `true` if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The owner type.
    pub fn owner_type(&self) -> MemberType {
        self.inner.owner_type
    }

    /// The object's node in the element tree.
    pub fn element_id(&self) -> ElementId {
        self.inner.element
    }

    /// The object name, for diagnostics.
    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    /// Set the object name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.borrow_mut() = name.into();
    }

    /// Install the hook object.
    pub fn set_hooks(&self, hooks: Rc<dyn DependencyObjectHooks>) {
        *self.inner.hooks.borrow_mut() = Some(hooks);
    }

    // Value containers

    fn existing_value(&self, property: DependencyProperty) -> Option<Rc<dyn ErasedPropertyValue>> {
        self.inner.values.borrow().by_property.get(&property).cloned()
    }

    /// The container for `property`, created on first access.
    fn value_for(&self, property: DependencyProperty) -> Result<Rc<dyn ErasedPropertyValue>> {
        if let Some(value) = self.existing_value(property) {
            return Ok(value);
        }
        let value = property
            .create_value(self)
            .ok_or(PresentationError::PropertyNotFound { id: property.id() })?;
        {
            let mut table = self.inner.values.borrow_mut();
            if let Some(existing) = table.by_property.get(&property) {
                return Ok(existing.clone());
            }
            table.by_property.insert(property, value.clone());
            table.ordered.push(value.clone());
            if value.is_object_valued() {
                table.object_valued.push(value.clone());
            }
            if value.requires_digest() {
                table.digest.insert(property);
            }
        }
        value.initialize();
        tracing::trace!(target: targets::PROPERTY, %property, object = ?self, "materialized property value");
        Ok(value)
    }

    fn typed_value<T: PropertyValue>(
        &self,
        property: DependencyProperty,
    ) -> Result<Rc<DependencyPropertyValue<T>>> {
        if !property.is_registered() {
            return Err(PresentationError::PropertyNotFound { id: property.id() });
        }
        let declared = property.value_type();
        let mismatch = || PresentationError::TypeMismatch {
            expected: declared.name(),
            got: type_name::<T>(),
        };
        if !declared.is::<T>() {
            return Err(mismatch());
        }
        self.value_for(property)?
            .into_any_rc()
            .downcast::<DependencyPropertyValue<T>>()
            .map_err(|_| mismatch())
    }

    fn ensure_writable(property: DependencyProperty) -> Result<()> {
        if property.is_read_only() {
            return Err(PresentationError::ReadOnlyProperty {
                name: property.name(),
            });
        }
        Ok(())
    }

    // Typed access

    /// The effective value of `property`.
    pub fn get_value<T: PropertyValue>(&self, property: DependencyProperty) -> Result<T> {
        Ok(self.typed_value::<T>(property)?.get_value())
    }

    /// Set `property`, writing through its binding if it is bound.
    pub fn set_value<T: PropertyValue>(&self, property: DependencyProperty, value: T) -> Result<()> {
        Self::ensure_writable(property)?;
        self.typed_value::<T>(property)?.set_value(value)
    }

    /// Set a read-only property through its key.
    pub fn set_read_only_value<T: PropertyValue>(&self, key: DependencyPropertyKey, value: T) -> Result<()> {
        self.typed_value::<T>(key.property())?.set_value(value)
    }

    /// Set the styled value of `property`.
    pub fn set_styled_value<T: PropertyValue>(&self, property: DependencyProperty, value: T) -> Result<()> {
        Self::ensure_writable(property)?;
        self.typed_value::<T>(property)?.set_styled_value(value);
        Ok(())
    }

    /// Animate `property` through keyframes driven by `clock`.
    pub fn animate<T: PropertyValue>(
        &self,
        property: DependencyProperty,
        animation: Animation<T>,
        clock: Rc<dyn Clock>,
    ) -> Result<()> {
        Self::ensure_writable(property)?;
        self.typed_value::<T>(property)?.animate(animation, clock);
        Ok(())
    }

    /// Animate `property` from its current value to `target`.
    pub fn animate_to<T: PropertyValue>(
        &self,
        property: DependencyProperty,
        target: T,
        easing: Easing,
        clock: Rc<dyn Clock>,
    ) -> Result<()> {
        Self::ensure_writable(property)?;
        self.typed_value::<T>(property)?.animate_to(target, easing, clock);
        Ok(())
    }

    /// Bind `property` to `expression` on data sources of type
    /// `data_source_type`. The `{{null}}` expression removes the binding.
    pub fn bind(&self, property: DependencyProperty, data_source_type: TypeId, expression: &str) -> Result<()> {
        if is_null_binding_expression(expression) {
            return self.unbind(property);
        }
        Self::ensure_writable(property)?;
        self.value_for(property)?.bind(data_source_type, expression)
    }

    /// Bind `property` to `expression` on data sources of type `D`.
    pub fn bind_to<D: 'static>(&self, property: DependencyProperty, expression: &str) -> Result<()> {
        self.bind(property, TypeId::of::<D>(), expression)
    }

    /// Remove the binding of `property`.
    pub fn unbind(&self, property: DependencyProperty) -> Result<()> {
        Self::ensure_writable(property)?;
        if let Some(value) = self.existing_value(property) {
            value.unbind();
        }
        Ok(())
    }

    /// Remove the local value of `property`.
    pub fn clear_local_value(&self, property: DependencyProperty) -> Result<()> {
        Self::ensure_writable(property)?;
        if let Some(value) = self.existing_value(property) {
            value.clear_local_value();
        }
        Ok(())
    }

    /// Remove the local value of a read-only property through its key.
    pub fn clear_read_only_value(&self, key: DependencyPropertyKey) -> Result<()> {
        if let Some(value) = self.existing_value(key.property()) {
            value.clear_local_value();
        }
        Ok(())
    }

    /// Remove the styled value of `property`.
    pub fn clear_styled_value(&self, property: DependencyProperty) -> Result<()> {
        Self::ensure_writable(property)?;
        if let Some(value) = self.existing_value(property) {
            value.clear_styled_value();
        }
        Ok(())
    }

    /// Remove every styled value. Read-only properties are left alone.
    pub fn clear_styled_values(&self) {
        let values = self.inner.values.borrow().ordered.clone();
        for value in values {
            if !value.property().is_read_only() {
                value.clear_styled_value();
            }
        }
    }

    /// Remove the animation of `property`.
    pub fn clear_animation(&self, property: DependencyProperty) -> Result<()> {
        Self::ensure_writable(property)?;
        if let Some(value) = self.existing_value(property) {
            value.clear_animation();
        }
        Ok(())
    }

    /// Recompute the coerced value of `property`.
    pub fn coerce_value(&self, property: DependencyProperty) -> Result<()> {
        self.value_for(property)?.coerce_value();
        Ok(())
    }

    /// Returns `true` if `property` has no value source and inherits nothing.
    pub fn has_default_value(&self, property: DependencyProperty) -> bool {
        self.value_for(property)
            .map(|value| value.has_default_value())
            .unwrap_or(true)
    }

    /// The source of `property`'s effective value.
    pub fn value_source(&self, property: DependencyProperty) -> Result<ValueSource> {
        Ok(self.value_for(property)?.value_source())
    }

    /// Properties with a value container, in creation order.
    pub fn properties(&self) -> Vec<DependencyProperty> {
        self.inner
            .values
            .borrow()
            .ordered
            .iter()
            .map(|value| value.property())
            .collect()
    }

    /// Debug rendering of an existing container's effective value.
    pub fn debug_value(&self, property: DependencyProperty) -> Option<String> {
        self.existing_value(property).map(|value| value.debug_value())
    }

    // Erased access

    /// The effective value of `property`, boxed.
    pub fn get_value_boxed(&self, property: DependencyProperty) -> Option<Box<dyn Any>> {
        self.value_for(property).ok().map(|value| value.value_boxed())
    }

    /// Set `property` from a boxed value of its declared type.
    pub fn set_value_boxed(&self, property: DependencyProperty, value: Box<dyn Any>) -> Result<()> {
        Self::ensure_writable(property)?;
        self.value_for(property)?.set_value_boxed(value)
    }

    // Digestion

    /// The cycle this object was last digested in.
    pub fn last_digested_cycle_id(&self) -> Option<u64> {
        self.inner.last_digested_cycle_id.get()
    }

    /// The last cycle in which any of this object's values changed.
    pub fn forced_invalidation_cycle_id(&self) -> u64 {
        self.inner.forced_invalidation_cycle_id.get()
    }

    /// Digest the object for the current cycle. Repeated calls within one
    /// cycle do nothing.
    pub fn digest(&self, time: UpdateTime) {
        let cycle = PresentationFoundation::current_cycle_id();
        if self.inner.last_digested_cycle_id.get() == Some(cycle) {
            return;
        }
        self.inner.last_digested_cycle_id.set(Some(cycle));

        let (object_valued, digest) = {
            let table = self.inner.values.borrow();
            let digest: Vec<_> = table
                .digest
                .iter()
                .filter_map(|property| table.by_property.get(property).cloned())
                .collect();
            (table.object_valued.clone(), digest)
        };

        for value in &object_valued {
            value.digest_object_value(time);
        }
        for value in &digest {
            value.digest(time);
        }

        let hooks = self.inner.hooks.borrow().clone();
        if let Some(hooks) = hooks {
            hooks.on_digested(self, time);
        }

        if PresentationConfig::current().trace_digest {
            tracing::trace!(
                target: targets::DIGEST,
                object = ?self,
                cycle,
                values = digest.len(),
                children = object_valued.len(),
                "digested object"
            );
        }
    }

    /// Re-check `property` now instead of waiting for the next cycle.
    pub fn digest_immediately(&self, property: DependencyProperty) -> Result<()> {
        self.value_for(property)?.digest_immediately();
        Ok(())
    }

    /// Defer change notifications until the returned guard drops.
    pub fn defer_change_events(&self) -> DeferChangeEvents {
        self.inner.defer_depth.set(self.inner.defer_depth.get() + 1);
        DeferChangeEvents { object: self.clone() }
    }

    /// Raise notifications deferred while change events were deferred.
    pub fn raise_pending_change_events(&self) {
        let values = self.inner.values.borrow().ordered.clone();
        for value in values {
            value.raise_pending_change_event();
        }
    }

    /// Forget memoized inherited values here and in all descendants.
    pub fn invalidate_inheritance_cache(&self) {
        let values = self.inner.values.borrow().ordered.clone();
        for value in values {
            value.invalidate_inheritance_cache();
        }
        self.invalidate_descendant_inheritance();
    }

    // Data sources

    /// Set the data source bindings on this object and its descendants read.
    pub fn set_data_source<D: 'static>(&self, source: Rc<D>) {
        self.replace_data_source(Some((TypeId::of::<D>(), source)));
    }

    /// Use another dependency object as the data source. Bindings then name
    /// its dependency properties.
    pub fn set_data_source_object(&self, source: &DependencyObject) {
        let type_id = source.owner_type().id();
        let source: Rc<dyn Any> = Rc::new(source.clone());
        self.replace_data_source(Some((type_id, source)));
    }

    /// Remove the data source.
    pub fn clear_data_source(&self) {
        self.replace_data_source(None);
    }

    fn replace_data_source(&self, source: Option<(TypeId, Rc<dyn Any>)>) {
        if let Some((type_id, _)) = &source {
            tracing::debug!(target: targets::BINDING, object = ?self, ?type_id, "data source set");
        }
        *self.inner.data_source.borrow_mut() = source;
        self.notify_data_source_changed();
    }

    fn notify_data_source_changed(&self) {
        let values = self.inner.values.borrow().ordered.clone();
        for value in values {
            value.handle_data_source_changed();
        }
        PresentationFoundation::tree_walker().for_each_child(self, &mut |child| {
            if child.inner.data_source.borrow().is_none() {
                child.notify_data_source_changed();
            }
        });
    }

    /// The data source set on this object.
    pub fn data_source(&self) -> Option<(TypeId, Rc<dyn Any>)> {
        self.inner.data_source.borrow().clone()
    }

    /// This object's data source, or the nearest ancestor's.
    pub fn resolved_data_source(&self) -> Option<(TypeId, Rc<dyn Any>)> {
        if let Some(source) = self.data_source() {
            return Some(source);
        }
        let walker = PresentationFoundation::tree_walker();
        let mut current = walker.parent(self);
        while let Some(object) = current {
            if let Some(source) = object.data_source() {
                return Some(source);
            }
            current = walker.parent(&object);
        }
        None
    }

    // Triggers and subscriptions

    /// Attach a trigger and apply it if its condition already holds.
    ///
    /// Fails with [`PresentationError::ReadOnlyProperty`] if any action
    /// targets a read-only property.
    pub fn attach_trigger(&self, trigger: Rc<Trigger>) -> Result<()> {
        for action in trigger.actions() {
            Self::ensure_writable(action.property())?;
        }
        let attached = Rc::new(AttachedTrigger {
            trigger,
            active: Cell::new(false),
        });
        self.inner.triggers.borrow_mut().push(attached.clone());
        self.apply_trigger(&attached);
        Ok(())
    }

    /// Detach a trigger, withdrawing its values if it was active.
    pub fn detach_trigger(&self, trigger: &Rc<Trigger>) {
        let removed = {
            let mut triggers = self.inner.triggers.borrow_mut();
            let index = triggers
                .iter()
                .position(|attached| Rc::ptr_eq(&attached.trigger, trigger));
            index.map(|index| triggers.remove(index))
        };
        let Some(attached) = removed else {
            return;
        };
        if attached.active.replace(false) {
            for action in attached.trigger.actions() {
                if let Some(value) = self.existing_value(action.property()) {
                    value.clear_triggered_value_from(action);
                }
            }
        }
    }

    fn apply_trigger(&self, attached: &AttachedTrigger) {
        let active = attached.trigger.matches(self);
        if attached.active.replace(active) == active {
            return;
        }
        tracing::trace!(target: targets::PROPERTY, object = ?self, trigger = ?attached.trigger, active, "trigger toggled");
        for action in attached.trigger.actions() {
            let value = match self.value_for(action.property()) {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!(target: targets::PROPERTY, %error, "trigger action skipped");
                    continue;
                }
            };
            if active {
                if let Err(error) = value.trigger(action, action.value()) {
                    tracing::warn!(target: targets::PROPERTY, %error, "trigger action failed");
                }
            } else {
                value.clear_triggered_value_from(action);
            }
        }
    }

    fn evaluate_triggers(&self, property: DependencyProperty) {
        let watching: Vec<_> = self
            .inner
            .triggers
            .borrow()
            .iter()
            .filter(|attached| attached.trigger.property() == property)
            .cloned()
            .collect();
        for attached in watching {
            self.apply_trigger(&attached);
        }
    }

    /// Call `handler` after any property of this object changes.
    pub fn subscribe(&self, handler: impl Fn(&DependencyObject, DependencyProperty) + 'static) -> SubscriptionId {
        self.inner.subscriptions.borrow_mut().insert(Rc::new(handler))
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.borrow_mut().remove(id).is_some()
    }

    // Tree

    /// Move the object under `parent`, or make it a root.
    ///
    /// Inherited values and bindings through ancestor data sources are
    /// re-resolved on the next digest.
    pub fn set_parent(&self, parent: Option<&DependencyObject>) -> Result<()> {
        let parent = parent.map(DependencyObject::element_id);
        PresentationFoundation::with_element_tree_mut(|tree| tree.set_parent(self.element_id(), parent))?;
        self.invalidate_inheritance_cache();
        if self.inner.data_source.borrow().is_none() {
            self.notify_data_source_changed();
        }
        Ok(())
    }

    /// The parent in the element tree.
    pub fn parent(&self) -> Option<DependencyObject> {
        PresentationFoundation::with_element_tree(|tree| tree.parent(self.element_id()))
    }

    /// The children in the element tree.
    pub fn children(&self) -> Vec<DependencyObject> {
        PresentationFoundation::with_element_tree(|tree| tree.children(self.element_id()))
    }

    // Called by value containers

    pub(crate) fn set_requires_digest(&self, property: DependencyProperty, requires_digest: bool) {
        let mut table = self.inner.values.borrow_mut();
        if requires_digest {
            table.digest.insert(property);
        } else {
            table.digest.remove(&property);
        }
    }

    pub(crate) fn invalidate_descendant_inheritance(&self) {
        PresentationFoundation::tree_walker().for_each_child(self, &mut |child| {
            child.invalidate_inheritance_cache();
        });
    }

    pub(crate) fn is_deferring_change_events(&self) -> bool {
        self.inner.defer_depth.get() > 0
    }

    pub(crate) fn stamp_forced_invalidation(&self, cycle: u64) {
        if cycle > self.inner.forced_invalidation_cycle_id.get() {
            self.inner.forced_invalidation_cycle_id.set(cycle);
        }
    }

    pub(crate) fn property_changed(&self, property: DependencyProperty, flags: PropertyMetadataFlags) {
        let handlers: Vec<ChangeHandler> = self.inner.subscriptions.borrow().values().cloned().collect();
        for handler in handlers {
            handler(self, property);
        }

        self.evaluate_triggers(property);

        let hooks = self.inner.hooks.borrow().clone();
        if let Some(hooks) = hooks {
            if flags.affects_layout() {
                hooks.on_layout_invalidated(self, property, flags);
            }
            hooks.on_property_changed(self, property);
        }
    }
}

impl PartialEq for DependencyObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for DependencyObject {}

impl fmt::Debug for DependencyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.inner.name.borrow();
        if name.is_empty() {
            write!(f, "{}({:?})", self.inner.owner_type.name(), self.inner.element)
        } else {
            write!(f, "{}({:?} '{}')", self.inner.owner_type.name(), self.inner.element, name)
        }
    }
}

impl PropertyValue for DependencyObject {
    const EQUALITY: EqualityKind = EqualityKind::Reference;
    const IS_DEPENDENCY_OBJECT: bool = true;

    fn property_eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }

    fn reference_identity(&self) -> Option<usize> {
        Some(Rc::as_ptr(&self.inner) as usize)
    }

    fn as_dependency_object(&self) -> Option<&DependencyObject> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::LazyLock;

    use super::*;
    use crate::dependency_property::PropertyMetadata;
    use crate::trigger::SetTriggerAction;

    struct Panel;

    static WIDTH: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<f32, Panel>("Width", PropertyMetadata::new(0.0f32).affects_measure())
            .unwrap()
    });

    static FONT_SIZE: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<f32, Panel>("FontSize", PropertyMetadata::new(12.0f32).inherits())
            .unwrap()
    });

    static IS_PRESSED: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<bool, Panel>("IsPressed", PropertyMetadata::new(false)).unwrap()
    });

    static ACTUAL_WIDTH: LazyLock<DependencyPropertyKey> = LazyLock::new(|| {
        DependencyProperty::register_read_only::<f32, Panel>("ActualWidth", PropertyMetadata::new(0.0f32))
            .unwrap()
    });

    #[test]
    fn test_get_set_value() {
        let panel = DependencyObject::new::<Panel>();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 0.0);
        assert!(panel.has_default_value(*WIDTH));

        panel.set_value(*WIDTH, 120.0f32).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 120.0);
        assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Local);
        assert!(!panel.has_default_value(*WIDTH));

        panel.clear_local_value(*WIDTH).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 0.0);
        assert!(panel.has_default_value(*WIDTH));
    }

    #[test]
    fn test_type_mismatch() {
        let panel = DependencyObject::new::<Panel>();
        assert!(matches!(
            panel.get_value::<f64>(*WIDTH),
            Err(PresentationError::TypeMismatch { got: "f64", .. })
        ));
        assert!(matches!(
            panel.set_value(*WIDTH, 1i32),
            Err(PresentationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_read_only_property() {
        let panel = DependencyObject::new::<Panel>();
        let property = ACTUAL_WIDTH.property();
        assert!(matches!(
            panel.set_value(property, 10.0f32),
            Err(PresentationError::ReadOnlyProperty { name: "ActualWidth" })
        ));
        panel.set_read_only_value(*ACTUAL_WIDTH, 10.0f32).unwrap();
        assert_eq!(panel.get_value::<f32>(property).unwrap(), 10.0);
    }

    #[test]
    fn test_read_only_property_rejects_clearing() {
        let panel = DependencyObject::new::<Panel>();
        let property = ACTUAL_WIDTH.property();
        panel.set_read_only_value(*ACTUAL_WIDTH, 10.0f32).unwrap();

        let rejected = |result: Result<()>| {
            assert!(matches!(
                result,
                Err(PresentationError::ReadOnlyProperty { name: "ActualWidth" })
            ));
        };
        rejected(panel.clear_local_value(property));
        rejected(panel.clear_styled_value(property));
        rejected(panel.clear_animation(property));
        rejected(panel.unbind(property));
        rejected(panel.bind_to::<Panel>(property, "{{null}}"));

        panel.clear_styled_values();
        assert_eq!(panel.get_value::<f32>(property).unwrap(), 10.0);
        assert_eq!(panel.value_source(property).unwrap(), ValueSource::Local);

        panel.clear_read_only_value(*ACTUAL_WIDTH).unwrap();
        assert_eq!(panel.get_value::<f32>(property).unwrap(), 0.0);
        assert!(panel.has_default_value(property));
    }

    #[test]
    fn test_trigger_on_read_only_property_rejected() {
        let panel = DependencyObject::new::<Panel>();
        let property = ACTUAL_WIDTH.property();
        let trigger = Rc::new(
            Trigger::equals(*IS_PRESSED, false).with_action(SetTriggerAction::new(property, 99.0f32)),
        );

        assert!(matches!(
            panel.attach_trigger(trigger.clone()),
            Err(PresentationError::ReadOnlyProperty { name: "ActualWidth" })
        ));
        assert_eq!(panel.get_value::<f32>(property).unwrap(), 0.0);

        panel.set_value(*IS_PRESSED, true).unwrap();
        panel.set_value(*IS_PRESSED, false).unwrap();
        assert_eq!(panel.get_value::<f32>(property).unwrap(), 0.0);
        panel.detach_trigger(&trigger);
    }

    #[test]
    fn test_styled_below_local() {
        let panel = DependencyObject::new::<Panel>();
        panel.set_styled_value(*WIDTH, 50.0f32).unwrap();
        assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Styled);

        panel.set_value(*WIDTH, 80.0f32).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 80.0);

        panel.clear_local_value(*WIDTH).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 50.0);

        panel.clear_styled_values();
        assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Default);
    }

    #[test]
    fn test_inheritance_from_nearest_ancestor() {
        let root = DependencyObject::new::<Panel>();
        let middle = DependencyObject::new::<Panel>();
        let leaf = DependencyObject::new::<Panel>();
        middle.set_parent(Some(&root)).unwrap();
        leaf.set_parent(Some(&middle)).unwrap();

        assert_eq!(leaf.get_value::<f32>(*FONT_SIZE).unwrap(), 12.0);
        assert!(leaf.has_default_value(*FONT_SIZE));

        root.set_value(*FONT_SIZE, 16.0f32).unwrap();
        assert_eq!(leaf.get_value::<f32>(*FONT_SIZE).unwrap(), 16.0);
        assert_eq!(leaf.value_source(*FONT_SIZE).unwrap(), ValueSource::Inherited);
        assert!(!leaf.has_default_value(*FONT_SIZE));

        middle.set_value(*FONT_SIZE, 20.0f32).unwrap();
        assert_eq!(leaf.get_value::<f32>(*FONT_SIZE).unwrap(), 20.0);

        leaf.set_parent(None).unwrap();
        assert_eq!(leaf.get_value::<f32>(*FONT_SIZE).unwrap(), 12.0);
    }

    #[test]
    fn test_circular_parentage_rejected() {
        let parent = DependencyObject::new::<Panel>();
        let child = DependencyObject::new::<Panel>();
        child.set_parent(Some(&parent)).unwrap();
        assert_eq!(
            parent.set_parent(Some(&child)),
            Err(PresentationError::CircularParentage)
        );
        assert_eq!(parent.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn test_subscriptions_and_hooks() {
        #[derive(Default)]
        struct Recorder {
            layout: RefCell<Vec<DependencyProperty>>,
        }

        impl DependencyObjectHooks for Recorder {
            fn on_layout_invalidated(
                &self,
                _object: &DependencyObject,
                property: DependencyProperty,
                _flags: PropertyMetadataFlags,
            ) {
                self.layout.borrow_mut().push(property);
            }
        }

        let panel = DependencyObject::new::<Panel>();
        let recorder = Rc::new(Recorder::default());
        panel.set_hooks(recorder.clone());

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        let id = panel.subscribe(move |_, property| sink.borrow_mut().push(property));

        panel.set_value(*WIDTH, 10.0f32).unwrap();
        panel.set_value(*WIDTH, 10.0f32).unwrap();
        panel.set_value(*IS_PRESSED, true).unwrap();
        assert_eq!(*changes.borrow(), vec![*WIDTH, *IS_PRESSED]);
        assert_eq!(*recorder.layout.borrow(), vec![*WIDTH]);

        assert!(panel.unsubscribe(id));
        panel.set_value(*WIDTH, 20.0f32).unwrap();
        assert_eq!(changes.borrow().len(), 2);
    }

    #[test]
    fn test_deferred_change_events() {
        let panel = DependencyObject::new::<Panel>();
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        panel.subscribe(move |_, _| sink.set(sink.get() + 1));

        {
            let _outer = panel.defer_change_events();
            let _inner = panel.defer_change_events();
            panel.set_value(*WIDTH, 1.0f32).unwrap();
            panel.set_value(*WIDTH, 2.0f32).unwrap();
            assert_eq!(count.get(), 0);
        }
        assert_eq!(count.get(), 1);

        {
            let _guard = panel.defer_change_events();
            panel.set_value(*WIDTH, 3.0f32).unwrap();
            panel.set_value(*WIDTH, 2.0f32).unwrap();
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_trigger_applies_while_condition_holds() {
        let panel = DependencyObject::new::<Panel>();
        let trigger = Rc::new(
            Trigger::equals(*IS_PRESSED, true).with_action(SetTriggerAction::new(*WIDTH, 40.0f32)),
        );
        panel.set_styled_value(*WIDTH, 30.0f32).unwrap();
        panel.attach_trigger(trigger.clone()).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 30.0);

        panel.set_value(*IS_PRESSED, true).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 40.0);
        assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Triggered);

        panel.set_value(*IS_PRESSED, false).unwrap();
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 30.0);

        panel.set_value(*IS_PRESSED, true).unwrap();
        panel.detach_trigger(&trigger);
        assert_eq!(panel.get_value::<f32>(*WIDTH).unwrap(), 30.0);
    }

    #[test]
    fn test_erased_access() {
        let panel = DependencyObject::new::<Panel>();
        panel.set_value_boxed(*WIDTH, Box::new(64.0f32)).unwrap();
        let value = panel.get_value_boxed(*WIDTH).unwrap();
        assert_eq!(value.downcast_ref::<f32>(), Some(&64.0));
        assert!(panel.set_value_boxed(*WIDTH, Box::new("wide")).is_err());
        assert_eq!(panel.debug_value(*WIDTH).as_deref(), Some("64.0"));
    }

    #[test]
    fn test_object_identity_equality() {
        let a = DependencyObject::new::<Panel>();
        let b = DependencyObject::new::<Panel>();
        assert!(a.property_eq(&a.clone()));
        assert!(!a.property_eq(&b));
        assert_eq!(a.reference_identity(), a.clone().reference_identity());
    }
}
