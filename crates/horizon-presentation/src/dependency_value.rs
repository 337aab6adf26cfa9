//! Per-property value containers.
//!
//! Every dependency property an object touches gets a
//! [`DependencyPropertyValue<T>`]. The container holds one slot per value
//! source and resolves the effective value by fixed precedence, highest
//! first:
//!
//! 1. the default value, when no source is set and the value is not inherited
//! 2. the coerced value, when coercion changed the value below it
//! 3. the animated value
//! 4. the bound value, when the binding currently yields one
//! 5. the local value
//! 6. the triggered value
//! 7. the styled value
//! 8. the inherited value (memoized until invalidated)
//! 9. the default value
//!
//! Every mutation compares the effective value before and after and raises
//! a change notification when it differs. Values that can change without a
//! mutation (animated, bound, inherited, and resource-wrapping values) are
//! registered with their owner for digestion and re-checked once per cycle.
//!
//! Callbacks into user code (coercion, change callbacks, bindings, clocks)
//! are never made while the container's state is borrowed.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::animation::{
    interpolate_eased, Animation, AnimationSample, Clock, ClockEvent, ClockState, ClockSubscriber,
    ClockSubscription, Easing, FillBehavior,
};
use crate::binding::bound_value::{BoundValue, DependencyBoundValue};
use crate::binding::reflection::MemberType;
use crate::comparer::{ValueComparer, ValueComparerRegistry};
use crate::dependency_property::{DependencyProperty, PropertyMetadata};
use crate::error::{PresentationError, Result};
use crate::foundation::{PresentationFoundation, UpdateTime};
use crate::logging::targets;
use crate::object::{DependencyObject, WeakDependencyObject};
use crate::trigger::SetTriggerAction;
use crate::value::{ErasedValue, PropertyValue};

/// The source currently providing a property's effective value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// The metadata default.
    Default,
    /// Inherited from an ancestor.
    Inherited,
    /// Set by a style.
    Styled,
    /// Set by an active trigger.
    Triggered,
    /// Set locally.
    Local,
    /// Read through a binding.
    Bound,
    /// Produced by an animation.
    Animated,
    /// Produced by the coercion callback.
    Coerced,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::Inherited => "inherited",
            Self::Styled => "styled",
            Self::Triggered => "triggered",
            Self::Local => "local",
            Self::Bound => "bound",
            Self::Animated => "animated",
            Self::Coerced => "coerced",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ValueFlags(u16);

impl ValueFlags {
    const REQUIRES_DIGEST: Self = Self(1 << 0);
    const PENDING_CHANGE: Self = Self(1 << 1);
    const RESOURCE_WRAPPER: Self = Self(1 << 2);
    const DATA_BOUND: Self = Self(1 << 3);
    const USE_DEFAULT: Self = Self(1 << 4);

    fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    fn set(&mut self, flag: Self, on: bool) {
        if on {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }
}

enum AnimationKind<T> {
    Simple { target: T, easing: Easing },
    Keyframed(Rc<Animation<T>>),
}

struct AnimationState<T> {
    kind: AnimationKind<T>,
    clock: Rc<dyn Clock>,
    subscription: ClockSubscription,
    hand_off: T,
    current: T,
}

impl<T: PropertyValue> AnimationState<T> {
    fn initial_value(&self) -> T {
        match &self.kind {
            AnimationKind::Simple { .. } => self.hand_off.clone(),
            AnimationKind::Keyframed(animation) => animation.initial_value(&self.hand_off),
        }
    }

    fn sample(&self) -> Option<AnimationSample<T>> {
        if self.clock.state() == ClockState::Stopped {
            return None;
        }
        Some(match &self.kind {
            AnimationKind::Simple { target, easing } => AnimationSample::Value(interpolate_eased(
                *easing,
                &self.hand_off,
                target,
                self.clock.progress(),
            )),
            AnimationKind::Keyframed(animation) => {
                let elapsed = self.clock.elapsed();
                let finished = self.clock.progress() >= 1.0 && elapsed >= animation.duration();
                if finished && animation.fill_behavior() == FillBehavior::Stop {
                    AnimationSample::Expired
                } else {
                    animation.sample(&self.hand_off, elapsed)
                }
            }
        })
    }
}

struct ValueState<T> {
    local: Option<T>,
    styled: Option<T>,
    triggered: Option<(T, Rc<SetTriggerAction>)>,
    coerced: Option<T>,
    bound: Option<Rc<dyn DependencyBoundValue<T>>>,
    animation: Option<AnimationState<T>>,
    inherited: Option<Option<T>>,
    default: T,
    previous: T,
    pending_old: Option<T>,
    last_resource_version: Option<u64>,
    last_changed_digest_cycle_id: u64,
    flags: ValueFlags,
}

impl<T: PropertyValue> ValueState<T> {
    fn has_sources(&self) -> bool {
        self.local.is_some()
            || self.styled.is_some()
            || self.triggered.is_some()
            || self.bound.is_some()
            || self.animation.is_some()
    }
}

/// The value container for one dependency property on one object.
pub struct DependencyPropertyValue<T: PropertyValue> {
    owner: WeakDependencyObject,
    property: DependencyProperty,
    metadata: Arc<PropertyMetadata<T>>,
    comparer: ValueComparer<T>,
    self_weak: Weak<Self>,
    state: RefCell<ValueState<T>>,
}

/// Create the container for `property` on `owner`.
pub(crate) fn construct<T: PropertyValue>(
    owner: &DependencyObject,
    property: DependencyProperty,
) -> Option<Rc<dyn ErasedPropertyValue>> {
    let metadata = property.metadata_for::<T>(owner.owner_type().id())?;
    let default = metadata.default_value();
    let inherits = metadata.is_inherited();

    let mut flags = ValueFlags::default();
    flags.set(ValueFlags::RESOURCE_WRAPPER, T::IS_RESOURCE_WRAPPER);
    flags.set(ValueFlags::REQUIRES_DIGEST, T::IS_RESOURCE_WRAPPER || inherits);
    flags.set(ValueFlags::USE_DEFAULT, !inherits);

    let value = Rc::new_cyclic(|self_weak| DependencyPropertyValue {
        owner: owner.downgrade(),
        property,
        metadata,
        comparer: ValueComparerRegistry::comparison_function::<T>(),
        self_weak: self_weak.clone(),
        state: RefCell::new(ValueState {
            local: None,
            styled: None,
            triggered: None,
            coerced: None,
            bound: None,
            animation: None,
            inherited: None,
            last_resource_version: default.resource_version(),
            previous: default.clone(),
            default,
            pending_old: None,
            last_changed_digest_cycle_id: 0,
            flags,
        }),
    });
    Some(value)
}

impl<T: PropertyValue> DependencyPropertyValue<T> {
    /// The property this container holds.
    pub fn property(&self) -> DependencyProperty {
        self.property
    }

    /// The metadata in effect for the owner's type.
    pub fn metadata(&self) -> &PropertyMetadata<T> {
        &self.metadata
    }

    fn owner(&self) -> Option<DependencyObject> {
        self.owner.upgrade()
    }

    /// The effective value.
    pub fn get_value(&self) -> T {
        match self.owner() {
            Some(owner) => self.resolve(&owner, true, true).0,
            None => self.state.borrow().previous.clone(),
        }
    }

    /// The source of the effective value.
    pub fn value_source(&self) -> ValueSource {
        match self.owner() {
            Some(owner) => self.resolve(&owner, true, true).1,
            None => ValueSource::Default,
        }
    }

    /// Resolve the effective value, optionally skipping the coercion and
    /// animation layers.
    fn resolve(&self, owner: &DependencyObject, coerced: bool, animated: bool) -> (T, ValueSource) {
        let bound = {
            let state = self.state.borrow();
            if state.flags.contains(ValueFlags::USE_DEFAULT) {
                return (state.default.clone(), ValueSource::Default);
            }
            if coerced {
                if let Some(value) = &state.coerced {
                    return (value.clone(), ValueSource::Coerced);
                }
            }
            if animated {
                if let Some(animation) = &state.animation {
                    return (animation.current.clone(), ValueSource::Animated);
                }
            }
            state.bound.clone()
        };
        if let Some(value) = bound.and_then(|bound| bound.get(owner)) {
            return (value, ValueSource::Bound);
        }
        self.resolve_base(owner)
    }

    fn resolve_base(&self, owner: &DependencyObject) -> (T, ValueSource) {
        let memo = {
            let state = self.state.borrow();
            if let Some(value) = &state.local {
                return (value.clone(), ValueSource::Local);
            }
            if let Some((value, _)) = &state.triggered {
                return (value.clone(), ValueSource::Triggered);
            }
            if let Some(value) = &state.styled {
                return (value.clone(), ValueSource::Styled);
            }
            if !self.metadata.is_inherited() {
                return (state.default.clone(), ValueSource::Default);
            }
            state.inherited.clone()
        };
        match memo.unwrap_or_else(|| self.refresh_inherited(owner)) {
            Some(value) => (value, ValueSource::Inherited),
            None => (self.state.borrow().default.clone(), ValueSource::Default),
        }
    }

    fn refresh_inherited(&self, owner: &DependencyObject) -> Option<T> {
        let inherited = self.find_inherited_value(owner);
        self.state.borrow_mut().inherited = Some(inherited.clone());
        inherited
    }

    /// The effective value of the immediate parent, if the parent (or one of
    /// its ancestors) defines one.
    fn find_inherited_value(&self, owner: &DependencyObject) -> Option<T> {
        let parent = PresentationFoundation::tree_walker().parent(owner)?;
        if parent.has_default_value(self.property) {
            return None;
        }
        parent.get_value::<T>(self.property).ok()
    }

    fn refresh_coerced(&self, owner: &DependencyObject) {
        let Some(callback) = self.metadata.coerce_callback() else {
            return;
        };
        if self.state.borrow().flags.contains(ValueFlags::USE_DEFAULT) {
            self.state.borrow_mut().coerced = None;
            return;
        }
        let (base, _) = self.resolve(owner, false, true);
        let coerced = callback(owner, base.clone());
        self.state.borrow_mut().coerced = (!self.comparer.equals(&base, &coerced)).then_some(coerced);
    }

    /// Recompute digest participation and the default flag, then raise a
    /// change notification if the effective value differs from `old`.
    fn update_requires_digest(&self, owner: &DependencyObject, old: T) {
        let requires_digest = {
            let mut state = self.state.borrow_mut();
            let inherits = self.metadata.is_inherited();
            let requires_digest = state.animation.is_some()
                || state.bound.is_some()
                || state.flags.contains(ValueFlags::RESOURCE_WRAPPER)
                || inherits;
            let use_default = !state.has_sources() && !inherits;
            let data_bound = state.bound.is_some();
            state.flags.set(ValueFlags::REQUIRES_DIGEST, requires_digest);
            state.flags.set(ValueFlags::USE_DEFAULT, use_default);
            state.flags.set(ValueFlags::DATA_BOUND, data_bound);
            requires_digest
        };
        owner.set_requires_digest(self.property, requires_digest);

        self.refresh_coerced(owner);
        let (new, _) = self.resolve(owner, true, true);
        {
            let mut state = self.state.borrow_mut();
            state.previous = new.clone();
            state.last_resource_version = new.resource_version();
        }
        if !self.comparer.equals(&old, &new) {
            self.handle_changed(owner, old, new);
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut ValueState<T>)) {
        let Some(owner) = self.owner() else {
            return;
        };
        let old = self.state.borrow().previous.clone();
        f(&mut self.state.borrow_mut());
        self.update_requires_digest(&owner, old);
    }

    fn handle_changed(&self, owner: &DependencyObject, old: T, new: T) {
        if self.metadata.is_inherited() {
            owner.invalidate_descendant_inheritance();
        }
        if owner.is_deferring_change_events() {
            let mut state = self.state.borrow_mut();
            if !state.flags.contains(ValueFlags::PENDING_CHANGE) {
                state.flags.set(ValueFlags::PENDING_CHANGE, true);
                state.pending_old = Some(old);
            }
            return;
        }
        self.raise_changed(owner, old, new);
    }

    fn raise_changed(&self, owner: &DependencyObject, old: T, new: T) {
        let cycle = PresentationFoundation::current_cycle_id();
        self.state.borrow_mut().last_changed_digest_cycle_id = cycle;
        owner.stamp_forced_invalidation(cycle);

        tracing::trace!(
            target: targets::PROPERTY,
            property = %self.property,
            ?old,
            ?new,
            cycle,
            "property changed"
        );

        if let Some(callback) = self.metadata.changed_callback() {
            callback(owner, &old, &new);
        }
        owner.property_changed(self.property, self.metadata.flags());
    }

    fn take_animation(&self) -> Option<AnimationState<T>> {
        let animation = self.state.borrow_mut().animation.take();
        if let Some(animation) = &animation {
            animation.clock.unsubscribe(animation.subscription);
        }
        animation
    }

    fn advance_animation(&self) {
        let sample = match &self.state.borrow().animation {
            Some(animation) => animation.sample(),
            None => None,
        };
        match sample {
            Some(AnimationSample::Value(value)) => {
                if let Some(animation) = self.state.borrow_mut().animation.as_mut() {
                    animation.current = value;
                }
            }
            Some(AnimationSample::Expired) => {
                tracing::trace!(target: targets::ANIMATION, property = %self.property, "animation expired");
                self.take_animation();
                if let Some(owner) = self.owner() {
                    let requires_digest = {
                        let mut state = self.state.borrow_mut();
                        let inherits = self.metadata.is_inherited();
                        let use_default = !state.has_sources() && !inherits;
                        state.flags.set(ValueFlags::USE_DEFAULT, use_default);
                        state.bound.is_some() || state.flags.contains(ValueFlags::RESOURCE_WRAPPER) || inherits
                    };
                    owner.set_requires_digest(self.property, requires_digest);
                }
            }
            None => {}
        }
    }

    /// Re-evaluate the effective value and raise a change notification if
    /// it differs from the last observed one.
    fn check_for_changes(&self, owner: &DependencyObject) {
        self.advance_animation();

        let bound = self.state.borrow().bound.clone();
        let mut suppressed = false;
        if let Some(bound) = bound {
            suppressed = bound.take_suppress_digest();
            bound.check_has_changed(owner);
        }

        self.refresh_coerced(owner);
        let (new, _) = self.resolve(owner, true, true);
        let (old, resource_changed) = {
            let mut state = self.state.borrow_mut();
            let version = new.resource_version();
            let resource_changed = state.flags.contains(ValueFlags::RESOURCE_WRAPPER)
                && version != state.last_resource_version;
            state.last_resource_version = version;
            let old = std::mem::replace(&mut state.previous, new.clone());
            (old, resource_changed)
        };

        if suppressed {
            return;
        }
        if resource_changed || !self.comparer.equals(&old, &new) {
            self.handle_changed(owner, old, new);
        }
    }

    /// Set the value, writing through the binding if the property is bound.
    ///
    /// Any running animation is cleared first.
    pub fn set_value(&self, value: T) -> Result<()> {
        let Some(owner) = self.owner() else {
            return Ok(());
        };
        let old = self.state.borrow().previous.clone();
        self.take_animation();
        let bound = self.state.borrow().bound.clone();
        let result = match bound {
            Some(bound) => bound.set(&owner, value),
            None => {
                self.state.borrow_mut().local = Some(value);
                Ok(())
            }
        };
        self.update_requires_digest(&owner, old);
        result
    }

    /// Set the local value.
    pub fn set_local_value(&self, value: T) {
        self.mutate(|state| state.local = Some(value));
    }

    /// Set the styled value.
    pub fn set_styled_value(&self, value: T) {
        self.mutate(|state| state.styled = Some(value));
    }

    /// Bind to `expression` on the owner's data source.
    pub fn bind(&self, data_source_type: std::any::TypeId, expression: &str) -> Result<()> {
        let bound = BoundValue::<T>::new(data_source_type, expression)?;
        let previous = self.state.borrow_mut().bound.take();
        if let Some(previous) = previous {
            previous.data_source_lost();
        }
        let bound: Rc<dyn DependencyBoundValue<T>> = Rc::new(bound);
        self.mutate(|state| state.bound = Some(bound));
        Ok(())
    }

    /// Remove the binding, if any.
    pub fn unbind(&self) {
        let Some(bound) = self.state.borrow().bound.clone() else {
            return;
        };
        bound.data_source_lost();
        self.mutate(|state| state.bound = None);
    }

    /// Returns `true` if the value is data bound.
    pub fn is_bound(&self) -> bool {
        self.state.borrow().flags.contains(ValueFlags::DATA_BOUND)
    }

    /// Animate through keyframes, driven by `clock`.
    pub fn animate(&self, animation: Animation<T>, clock: Rc<dyn Clock>) {
        self.start_animation(AnimationKind::Keyframed(Rc::new(animation)), clock);
    }

    /// Animate from the current value to `target`, driven by `clock`.
    pub fn animate_to(&self, target: T, easing: Easing, clock: Rc<dyn Clock>) {
        self.start_animation(AnimationKind::Simple { target, easing }, clock);
    }

    fn start_animation(&self, kind: AnimationKind<T>, clock: Rc<dyn Clock>) {
        let Some(owner) = self.owner() else {
            return;
        };
        let old = self.state.borrow().previous.clone();
        let (hand_off, _) = self.resolve(&owner, false, true);
        self.take_animation();

        let subscriber: Weak<dyn ClockSubscriber> = self.self_weak.clone();
        let subscription = clock.subscribe(subscriber);
        let mut animation = AnimationState {
            kind,
            clock,
            subscription,
            current: hand_off.clone(),
            hand_off,
        };
        animation.current = animation.initial_value();

        tracing::trace!(target: targets::ANIMATION, property = %self.property, "animation applied");
        self.state.borrow_mut().animation = Some(animation);
        self.update_requires_digest(&owner, old);
    }

    /// Returns `true` if an animation is applied.
    pub fn is_animating(&self) -> bool {
        self.state.borrow().animation.is_some()
    }

    /// Remove the animation, if any.
    pub fn clear_animation(&self) {
        let Some(owner) = self.owner() else {
            return;
        };
        let old = self.state.borrow().previous.clone();
        if self.take_animation().is_some() {
            self.update_requires_digest(&owner, old);
        }
    }

    /// Remove the local value.
    pub fn clear_local_value(&self) {
        if self.state.borrow().local.is_some() {
            self.mutate(|state| state.local = None);
        }
    }

    /// Remove the styled value.
    pub fn clear_styled_value(&self) {
        if self.state.borrow().styled.is_some() {
            self.mutate(|state| state.styled = None);
        }
    }

    /// Remove the triggered value.
    pub fn clear_triggered_value(&self) {
        if self.state.borrow().triggered.is_some() {
            self.mutate(|state| state.triggered = None);
        }
    }

    /// Set the triggered value on behalf of `action`.
    pub fn trigger(&self, action: &Rc<SetTriggerAction>, value: T) {
        let action = action.clone();
        self.mutate(|state| state.triggered = Some((value, action)));
    }

    /// Remove the triggered value if `action` set it.
    pub fn clear_triggered_value_from(&self, action: &Rc<SetTriggerAction>) {
        let is_source = matches!(
            &self.state.borrow().triggered,
            Some((_, source)) if Rc::ptr_eq(source, action)
        );
        if is_source {
            self.mutate(|state| state.triggered = None);
        }
    }

    /// Recompute the coerced value.
    pub fn coerce_value(&self) {
        let Some(owner) = self.owner() else {
            return;
        };
        let old = self.state.borrow().previous.clone();
        self.update_requires_digest(&owner, old);
    }

    /// Returns `true` if no value source is set and nothing is inherited.
    pub fn has_default_value(&self) -> bool {
        let memo = {
            let state = self.state.borrow();
            if state.has_sources() {
                return false;
            }
            if !self.metadata.is_inherited() {
                return true;
            }
            state.inherited.clone()
        };
        match memo {
            Some(inherited) => inherited.is_none(),
            None => match self.owner() {
                Some(owner) => self.refresh_inherited(&owner).is_none(),
                None => true,
            },
        }
    }
}

impl<T: PropertyValue> ClockSubscriber for DependencyPropertyValue<T> {
    fn on_clock_event(&self, event: ClockEvent) {
        tracing::trace!(target: targets::ANIMATION, property = %self.property, ?event, "clock event");
        match event {
            ClockEvent::Started => {
                let Some(owner) = self.owner() else {
                    return;
                };
                let old = self.state.borrow().previous.clone();
                {
                    let mut state = self.state.borrow_mut();
                    if let Some(animation) = state.animation.as_mut() {
                        animation.current = animation.initial_value();
                    }
                }
                self.update_requires_digest(&owner, old);
            }
            ClockEvent::Stopped => self.clear_animation(),
            ClockEvent::Paused | ClockEvent::Resumed => {}
        }
    }
}

/// The type-erased interface an object uses to manage its property values.
pub trait ErasedPropertyValue {
    /// The property.
    fn property(&self) -> DependencyProperty;

    /// Convert into `Rc<dyn Any>` for downcasting to the typed container.
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;

    /// The declared value type.
    fn value_type(&self) -> MemberType;

    /// Record the initial effective value.
    fn initialize(&self);

    /// Re-check the value during a digest.
    fn digest(&self, time: UpdateTime);

    /// Re-check the value now.
    fn digest_immediately(&self);

    /// Digest a dependency object held as this property's value.
    fn digest_object_value(&self, time: UpdateTime);

    /// Returns `true` if values of this property can hold a dependency object.
    fn is_object_valued(&self) -> bool;

    /// Returns `true` if the value must be re-checked every cycle.
    fn requires_digest(&self) -> bool;

    /// Forget the memoized inherited value.
    fn invalidate_inheritance_cache(&self);

    /// The owner's data source changed.
    fn handle_data_source_changed(&self);

    /// Raise a change notification deferred while the owner was deferring.
    fn raise_pending_change_event(&self);

    /// Remove the local value.
    fn clear_local_value(&self);

    /// Remove the styled value.
    fn clear_styled_value(&self);

    /// Remove the animation.
    fn clear_animation(&self);

    /// Bind to `expression` on data sources of type `data_source_type`.
    fn bind(&self, data_source_type: std::any::TypeId, expression: &str) -> Result<()>;

    /// Remove the binding.
    fn unbind(&self);

    /// Recompute the coerced value.
    fn coerce_value(&self);

    /// Apply a trigger action's value.
    fn trigger(&self, action: &Rc<SetTriggerAction>, value: &ErasedValue) -> Result<()>;

    /// Remove the triggered value if `action` set it.
    fn clear_triggered_value_from(&self, action: &Rc<SetTriggerAction>);

    /// The effective value, boxed.
    fn value_boxed(&self) -> Box<dyn Any>;

    /// Set the value from a box.
    fn set_value_boxed(&self, value: Box<dyn Any>) -> Result<()>;

    /// Set the styled value from an erased value.
    fn set_styled_boxed(&self, value: &ErasedValue) -> Result<()>;

    /// The source of the effective value.
    fn value_source(&self) -> ValueSource;

    /// The effective value's debug representation.
    fn debug_value(&self) -> String;

    /// Returns `true` if no value source is set and nothing is inherited.
    fn has_default_value(&self) -> bool;

    /// The digest cycle in which the value last raised a change notification.
    fn last_changed_digest_cycle_id(&self) -> u64;
}

impl<T: PropertyValue> DependencyPropertyValue<T> {
    fn mismatch(&self, got: &'static str) -> PresentationError {
        PresentationError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            got,
        }
    }
}

impl<T: PropertyValue> ErasedPropertyValue for DependencyPropertyValue<T> {
    fn property(&self) -> DependencyProperty {
        self.property
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn value_type(&self) -> MemberType {
        MemberType::of::<T>()
    }

    fn initialize(&self) {
        let Some(owner) = self.owner() else {
            return;
        };
        let (value, _) = self.resolve(&owner, true, true);
        let mut state = self.state.borrow_mut();
        state.last_resource_version = value.resource_version();
        state.previous = value;
    }

    fn digest(&self, _time: UpdateTime) {
        if let Some(owner) = self.owner() {
            self.check_for_changes(&owner);
        }
    }

    fn digest_immediately(&self) {
        if let Some(owner) = self.owner() {
            self.check_for_changes(&owner);
        }
    }

    fn digest_object_value(&self, time: UpdateTime) {
        if !T::IS_DEPENDENCY_OBJECT {
            return;
        }
        let Some(owner) = self.owner() else {
            return;
        };
        let value = self.get_value();
        let Some(child) = value.as_dependency_object() else {
            return;
        };
        child.digest(time);
        let last_changed = self.state.borrow().last_changed_digest_cycle_id;
        if child.forced_invalidation_cycle_id() > last_changed {
            tracing::trace!(
                target: targets::DIGEST,
                property = %self.property,
                "propagating forced invalidation from child object"
            );
            self.handle_changed(&owner, value.clone(), value);
        }
    }

    fn is_object_valued(&self) -> bool {
        T::IS_DEPENDENCY_OBJECT
    }

    fn requires_digest(&self) -> bool {
        self.state.borrow().flags.contains(ValueFlags::REQUIRES_DIGEST)
    }

    fn invalidate_inheritance_cache(&self) {
        if self.metadata.is_inherited() {
            self.state.borrow_mut().inherited = None;
        }
    }

    fn handle_data_source_changed(&self) {
        let bound = self.state.borrow().bound.clone();
        if let Some(bound) = bound {
            bound.handle_data_source_changed();
        }
    }

    fn raise_pending_change_event(&self) {
        let Some(owner) = self.owner() else {
            return;
        };
        let old = {
            let mut state = self.state.borrow_mut();
            if !state.flags.contains(ValueFlags::PENDING_CHANGE) {
                return;
            }
            state.flags.set(ValueFlags::PENDING_CHANGE, false);
            state.pending_old.take()
        };
        let (new, _) = self.resolve(&owner, true, true);
        if let Some(old) = old {
            if !self.comparer.equals(&old, &new) {
                self.raise_changed(&owner, old, new);
            }
        }
    }

    fn clear_local_value(&self) {
        DependencyPropertyValue::clear_local_value(self);
    }

    fn clear_styled_value(&self) {
        DependencyPropertyValue::clear_styled_value(self);
    }

    fn clear_animation(&self) {
        DependencyPropertyValue::clear_animation(self);
    }

    fn bind(&self, data_source_type: std::any::TypeId, expression: &str) -> Result<()> {
        DependencyPropertyValue::bind(self, data_source_type, expression)
    }

    fn unbind(&self) {
        DependencyPropertyValue::unbind(self);
    }

    fn coerce_value(&self) {
        DependencyPropertyValue::coerce_value(self);
    }

    fn trigger(&self, action: &Rc<SetTriggerAction>, value: &ErasedValue) -> Result<()> {
        let value = value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| self.mismatch(value.type_name()))?;
        DependencyPropertyValue::trigger(self, action, value);
        Ok(())
    }

    fn clear_triggered_value_from(&self, action: &Rc<SetTriggerAction>) {
        DependencyPropertyValue::clear_triggered_value_from(self, action);
    }

    fn value_boxed(&self) -> Box<dyn Any> {
        Box::new(self.get_value())
    }

    fn set_value_boxed(&self, value: Box<dyn Any>) -> Result<()> {
        let value = value
            .downcast::<T>()
            .map_err(|_| self.mismatch("a value of another type"))?;
        self.set_value(*value)
    }

    fn set_styled_boxed(&self, value: &ErasedValue) -> Result<()> {
        let value = value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| self.mismatch(value.type_name()))?;
        self.set_styled_value(value);
        Ok(())
    }

    fn value_source(&self) -> ValueSource {
        DependencyPropertyValue::value_source(self)
    }

    fn debug_value(&self) -> String {
        format!("{:?}", self.get_value())
    }

    fn has_default_value(&self) -> bool {
        DependencyPropertyValue::has_default_value(self)
    }

    fn last_changed_digest_cycle_id(&self) -> u64 {
        self.state.borrow().last_changed_digest_cycle_id
    }
}

impl<T: PropertyValue> fmt::Debug for DependencyPropertyValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("DependencyPropertyValue")
            .field("property", &self.property)
            .field("previous", &state.previous)
            .field("local", &state.local)
            .field("styled", &state.styled)
            .field("animated", &state.animation.as_ref().map(|a| &a.current))
            .field("bound", &state.bound.is_some())
            .field("flags", &state.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;
    use std::time::Duration;

    use super::*;
    use crate::animation::{LoopBehavior, SimpleClock};
    use crate::trigger::Trigger;

    struct Meter;
    struct Feed;

    static LEVEL: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<f64, Meter>(
            "Level",
            PropertyMetadata::new(0.0).coerce(|_, value: f64| value.clamp(0.0, 100.0)),
        )
        .unwrap()
    });

    static ARMED: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<bool, Meter>("Armed", PropertyMetadata::new(false)).unwrap()
    });

    static FEED_LEVEL: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<f64, Feed>("FeedLevel", PropertyMetadata::new(0.0)).unwrap()
    });

    fn run_to_end(meter: &DependencyObject, target: f64) {
        let clock = Rc::new(SimpleClock::new(LoopBehavior::None, Duration::from_millis(100)));
        meter
            .animate_to(*LEVEL, target, Easing::Linear, clock.clone() as Rc<dyn Clock>)
            .unwrap();
        clock.start();
        clock.update(Duration::from_millis(100));
        PresentationFoundation::update(meter, Duration::ZERO);
    }

    fn assert_level(meter: &DependencyObject, value: f64, source: ValueSource) {
        assert_eq!(meter.get_value::<f64>(*LEVEL).unwrap(), value);
        assert_eq!(meter.value_source(*LEVEL).unwrap(), source);
    }

    #[test]
    fn test_precedence_chain() {
        let meter = DependencyObject::new::<Meter>();
        let feed = DependencyObject::new::<Feed>();
        feed.set_value(*FEED_LEVEL, 40.0).unwrap();
        meter.set_data_source_object(&feed);
        assert_level(&meter, 0.0, ValueSource::Default);

        meter.set_styled_value(*LEVEL, 10.0).unwrap();
        assert_level(&meter, 10.0, ValueSource::Styled);

        let trigger = Rc::new(Trigger::equals(*ARMED, true).with_action(SetTriggerAction::new(*LEVEL, 20.0f64)));
        meter.attach_trigger(trigger.clone()).unwrap();
        meter.set_value(*ARMED, true).unwrap();
        assert_level(&meter, 20.0, ValueSource::Triggered);

        meter.set_value(*LEVEL, 30.0).unwrap();
        assert_level(&meter, 30.0, ValueSource::Local);

        meter.bind_to::<Feed>(*LEVEL, "{{FeedLevel}}").unwrap();
        assert_level(&meter, 40.0, ValueSource::Bound);

        run_to_end(&meter, 60.0);
        assert_level(&meter, 60.0, ValueSource::Animated);

        run_to_end(&meter, 150.0);
        assert_level(&meter, 100.0, ValueSource::Coerced);

        meter.clear_animation(*LEVEL).unwrap();
        assert_level(&meter, 40.0, ValueSource::Bound);

        meter.unbind(*LEVEL).unwrap();
        assert_level(&meter, 30.0, ValueSource::Local);

        meter.clear_local_value(*LEVEL).unwrap();
        assert_level(&meter, 20.0, ValueSource::Triggered);

        meter.set_value(*ARMED, false).unwrap();
        assert_level(&meter, 10.0, ValueSource::Styled);

        meter.clear_styled_value(*LEVEL).unwrap();
        assert_level(&meter, 0.0, ValueSource::Default);
        assert!(meter.has_default_value(*LEVEL));
        meter.detach_trigger(&trigger);
    }

    #[test]
    fn test_coercion_applies_to_bound_value() {
        let meter = DependencyObject::new::<Meter>();
        let feed = DependencyObject::new::<Feed>();
        feed.set_value(*FEED_LEVEL, 250.0).unwrap();
        meter.set_data_source_object(&feed);
        meter.bind_to::<Feed>(*LEVEL, "{{FeedLevel}}").unwrap();
        assert_level(&meter, 100.0, ValueSource::Coerced);

        feed.set_value(*FEED_LEVEL, 70.0).unwrap();
        PresentationFoundation::update(&meter, Duration::ZERO);
        assert_level(&meter, 70.0, ValueSource::Bound);
    }
}
