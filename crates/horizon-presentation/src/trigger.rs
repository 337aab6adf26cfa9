//! Property triggers.
//!
//! A [`Trigger`] watches one property of the object it is attached to. While
//! its condition holds, each of its [`SetTriggerAction`]s supplies the
//! triggered value of another property; when the condition stops holding
//! the actions' values are withdrawn.
//!
//! ```ignore
//! let hover = Trigger::equals(IS_MOUSE_OVER, true)
//!     .with_action(SetTriggerAction::new(BACKGROUND, Color::GRAY));
//! button.attach_trigger(Rc::new(hover))?;
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::comparer::ValueComparerRegistry;
use crate::dependency_property::DependencyProperty;
use crate::object::DependencyObject;
use crate::value::{ErasedValue, PropertyValue};

type Condition = Box<dyn Fn(&dyn Any) -> bool>;

/// Sets a property's triggered value while its trigger is active.
pub struct SetTriggerAction {
    property: DependencyProperty,
    value: ErasedValue,
}

impl SetTriggerAction {
    /// An action setting `property` to `value`.
    pub fn new<T: PropertyValue>(property: DependencyProperty, value: T) -> Self {
        Self {
            property,
            value: ErasedValue::new(value),
        }
    }

    /// The property the action sets.
    pub fn property(&self) -> DependencyProperty {
        self.property
    }

    /// The value the action sets.
    pub fn value(&self) -> &ErasedValue {
        &self.value
    }
}

impl fmt::Debug for SetTriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetTriggerAction")
            .field("property", &self.property)
            .field("value", &self.value)
            .finish()
    }
}

/// A condition on one property plus the actions applied while it holds.
pub struct Trigger {
    property: DependencyProperty,
    condition: Condition,
    actions: Vec<Rc<SetTriggerAction>>,
}

impl Trigger {
    /// A trigger active while `condition` holds for the value of `property`.
    pub fn new<T: PropertyValue>(
        property: DependencyProperty,
        condition: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        Self {
            property,
            condition: Box::new(move |value: &dyn Any| value.downcast_ref::<T>().is_some_and(&condition)),
            actions: Vec::new(),
        }
    }

    /// A trigger active while `property` equals `value`.
    pub fn equals<T: PropertyValue>(property: DependencyProperty, value: T) -> Self {
        let comparer = ValueComparerRegistry::comparison_function::<T>();
        Self::new(property, move |current: &T| comparer.equals(current, &value))
    }

    /// Add an action.
    pub fn with_action(mut self, action: SetTriggerAction) -> Self {
        self.actions.push(Rc::new(action));
        self
    }

    /// The watched property.
    pub fn property(&self) -> DependencyProperty {
        self.property
    }

    /// The actions.
    pub fn actions(&self) -> &[Rc<SetTriggerAction>] {
        &self.actions
    }

    /// Returns `true` if the condition holds on `object`.
    pub fn matches(&self, object: &DependencyObject) -> bool {
        object
            .get_value_boxed(self.property)
            .is_some_and(|value| (self.condition)(value.as_ref()))
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("property", &self.property)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}
