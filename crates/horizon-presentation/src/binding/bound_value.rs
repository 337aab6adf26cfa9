//! Cached values read through a binding.
//!
//! When a dependency property is bound, its value container holds a
//! [`DependencyBoundValue`] that reads the member through a binding accessor
//! against the owner's data source and caches the result. On every digest
//! the container asks the bound value whether the upstream value changed.
//!
//! The bound value is chosen from the expression's static type:
//!
//! - the property type: read and write directly;
//! - the property type is `Option<M>` of the member type `M`, or the member
//!   type is `Option<T>` of the property type `T`: lift or lower through the
//!   nullable layer;
//! - anything else the converter supports: convert in both directions,
//!   applying the expression's display format when reading.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::binding::compiler::{BindingAccessorCompiler, ErasedBindingSetter};
use crate::binding::convert::ValueConverter;
use crate::binding::expression::BindingExpression;
use crate::comparer::{ValueComparer, ValueComparerRegistry};
use crate::error::{PresentationError, Result};
use crate::logging::targets;
use crate::object::DependencyObject;
use crate::value::PropertyValue;

/// A value read through a binding, cached between digests.
pub trait DependencyBoundValue<T> {
    /// The cached value, reading it first if nothing has been read yet.
    fn get(&self, owner: &DependencyObject) -> Option<T>;

    /// Write a value back through the binding.
    fn set(&self, owner: &DependencyObject, value: T) -> Result<()>;

    /// Re-read the value and report whether it differs from the cached one.
    fn check_has_changed(&self, owner: &DependencyObject) -> bool;

    /// The owner's data source was replaced; the next check re-reads.
    fn handle_data_source_changed(&self);

    /// The binding is being removed.
    fn data_source_lost(&self);

    /// Returns and clears the flag asking the next digest to skip change
    /// detection.
    fn take_suppress_digest(&self) -> bool;
}

type Reader<T> = Box<dyn Fn(&dyn Any) -> Option<T>>;
type Writer<T> = Box<dyn Fn(&dyn Any, T) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingMode {
    Direct,
    LiftNullable,
    LowerNullable,
    Converting,
}

/// The standard bound value.
pub struct BoundValue<T: PropertyValue> {
    data_source_type: TypeId,
    expression: String,
    mode: BindingMode,
    read: Reader<T>,
    write: Writer<T>,
    suppress_on_write: bool,
    comparer: ValueComparer<T>,
    cached: RefCell<Option<T>>,
    primed: Cell<bool>,
    suppress_digest: Cell<bool>,
}

fn format_part(expression: &str) -> Result<Option<String>> {
    if expression.starts_with("{{") {
        Ok(BindingExpression::parse(expression)?.format().map(str::to_string))
    } else {
        Ok(None)
    }
}

fn erased_writer<T: 'static>(
    setter: Result<Arc<dyn ErasedBindingSetter>>,
    encode: impl Fn(T) -> Option<Box<dyn Any>> + 'static,
) -> Writer<T> {
    Box::new(move |source: &dyn Any, value: T| {
        let setter = setter.as_ref().map_err(Clone::clone)?;
        match encode(value) {
            Some(value) => setter.set(source, value),
            None => Ok(()),
        }
    })
}

impl<T: PropertyValue> BoundValue<T> {
    /// Create a bound value for `expression` against `data_source_type`.
    pub fn new(data_source_type: TypeId, expression: &str) -> Result<Self> {
        let member_type = BindingAccessorCompiler::get_expression_type(data_source_type, expression)?;
        let format = format_part(expression)?;
        let member_id = member_type.id();
        let property_id = TypeId::of::<T>();

        let direct = member_id == property_id && (format.is_none() || property_id != TypeId::of::<String>());

        let (mode, read, write): (BindingMode, Reader<T>, Writer<T>) = if direct {
            let getter = BindingAccessorCompiler::create_binding_getter::<T>(data_source_type, expression)?;
            let setter = BindingAccessorCompiler::create_binding_setter::<T>(data_source_type, expression);
            (
                BindingMode::Direct,
                Box::new(move |source: &dyn Any| getter.get(source)),
                Box::new(move |source: &dyn Any, value: T| {
                    setter.as_ref().map_err(Clone::clone)?.set(source, value)
                }),
            )
        } else if T::nullable_inner_type() == Some(member_id) {
            let getter = BindingAccessorCompiler::create_erased_binding_getter(data_source_type, expression)?;
            let setter = BindingAccessorCompiler::create_erased_binding_setter(data_source_type, expression);
            (
                BindingMode::LiftNullable,
                Box::new(move |source: &dyn Any| getter.get(source).and_then(T::lift_nullable)),
                erased_writer(setter, |value: T| value.lower_nullable()),
            )
        } else if member_id == TypeId::of::<Option<T>>() {
            let getter = BindingAccessorCompiler::create_erased_binding_getter(data_source_type, expression)?;
            let setter = BindingAccessorCompiler::create_erased_binding_setter(data_source_type, expression);
            (
                BindingMode::LowerNullable,
                Box::new(move |source: &dyn Any| {
                    getter
                        .get(source)
                        .and_then(|value| value.downcast::<Option<T>>().ok())
                        .and_then(|value| *value)
                }),
                erased_writer(setter, |value: T| Some(Box::new(Some(value)) as Box<dyn Any>)),
            )
        } else if ValueConverter::can_convert(member_id, property_id) {
            let getter = BindingAccessorCompiler::create_erased_binding_getter(data_source_type, expression)?;
            let setter = BindingAccessorCompiler::create_erased_binding_setter(data_source_type, expression);
            let read_format = format.clone();
            (
                BindingMode::Converting,
                Box::new(move |source: &dyn Any| {
                    let value = getter.get(source)?;
                    ValueConverter::convert(value.as_ref(), property_id, read_format.as_deref())
                        .and_then(|value| value.downcast::<T>().ok())
                        .map(|value| *value)
                }),
                erased_writer(setter, move |value: T| ValueConverter::convert(&value, member_id, None)),
            )
        } else {
            return Err(PresentationError::NoConversion {
                from: member_type.name(),
                to: std::any::type_name::<T>(),
            });
        };

        tracing::debug!(
            target: targets::BINDING,
            expression,
            member_type = member_type.name(),
            property_type = std::any::type_name::<T>(),
            ?mode,
            "created bound value"
        );

        Ok(Self {
            data_source_type,
            expression: expression.to_string(),
            mode,
            read,
            write,
            suppress_on_write: mode == BindingMode::Converting && format.is_some(),
            comparer: ValueComparerRegistry::comparison_function::<T>(),
            cached: RefCell::new(None),
            primed: Cell::new(false),
            suppress_digest: Cell::new(false),
        })
    }

    /// The binding expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn read(&self, owner: &DependencyObject) -> Option<T> {
        let (data_source_type, data_source) = owner.resolved_data_source()?;
        if data_source_type != self.data_source_type {
            return None;
        }
        (self.read)(&*data_source)
    }

    fn same(&self, a: &Option<T>, b: &Option<T>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.comparer.equals(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: PropertyValue> DependencyBoundValue<T> for BoundValue<T> {
    fn get(&self, owner: &DependencyObject) -> Option<T> {
        if !self.primed.get() {
            let value = self.read(owner);
            *self.cached.borrow_mut() = value;
            self.primed.set(true);
        }
        self.cached.borrow().clone()
    }

    fn set(&self, owner: &DependencyObject, value: T) -> Result<()> {
        let Some((data_source_type, data_source)) = owner.resolved_data_source() else {
            return Ok(());
        };
        if data_source_type != self.data_source_type {
            return Ok(());
        }
        (self.write)(&*data_source, value.clone())?;
        *self.cached.borrow_mut() = Some(value);
        self.primed.set(true);
        if self.suppress_on_write {
            self.suppress_digest.set(true);
        }
        Ok(())
    }

    fn check_has_changed(&self, owner: &DependencyObject) -> bool {
        let fresh = self.read(owner);
        let changed = !self.primed.get() || !self.same(&self.cached.borrow(), &fresh);
        *self.cached.borrow_mut() = fresh;
        self.primed.set(true);
        changed
    }

    fn handle_data_source_changed(&self) {
        self.primed.set(false);
    }

    fn data_source_lost(&self) {
        self.cached.borrow_mut().take();
        self.primed.set(false);
    }

    fn take_suppress_digest(&self) -> bool {
        self.suppress_digest.replace(false)
    }
}

impl<T: PropertyValue> std::fmt::Debug for BoundValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundValue")
            .field("expression", &self.expression)
            .field("mode", &self.mode)
            .field("cached", &self.cached.borrow())
            .finish()
    }
}
