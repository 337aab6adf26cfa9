//! Data binding.
//!
//! A dependency property can be bound to a member path on its owner's data
//! source (or the nearest ancestor's) with a binding expression such as
//! `{{Model.Name}}`. This module contains the pieces that make that work:
//!
//! - [`expression`]: pure functions over the binding expression syntax;
//! - [`reflection`]: per-type member metadata that paths resolve against;
//! - [`compiler`]: resolution of paths into cached getters and setters;
//! - [`convert`]: conversions and display formats between member and
//!   property types;
//! - [`bound_value`]: the cached per-property view of a bound member.

pub mod bound_value;
pub mod compiler;
pub mod convert;
pub mod expression;
pub mod reflection;

pub use bound_value::{BoundValue, DependencyBoundValue};
pub use compiler::{
    BindingAccessorCompiler, BindingExpressionAccessorKey, BindingGetter, BindingSetter,
    ErasedBindingGetter, ErasedBindingSetter,
};
pub use convert::{format_value, ConverterFn, ValueConverter};
pub use expression::{
    get_binding_format_string_part, get_binding_member_path_part, is_binding_expression,
    is_null_binding_expression, BindingExpression, NULL_BINDING_EXPRESSION,
};
pub use reflection::{
    DataSource, DataSourceUnwrapper, MemberGetter, MemberInfo, MemberKind, MemberLookup,
    MemberNavigator, MemberSetter, MemberType, PrecompiledAccessor, TypeInfo, TypeRegistry,
};
