//! Dependency properties, data binding and digest cycles for Horizon UI.
//!
//! This crate provides the property value engine a presentation layer is
//! built on:
//!
//! - **Dependency Properties**: Process-wide property identities with typed
//!   metadata (default value, inheritance, coercion, change callbacks)
//! - **Dependency Objects**: Per-object value storage resolving each property
//!   from local, styled, triggered, bound, animated, inherited and default
//!   layers in precedence order
//! - **Data Binding**: `{{Path.To.Member}}` expressions compiled into cached
//!   accessors against reflected data source types
//! - **Animation**: Eased and keyframed animations driven by clocks
//! - **Digest Cycles**: A once-per-frame pass that advances clocks, refreshes
//!   bindings and raises change notifications parents before children
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use std::time::Duration;
//! use horizon_presentation::{
//!     DataSource, DependencyObject, DependencyProperty, PresentationFoundation,
//!     Property, PropertyMetadata,
//! };
//!
//! #[derive(DataSource)]
//! struct Model {
//!     name: Property<String>,
//! }
//!
//! struct Label;
//!
//! let text = DependencyProperty::register::<String, Label>("Text", PropertyMetadata::new(String::new()))?;
//! Model::register_type();
//!
//! let label = DependencyObject::new::<Label>();
//! let model = Rc::new(Model { name: Property::new("Alice".into()) });
//! label.set_data_source(model.clone());
//! label.bind_to::<Model>(text, "{{Name}}")?;
//!
//! PresentationFoundation::update(&label, Duration::from_millis(16));
//! assert_eq!(label.get_value::<String>(text)?, "Alice");
//! ```

extern crate self as horizon_presentation;

pub mod animation;
pub mod binding;
pub mod comparer;
pub mod config;
pub mod dependency_property;
pub mod dependency_value;
mod error;
pub mod foundation;
pub mod logging;
pub mod object;
pub mod property;
pub mod resource;
pub mod tree;
pub mod trigger;
pub mod value;

pub use animation::{Animation, AnimationSample, Clock, Easing, FillBehavior, KeyFrame, LoopBehavior, SimpleClock};
pub use binding::{BindingExpression, DataSource, MemberInfo, TypeInfo, TypeRegistry, ValueConverter};
pub use comparer::{ValueComparer, ValueComparerRegistry};
pub use config::{AccessorStrategy, PresentationConfig};
pub use dependency_property::{
    DependencyProperty, DependencyPropertyKey, PropertyMetadata, PropertyMetadataFlags,
};
pub use dependency_value::{DependencyPropertyValue, ValueSource};
pub use error::{PresentationError, Result};
pub use foundation::{PresentationFoundation, UpdateTime};
pub use logging::{DependencyTreeDebug, TreeFormatOptions, TreeStyle};
pub use object::{DeferChangeEvents, DependencyObject, DependencyObjectHooks, SubscriptionId, WeakDependencyObject};
pub use property::{Navigable, Property};
pub use resource::{SourcedResource, VersionedResource, VersionedStringBuilder, VersionedStringSource};
pub use tree::{ElementId, ElementTree, TreeWalker};
pub use trigger::{SetTriggerAction, Trigger};
pub use value::{EqualityKind, ErasedValue, PropertyValue};

pub use horizon_presentation_macros::DataSource;
