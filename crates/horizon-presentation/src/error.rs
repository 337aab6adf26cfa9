//! Error types for Horizon Presentation.
//!
//! Every failure in this crate is a synchronous programming error detected
//! when a binding is created, a property is mutated, or a versioned value is
//! read. None of them are retried.

/// A specialized Result type for presentation operations.
pub type Result<T> = std::result::Result<T, PresentationError>;

/// The main error type for presentation operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresentationError {
    /// A binding expression is not syntactically valid.
    #[error("Invalid binding expression '{expression}'")]
    InvalidExpression {
        /// The offending expression text.
        expression: String,
    },

    /// A member path segment does not exist on the data source type.
    #[error("Cannot resolve binding '{expression}': no member '{member}' on type {type_name}")]
    UnresolvableBinding {
        /// The full binding expression.
        expression: String,
        /// The segment that failed to resolve.
        member: String,
        /// The type the segment was looked up on.
        type_name: String,
    },

    /// A member path segment matches more than one member of the same kind.
    #[error("Ambiguous binding '{expression}': member '{member}' on type {type_name} is not unique")]
    AmbiguousBinding {
        /// The full binding expression.
        expression: String,
        /// The ambiguous segment.
        member: String,
        /// The type the segment was looked up on.
        type_name: String,
    },

    /// A mutation was attempted on a read-only dependency property.
    #[error("Dependency property '{name}' is read-only")]
    ReadOnlyProperty {
        /// The property name.
        name: &'static str,
    },

    /// A typed accessor was used with a type other than the declared one.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// The declared type name.
        expected: &'static str,
        /// The requested type name.
        got: &'static str,
    },

    /// A versioned string source was read after its backing buffer changed.
    #[error("Versioned string source is stale: captured version {captured}, current version {current}")]
    StaleCache {
        /// The version captured when the source was created.
        captured: u64,
        /// The builder's version at the time of the read.
        current: u64,
    },

    /// A binding tried to write through a member that has no setter.
    #[error("Member '{member}' in binding '{expression}' is not writable")]
    NotWritable {
        /// The full binding expression.
        expression: String,
        /// The final member of the path.
        member: String,
    },

    /// No converter exists between a bound member's type and the property type.
    #[error("No conversion from {from} to {to}")]
    NoConversion {
        /// The source type name.
        from: &'static str,
        /// The target type name.
        to: &'static str,
    },

    /// A dependency property was registered twice for the same owner type.
    #[error("Dependency property '{name}' is already registered on {owner}")]
    DuplicateProperty {
        /// The property name.
        name: &'static str,
        /// The owner type name.
        owner: &'static str,
    },

    /// A dependency property handle does not refer to a registered property.
    #[error("Dependency property #{id} is not registered")]
    PropertyNotFound {
        /// The property id.
        id: u32,
    },

    /// The element tree rejected a parent assignment that would form a cycle.
    #[error("Cannot set an element as its own parent or ancestor")]
    CircularParentage,
}

impl PresentationError {
    /// Create an invalid-expression error.
    pub fn invalid_expression(expression: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
        }
    }

    /// Create an unresolvable-binding error.
    pub fn unresolvable(
        expression: impl Into<String>,
        member: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::UnresolvableBinding {
            expression: expression.into(),
            member: member.into(),
            type_name: type_name.into(),
        }
    }

    /// Create an ambiguous-binding error.
    pub fn ambiguous(
        expression: impl Into<String>,
        member: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::AmbiguousBinding {
            expression: expression.into(),
            member: member.into(),
            type_name: type_name.into(),
        }
    }

    /// Create a type-mismatch error from the expected and requested types.
    pub fn type_mismatch<Expected: ?Sized, Got: ?Sized>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<Expected>(),
            got: std::any::type_name::<Got>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PresentationError::unresolvable("{{Model.Nme}}", "Nme", "Model");
        assert_eq!(
            err.to_string(),
            "Cannot resolve binding '{{Model.Nme}}': no member 'Nme' on type Model"
        );

        let err = PresentationError::ReadOnlyProperty { name: "ActualWidth" };
        assert_eq!(err.to_string(), "Dependency property 'ActualWidth' is read-only");
    }

    #[test]
    fn test_type_mismatch_names() {
        let err = PresentationError::type_mismatch::<f32, f64>();
        assert_eq!(
            err,
            PresentationError::TypeMismatch {
                expected: "f32",
                got: "f64"
            }
        );
    }
}
