//! Error types for the object runtime

/// Result type for object runtime calls
pub type ObjectResult<T> = Result<T, ObjectError>;

/// Object runtime error types
///
/// Registry and instantiation errors are expected to abort startup by
/// convention; the runtime itself only reports them. `InterfaceNotImplemented`
/// doubles as the answer to a capability probe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    /// A type with this name is already registered
    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    /// No type with this name is registered
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// The parent named by a descriptor never got registered
    #[error("Type '{type_name}' has unknown parent '{parent}'")]
    UnknownParent {
        /// Type whose parent is missing
        type_name: String,
        /// Missing parent name
        parent: String,
    },

    /// Abstract types can have their class resolved but cannot be instantiated
    #[error("Type '{0}' is abstract and cannot be instantiated")]
    AbstractType(String),

    /// Malformed type descriptor
    #[error("Invalid type descriptor '{type_name}': {reason}")]
    InvalidDescriptor {
        /// Offending type
        type_name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Cast to a type outside the instance's ancestor chain
    #[error("Object of type '{type_name}' is not an instance of '{target}'")]
    InvalidCast {
        /// Dynamic type of the object
        type_name: String,
        /// Requested type
        target: String,
    },

    /// Interface cast failed
    #[error("Type '{type_name}' does not implement interface '{interface}'")]
    InterfaceNotImplemented {
        /// Dynamic type of the object
        type_name: String,
        /// Requested interface
        interface: String,
    },

    /// Property lookup failed
    #[error("Property '{0}' not found")]
    NoSuchProperty(String),

    /// Property has no getter
    #[error("Property '{0}' is not readable")]
    NotReadable(String),

    /// Property has no setter
    #[error("Property '{0}' is not writable")]
    NotWritable(String),

    /// Property name already taken on the owner
    #[error("Duplicate property name '{0}'")]
    DuplicateProperty(String),

    /// Visitor or setter rejected a value
    #[error("{0}")]
    ValidationFailed(String),

    /// Transition not allowed (flip property closed without a close hook)
    #[error("Permission denied")]
    PermissionDenied,

    /// Object handle refers to a finalized instance
    #[error("Object {0} no longer exists")]
    InvalidObject(String),

    /// Attaching the child would create a cycle in the ownership tree
    #[error("Cannot attach '{child}' below '{parent}': it is an ancestor of its new parent")]
    OwnershipCycle {
        /// Object being attached
        child: String,
        /// Requested parent
        parent: String,
    },

    /// Path does not resolve to an object
    #[error("Path '{0}' not found")]
    NoSuchPath(String),

    /// Partial path matches more than one object
    #[error("Path '{0}' is ambiguous")]
    AmbiguousPath(String),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain error raised by a hook
    #[error("{0}")]
    Failed(String),
}

impl ObjectError {
    /// Build a `ValidationFailed` for a value of the wrong type
    pub fn invalid_type(name: &str, expected: &str) -> Self {
        ObjectError::ValidationFailed(format!(
            "Invalid parameter type for '{}', expected: {}",
            name, expected
        ))
    }

    /// Whether this error only signals that a capability is absent
    pub fn is_capability_absence(&self) -> bool {
        matches!(self, ObjectError::InterfaceNotImplemented { .. })
    }
}

impl From<String> for ObjectError {
    fn from(s: String) -> Self {
        ObjectError::Failed(s)
    }
}

impl From<&str> for ObjectError {
    fn from(s: &str) -> Self {
        ObjectError::Failed(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_errors_display_verbatim() {
        let err: ObjectError = "open failed".into();
        assert_eq!(err.to_string(), "open failed");
    }

    #[test]
    fn test_invalid_type_message() {
        let err = ObjectError::invalid_type("opened", "bool");
        assert_eq!(
            err.to_string(),
            "Invalid parameter type for 'opened', expected: bool"
        );
    }

    #[test]
    fn test_capability_absence() {
        let err = ObjectError::InterfaceNotImplemented {
            type_name: "pic".to_string(),
            interface: "stream-sink".to_string(),
        };
        assert!(err.is_capability_absence());
        assert!(!ObjectError::PermissionDenied.is_capability_absence());
    }
}
