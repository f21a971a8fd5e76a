//! DOM exceptions
//!
//! Every fallible operation in the core reports one of these kinds
//! synchronously to its caller.

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomException>;

/// DOM exception kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DomException {
    /// An index or offset is outside the valid bounds
    #[error("IndexSizeError: the index is not in the allowed range")]
    IndexSize,

    /// The operation would yield an incorrect node tree
    #[error("HierarchyRequestError: the operation would yield an incorrect node tree")]
    HierarchyRequest,

    /// The object is in the wrong document
    #[error("WrongDocumentError: the object is in the wrong document")]
    WrongDocument,

    /// A name contains an invalid character
    #[error("InvalidCharacterError: the string contains invalid characters")]
    InvalidCharacter,

    /// The object can not be found here (also reported for stale handles)
    #[error("NotFoundError: the object can not be found here")]
    NotFound,

    /// The operation is not supported
    #[error("NotSupportedError: the operation is not supported")]
    NotSupported,

    /// The attribute is in use by another element
    #[error("InUseAttributeError: the attribute is in use by another element")]
    InUseAttribute,

    /// The object is in an invalid state
    #[error("InvalidStateError: the object is in an invalid state")]
    InvalidState,

    /// The string did not match the expected pattern
    #[error("SyntaxError: the string did not match the expected pattern")]
    Syntax,

    /// The operation is not allowed by namespaces in XML
    #[error("NamespaceError: the operation is not allowed by Namespaces in XML")]
    Namespace,

    /// The supplied node is incorrect or has an incorrect ancestor
    #[error("InvalidNodeTypeError: the supplied node is incorrect or has an incorrect ancestor")]
    InvalidNodeType,

    /// The operation was aborted
    #[error("AbortError: the operation was aborted")]
    Abort,

    /// An argument has the wrong type or shape
    #[error("TypeError: invalid argument")]
    Type,

    /// Allocation failed while growing internal storage
    #[error("out of memory")]
    OutOfMemory,
}

impl DomException {
    /// Legacy DOMException code (0 when the kind has none)
    pub fn code(self) -> u16 {
        match self {
            Self::IndexSize => 1,
            Self::HierarchyRequest => 3,
            Self::WrongDocument => 4,
            Self::InvalidCharacter => 5,
            Self::NotFound => 8,
            Self::NotSupported => 9,
            Self::InUseAttribute => 10,
            Self::InvalidState => 11,
            Self::Syntax => 12,
            Self::Namespace => 14,
            Self::Abort => 20,
            Self::InvalidNodeType => 24,
            Self::Type | Self::OutOfMemory => 0,
        }
    }

    /// DOMException name
    pub fn name(self) -> &'static str {
        match self {
            Self::IndexSize => "IndexSizeError",
            Self::HierarchyRequest => "HierarchyRequestError",
            Self::WrongDocument => "WrongDocumentError",
            Self::InvalidCharacter => "InvalidCharacterError",
            Self::NotFound => "NotFoundError",
            Self::NotSupported => "NotSupportedError",
            Self::InUseAttribute => "InUseAttributeError",
            Self::InvalidState => "InvalidStateError",
            Self::Syntax => "SyntaxError",
            Self::Namespace => "NamespaceError",
            Self::InvalidNodeType => "InvalidNodeTypeError",
            Self::Abort => "AbortError",
            Self::Type => "TypeError",
            Self::OutOfMemory => "OutOfMemoryError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_codes() {
        assert_eq!(DomException::IndexSize.code(), 1);
        assert_eq!(DomException::HierarchyRequest.code(), 3);
        assert_eq!(DomException::InvalidState.code(), 11);
        assert_eq!(DomException::InvalidNodeType.code(), 24);
        assert_eq!(DomException::OutOfMemory.code(), 0);
    }

    #[test]
    fn test_display_uses_dom_name() {
        let message = DomException::IndexSize.to_string();
        assert!(message.starts_with(DomException::IndexSize.name()));
    }
}
