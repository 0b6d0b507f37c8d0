//! Error types for the ductus content-stream engine.

use thiserror::Error;

/// Primary error type for content-stream rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("malformed operator sequence at `{op}`: {reason}")]
    MalformedOperatorSequence { op: String, reason: String },

    #[error("unresolvable {category} resource: /{name}")]
    UnresolvableResource {
        category: &'static str,
        name: String,
    },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("unterminated inline image data starting at byte {pos}")]
    UnterminatedInlineImage { pos: usize },

    #[error("invalid function definition: {0}")]
    InvalidFunctionDefinition(String),

    #[error("invalid color space definition: {0}")]
    InvalidColorSpaceDefinition(String),

    #[error("illegal color space usage: {0}")]
    IllegalColorSpaceUsage(String),

    #[error("invalid shading: {0}")]
    InvalidShading(String),

    #[error("invalid XObject: {0}")]
    InvalidXObject(String),

    #[error("syntax error at byte {pos}: {msg}")]
    Syntax { pos: usize, msg: String },

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("recursion limit exceeded: {0}")]
    RecursionLimit(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Build a `MalformedOperatorSequence` error for operator `op`.
    pub fn malformed(op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedOperatorSequence {
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Whether the interpreter may skip the failing paint and keep going.
    ///
    /// Missing fonts, graphics-state dictionaries, shadings and patterns only
    /// lose the paint that referenced them. Missing color spaces and XObjects
    /// are structural and abort the page.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnsupportedFeature(_) | Self::IllegalColorSpaceUsage(_) => true,
            Self::UnresolvableResource { category, .. } => matches!(
                *category,
                "Font" | "ExtGState" | "Shading" | "Pattern" | "Properties"
            ),
            _ => false,
        }
    }
}

/// Convenience Result type alias for RenderError.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(RenderError::UnsupportedFeature("mesh".into()).is_recoverable());
        assert!(
            RenderError::UnresolvableResource {
                category: "Font",
                name: "F1".into()
            }
            .is_recoverable()
        );
        assert!(
            !RenderError::UnresolvableResource {
                category: "XObject",
                name: "Im1".into()
            }
            .is_recoverable()
        );
        assert!(!RenderError::UnterminatedInlineImage { pos: 3 }.is_recoverable());
    }

    #[test]
    fn test_malformed_message() {
        let err = RenderError::malformed("re", "expected 4 operands, found 3");
        assert_eq!(
            err.to_string(),
            "malformed operator sequence at `re`: expected 4 operands, found 3"
        );
    }
}
