//! Error types.

use thiserror::Error;

/// Errors from parsing, reading or structurally setting a value path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path `{path}`: {reason}")]
    Invalid { path: String, reason: &'static str },

    #[error("cannot step into {found} with `{segment}`")]
    TypeMismatch { segment: String, found: &'static str },

    #[error("index {index} is out of bounds for an array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Errors from parsing a template string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("expression starting at byte {0} has no closing `}}`")]
    Unterminated(usize),

    #[error("empty expression at byte {0}")]
    Empty(usize),

    #[error("expression `{expression}`: {source}")]
    Path {
        expression: String,
        #[source]
        source: PathError,
    },
}

/// Errors from updating a context.
///
/// Callers that ignore the error observe the silent-recovery behavior: nothing was mutated and
/// nothing was propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextUpdateError {
    #[error("no context with id `{0}` in the ancestor chain")]
    NotFound(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("propagation exceeded {0} cascaded updates")]
    CascadeLimit(usize),

    #[error("context id `{0}` is reserved")]
    ReservedId(String),
}
