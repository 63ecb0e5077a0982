use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplError {
    /// A constraint or basis matrix could not be inverted.
    #[error("Singular matrix: {0}")]
    Singular(String),

    /// Degenerate input data, e.g. a zero-width NURBS knot window.
    #[error("Degenerate geometry: {0}")]
    Degenerate(String),

    /// A curve or surface cannot be expressed in the requested form.
    #[error("Unsupported conversion: {0}")]
    Conversion(String),

    /// Structurally invalid input: bad order, mismatched array lengths,
    /// non-monotonic knots.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// An index referred to a segment, patch, or CV that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, SplError>;
