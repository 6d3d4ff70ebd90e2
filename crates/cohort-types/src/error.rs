//! Parse errors for textual type representations.

/// Errors raised when parsing labels and time units from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The text is not a valid integer range (`a`, `a-b`, or `a+`).
    #[error("invalid integer range: {input:?}")]
    InvalidRange {
        /// The rejected input.
        input: String,
    },

    /// The range bounds are reversed.
    #[error("integer range {min}-{max} has min greater than max")]
    ReversedRange {
        /// Lower bound as written.
        min: i32,
        /// Upper bound as written.
        max: i32,
    },

    /// The text is not a valid compound time unit (`1y`, `6m`).
    #[error("invalid time unit: {input:?}")]
    InvalidTimeUnit {
        /// The rejected input.
        input: String,
    },
}
