//! Errors raised while turning inputs into a quote.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// Pre-flight failure: the inputs cannot anchor proration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The input document could not be read as quote inputs at all.
    #[error("Malformed inputs: {0}")]
    Malformed(String),
}

impl QuoteError {
    /// A stage's amounts left the decimal range.
    pub fn out_of_range(stage: &str) -> Self {
        QuoteError::InvalidInput(format!(
            "{stage} amounts are {}",
            crate::domain::lenient::OUT_OF_RANGE
        ))
    }
}
