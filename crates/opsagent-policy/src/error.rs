use thiserror::Error;

/// Errors raised while evaluating or configuring policy rules.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A `target_count` condition string did not parse as a comparator
    /// (`>`, `>=`, `<`, `<=`, `==`) followed by an integer, or as a bare
    /// integer.
    #[error("malformed target_count condition: {0:?}")]
    MalformedTargetCount(String),
}

/// Convenience alias for fallible policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
