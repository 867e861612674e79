use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the pricing and recommendation engines.
///
/// `UpstreamTimeout` is internal-recoverable: the public entry points catch
/// it and fall back to the last-known-good cached value (or a deterministic
/// cold-start result), so callers of `optimize_price` / `get_recommendations`
/// only ever observe `Configuration` and `InvalidState`.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Missing or inconsistent configuration (no pricing constraints for a
    /// product, score weights not summing to 1, min > max).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-finite or out-of-range inputs to the pricing state. Raised before
    /// any learning-state mutation.
    #[error("invalid pricing state: {0}")]
    InvalidState(String),

    /// A provider call exceeded its deadline and no cached value was
    /// available. Logged and degraded, never surfaced by the public API.
    #[error("upstream {provider} timed out after {deadline_ms}ms")]
    UpstreamTimeout {
        provider: &'static str,
        deadline_ms: u64,
    },
}

impl Error {
    /// Configuration error with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Invalid-state error with a formatted message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// True for errors the engines recover from via cached fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }
}
