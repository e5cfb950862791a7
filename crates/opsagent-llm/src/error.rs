use thiserror::Error;

/// Errors raised by provider modules and the router.
///
/// These are *provider-level* errors (§7 kind 2 "Provider error" in the
/// originating design): a vendor API failure, auth failure, or
/// misconfiguration. The agent loop surfaces these as a loop-terminating
/// response with `stop_reason: Error` rather than retrying; a caller may
/// retry the whole turn.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The environment variable a provider config names for its API key
    /// is unset. Fatal at router construction time (configuration
    /// error, not a provider error, but surfaced through this type
    /// since the router has no narrower error type of its own).
    #[error("API key environment variable {env_var:?} is not set for provider {provider:?}")]
    ApiKeyMissing {
        /// Provider name this key belongs to.
        provider: String,
        /// The environment variable name the config names.
        env_var: String,
    },

    /// A router lookup named a provider with no matching config entry.
    #[error("provider {0:?} is not configured")]
    UnknownProvider(String),

    /// The HTTP transport failed outright (DNS, connect, TLS, timeout).
    #[error("request to {provider} failed: {source}")]
    Transport {
        /// Provider name.
        provider: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The vendor returned a non-2xx response.
    #[error("{provider} returned HTTP {status}: {body}")]
    ApiError {
        /// Provider name.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated by the caller if large.
        body: String,
    },

    /// The vendor's response body did not match the shape this module
    /// expects.
    #[error("could not parse {provider} response: {0}", provider = .provider)]
    InvalidResponse {
        /// Provider name.
        provider: String,
        /// Parse failure detail.
        #[source]
        source: serde_json::Error,
    },

    /// Streaming was requested with a non-empty tool catalog, which
    /// this core does not support; callers must fall back to
    /// `chat` instead.
    #[error("streaming with tools is not supported; call chat() instead")]
    StreamingWithToolsUnsupported,
}

/// Convenience alias for fallible LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
