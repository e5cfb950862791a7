use thiserror::Error;

/// Errors raised while loading or validating an [`crate::AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file's contents did not parse as valid TOML against
    /// the expected schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// `llm.default_provider` names a provider absent from
    /// `llm.providers`.
    #[error("default_provider {0:?} is not defined under [llm.providers]")]
    UnknownDefaultProvider(String),
    /// A routing rule names a provider absent from `llm.providers`.
    #[error("routing rule for scenario {0:?} references undefined provider {1:?}")]
    UnknownRoutingProvider(String, String),
    /// A policy rule's `target_count` condition did not parse.
    #[error("policy rule {0:?} has a malformed target_count condition: {1}")]
    MalformedPolicyRule(String, #[source] opsagent_policy::PolicyError),
}

/// Convenience alias for fallible config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
