//! Shared vocabulary for the ops-agent workspace: environment and risk
//! classification, and the identifier newtypes threaded through sessions,
//! tool calls, and audit records.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The deployment environment a policy decision or tool call is made in.
///
/// Absence of an explicit environment defaults to [`Env::Dev`] throughout
/// the workspace, matching the operator tooling this runtime was modeled
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Env {
    /// Local or shared development environment. Least restrictive.
    Dev,
    /// Pre-production environment.
    Staging,
    /// Production environment. Most restrictive.
    Prod,
}

impl Default for Env {
    fn default() -> Self {
        Self::Dev
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Env {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" => Ok(Self::Prod),
            other => Err(ParseEnvError(other.to_string())),
        }
    }
}

/// Returned when a string does not name a known [`Env`] variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown environment: {0}")]
pub struct ParseEnvError(String);

/// Severity assigned to a classified action, combining its [`ActionClass`]
/// (from `opsagent-classify`) with the [`Env`] it runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only or informational action.
    Low,
    /// Mutating action in a non-production environment.
    Medium,
    /// Mutating action in production, or a destructive action anywhere
    /// outside production.
    High,
    /// Destructive action in production.
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Identifies a single agent-loop session end to end: one user turn
/// through however many tool-use iterations it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Mints a fresh random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a single tool call within a session, shared by the tool
/// contract, the executor, and the audit store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Mints a fresh random call id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call_{}", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_roundtrips_through_display_and_fromstr() {
        for env in [Env::Dev, Env::Staging, Env::Prod] {
            let parsed: Env = env.to_string().parse().unwrap();
            assert_eq!(parsed, env);
        }
    }

    #[test]
    fn env_default_is_dev() {
        assert_eq!(Env::default(), Env::Dev);
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn call_id_displays_with_prefix() {
        let id = CallId::new();
        assert!(id.to_string().starts_with("call_"));
    }
}
