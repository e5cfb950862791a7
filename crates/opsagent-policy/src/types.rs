use opsagent_classify::ActionClass;
use opsagent_core::{Env, RiskLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a matched [`PolicyRule`] does to the call it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    /// Execution proceeds immediately.
    Allow,
    /// Execution is paused; the caller must re-invoke with a valid
    /// confirm token before it proceeds.
    RequireConfirm,
    /// Execution is refused outright.
    Deny,
}

/// The condition half of a [`PolicyRule`]. Every field is optional; an
/// absent field matches any value (wildcard-on-absence), matching the
/// reference policy engine this one generalizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyCondition {
    /// Matches only calls against this environment, if set.
    #[serde(default)]
    pub env: Option<Env>,
    /// Matches only calls classified with this action class, if set.
    #[serde(default)]
    pub action_type: Option<ActionClass>,
    /// Matches only calls whose target count satisfies this comparator
    /// string (e.g. `">5"`, `">=10"`, `"0"`), if set.
    #[serde(default)]
    pub target_count: Option<String>,
}

/// A single ordered policy rule: a name, a condition, an effect, and the
/// message surfaced to the caller when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Human-readable rule name, surfaced as `PolicyDecision::triggered_rule`.
    pub name: String,
    /// The condition that must hold for this rule to match.
    #[serde(default)]
    pub condition: PolicyCondition,
    /// What happens when this rule matches.
    pub effect: PolicyEffect,
    /// Message shown to the caller describing why the rule fired.
    pub message: String,
}

/// The outcome of [`crate::PolicyEngine::check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// What to do with the call.
    pub effect: PolicyEffect,
    /// Human-readable explanation, taken from the triggered rule (or a
    /// default message when no rule matched).
    pub message: String,
    /// Name of the rule that produced this decision, if any rule matched.
    pub triggered_rule: Option<String>,
    /// One-shot token the caller must present to proceed, present only
    /// when `effect == RequireConfirm`.
    pub confirm_token: Option<String>,
    /// Risk level computed from the action class and environment.
    pub risk_level: RiskLevel,
    /// Additional context (currently `env` and `action_type`).
    pub metadata: Value,
}

/// A minted, not-yet-consumed confirmation token and the call it was
/// minted for.
#[derive(Debug, Clone)]
pub struct ConfirmToken {
    /// Name of the rule that required confirmation.
    pub rule: String,
    /// The original call arguments, returned verbatim on consume so the
    /// caller can re-run the same operation.
    pub args: Value,
    /// Unix timestamp (seconds) the token was minted at.
    pub created_at: i64,
}
