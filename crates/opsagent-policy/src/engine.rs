use dashmap::DashMap;
use opsagent_classify::{classify_command, ActionClass};
use opsagent_core::{Env, RiskLevel};
use rand::RngCore;
use serde_json::{json, Value};

use crate::error::{PolicyError, PolicyResult};
use crate::types::{ConfirmToken, PolicyCondition, PolicyDecision, PolicyEffect, PolicyRule};

/// Confirm tokens expire this many seconds after being minted, enforced
/// identically on both [`PolicyEngine::validate_confirm_token`] and
/// [`PolicyEngine::consume_confirm_token`].
pub const TOKEN_TTL_SECONDS: i64 = 300;

/// Evaluates an ordered list of [`PolicyRule`]s against tool calls and
/// manages the one-shot confirm-token lifecycle for `RequireConfirm`
/// decisions.
///
/// Rules are tried in order; the first whose [`PolicyCondition`] matches
/// wins. A call matching no rule is allowed with `RiskLevel::Low`.
#[derive(Debug)]
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
    confirm_tokens: DashMap<String, ConfirmToken>,
}

impl PolicyEngine {
    /// Builds an engine over the given ordered rule set.
    #[must_use]
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules,
            confirm_tokens: DashMap::new(),
        }
    }

    /// Evaluates `tool_name`/`args` against the configured rules.
    ///
    /// `env` defaults to the `"env"` key in `args` (or [`Env::Dev`]) when
    /// not given explicitly. `action_type` is inferred from `args.command`
    /// via [`classify_command`] only for `tool_name == "ssh_exec"`, matching
    /// the reference engine's single point of automatic inference; callers
    /// of other tools must pass `action_type` explicitly if they want
    /// classification-sensitive rules to apply.
    #[tracing::instrument(skip(self, args))]
    pub fn check(
        &self,
        tool_name: &str,
        args: &Value,
        env: Option<Env>,
        action_type: Option<ActionClass>,
    ) -> PolicyResult<PolicyDecision> {
        let env = env.unwrap_or_else(|| {
            args.get("env")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or(Env::Dev)
        });

        let action_type = action_type.or_else(|| {
            if tool_name == "ssh_exec" {
                let command = args.get("command").and_then(Value::as_str).unwrap_or("");
                Some(classify_command(command))
            } else {
                None
            }
        });

        let target_count = Self::target_count(tool_name, args);

        for rule in &self.rules {
            if Self::matches(&rule.condition, env, action_type, target_count)? {
                return Ok(self.decide(rule, env, action_type, args));
            }
        }

        Ok(PolicyDecision {
            effect: PolicyEffect::Allow,
            message: "operation allowed".to_string(),
            triggered_rule: None,
            confirm_token: None,
            risk_level: RiskLevel::Low,
            metadata: json!({ "env": env.to_string(), "action_type": action_type }),
        })
    }

    /// Checks whether `token` exists and has not exceeded
    /// [`TOKEN_TTL_SECONDS`]. Expired tokens are reaped (removed) as a
    /// side effect of inspection.
    pub fn validate_confirm_token(&self, token: &str) -> bool {
        let Some(entry) = self.confirm_tokens.get(token) else {
            return false;
        };
        let expired = now_unix() - entry.created_at > TOKEN_TTL_SECONDS;
        drop(entry);
        if expired {
            self.confirm_tokens.remove(token);
            return false;
        }
        true
    }

    /// Atomically removes and returns the token's original call
    /// arguments. Returns `None` for an unknown or already-consumed
    /// token. Does not re-check TTL; callers should call
    /// [`PolicyEngine::validate_confirm_token`] first if they need the
    /// distinction between "expired" and "never existed".
    pub fn consume_confirm_token(&self, token: &str) -> Option<ConfirmToken> {
        self.confirm_tokens.remove(token).map(|(_, v)| v)
    }

    fn decide(
        &self,
        rule: &PolicyRule,
        env: Env,
        action_type: Option<ActionClass>,
        args: &Value,
    ) -> PolicyDecision {
        let confirm_token = match rule.effect {
            PolicyEffect::RequireConfirm => Some(self.mint_confirm_token(rule, args)),
            _ => None,
        };

        let risk_level = match action_type {
            Some(ActionClass::Destructive) => {
                if env == Env::Prod {
                    RiskLevel::Critical
                } else {
                    RiskLevel::High
                }
            }
            Some(ActionClass::Write) => {
                if env == Env::Prod {
                    RiskLevel::High
                } else {
                    RiskLevel::Medium
                }
            }
            _ => RiskLevel::Low,
        };

        PolicyDecision {
            effect: rule.effect,
            message: rule.message.clone(),
            triggered_rule: Some(rule.name.clone()),
            confirm_token,
            risk_level,
            metadata: json!({ "env": env.to_string(), "action_type": action_type }),
        }
    }

    /// Mints a confirm token carrying the original call arguments, so a
    /// caller re-invoking with `_confirm_token` gets back the exact
    /// request that required confirmation.
    fn mint_confirm_token(&self, rule: &PolicyRule, args: &Value) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = format!("conf_{}", hex::encode(bytes));
        self.confirm_tokens.insert(
            token.clone(),
            ConfirmToken {
                rule: rule.name.clone(),
                args: args.clone(),
                created_at: now_unix(),
            },
        );
        token
    }

    fn target_count(tool_name: &str, args: &Value) -> i64 {
        match tool_name {
            "ssh_exec" => 1,
            "ssh_exec_batch" => args
                .get("hosts")
                .and_then(Value::as_array)
                .map_or(0, |hosts| hosts.len() as i64),
            _ => 0,
        }
    }

    fn matches(
        condition: &PolicyCondition,
        env: Env,
        action_type: Option<ActionClass>,
        target_count: i64,
    ) -> PolicyResult<bool> {
        if let Some(want_env) = condition.env {
            if want_env != env {
                return Ok(false);
            }
        }

        if let Some(ref want_class) = condition.action_type {
            match action_type {
                Some(actual) if actual == *want_class => {}
                _ => return Ok(false),
            }
        }

        if let Some(ref cond) = condition.target_count {
            if !check_target_count(target_count, cond)? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Validates that `condition` parses as a `target_count` comparator
/// string (`">5"`, `">=10"`, `"0"`, etc.) without evaluating it against
/// any particular count. Exposed so configuration loaders can fail fast
/// on a malformed rule at load time rather than at first evaluation.
///
/// # Errors
///
/// Returns [`PolicyError::MalformedTargetCount`] if `condition` is not a
/// valid comparator string.
pub fn validate_target_count_condition(condition: &str) -> PolicyResult<()> {
    check_target_count(0, condition).map(|_| ())
}

fn check_target_count(count: i64, condition: &str) -> PolicyResult<bool> {
    let parse_rest = |rest: &str| {
        rest.parse::<i64>()
            .map_err(|_| PolicyError::MalformedTargetCount(condition.to_string()))
    };

    if let Some(rest) = condition.strip_prefix(">=") {
        return Ok(count >= parse_rest(rest)?);
    }
    if let Some(rest) = condition.strip_prefix("<=") {
        return Ok(count <= parse_rest(rest)?);
    }
    if let Some(rest) = condition.strip_prefix("==") {
        return Ok(count == parse_rest(rest)?);
    }
    if let Some(rest) = condition.strip_prefix('>') {
        return Ok(count > parse_rest(rest)?);
    }
    if let Some(rest) = condition.strip_prefix('<') {
        return Ok(count < parse_rest(rest)?);
    }
    Ok(count == parse_rest(condition)?)
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(name: &str, condition: PolicyCondition, effect: PolicyEffect) -> PolicyRule {
        PolicyRule {
            name: name.to_string(),
            condition,
            effect,
            message: format!("{name} fired"),
        }
    }

    #[test]
    fn default_allows_when_no_rule_matches() {
        let engine = PolicyEngine::new(vec![]);
        let decision = engine
            .check("ssh_exec", &json!({"command": "ls", "env": "dev"}), None, None)
            .unwrap();
        assert_eq!(decision.effect, PolicyEffect::Allow);
        assert!(decision.triggered_rule.is_none());
    }

    #[test]
    fn destructive_in_prod_requires_confirm_and_mints_token() {
        let rules = vec![rule(
            "deny-destructive-prod",
            PolicyCondition {
                env: Some(Env::Prod),
                action_type: Some(ActionClass::Destructive),
                target_count: None,
            },
            PolicyEffect::RequireConfirm,
        )];
        let engine = PolicyEngine::new(rules);
        let decision = engine
            .check(
                "ssh_exec",
                &json!({"command": "rm -rf /", "env": "prod"}),
                None,
                None,
            )
            .unwrap();
        assert_eq!(decision.effect, PolicyEffect::RequireConfirm);
        assert_eq!(decision.risk_level, RiskLevel::Critical);
        let token = decision.confirm_token.expect("token minted");
        assert!(token.starts_with("conf_"));
        assert!(engine.validate_confirm_token(&token));
        assert!(engine.consume_confirm_token(&token).is_some());
        // one-shot: second consume fails
        assert!(engine.consume_confirm_token(&token).is_none());
    }

    #[test]
    fn target_count_rule_matches_batch_size() {
        let rules = vec![rule(
            "large-batch-requires-confirm",
            PolicyCondition {
                env: None,
                action_type: None,
                target_count: Some(">5".to_string()),
            },
            PolicyEffect::RequireConfirm,
        )];
        let engine = PolicyEngine::new(rules);

        let small = engine
            .check(
                "ssh_exec_batch",
                &json!({"hosts": ["a", "b", "c"]}),
                Some(Env::Dev),
                None,
            )
            .unwrap();
        assert_eq!(small.effect, PolicyEffect::Allow);

        let large = engine
            .check(
                "ssh_exec_batch",
                &json!({"hosts": ["a", "b", "c", "d", "e", "f"]}),
                Some(Env::Dev),
                None,
            )
            .unwrap();
        assert_eq!(large.effect, PolicyEffect::RequireConfirm);
    }

    #[test]
    fn malformed_target_count_condition_errors() {
        let rules = vec![rule(
            "bad-condition",
            PolicyCondition {
                env: None,
                action_type: None,
                target_count: Some(">>5".to_string()),
            },
            PolicyEffect::Deny,
        )];
        let engine = PolicyEngine::new(rules);
        let result = engine.check("ssh_exec_batch", &json!({"hosts": []}), Some(Env::Dev), None);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_or_expired_token_fails_validation() {
        let engine = PolicyEngine::new(vec![]);
        assert!(!engine.validate_confirm_token("conf_does_not_exist"));
    }
}
