use std::path::Path;

use opsagent_policy::validate_target_count_condition;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::AppConfig;

/// Parses `text` as a TOML [`AppConfig`] document and validates it,
/// failing fast on the error kinds this crate can catch statically:
/// an unknown `default_provider`, a routing rule naming an undefined
/// provider, or a policy rule with a malformed `target_count`
/// condition.
pub fn parse(text: &str) -> ConfigResult<AppConfig> {
    let config: AppConfig = toml::from_str(text)?;
    validate(&config)?;
    Ok(config)
}

/// Reads and parses a config file at `path`. See [`parse`] for
/// validation performed.
pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

fn validate(config: &AppConfig) -> ConfigResult<()> {
    if !config.llm.providers.contains_key(&config.llm.default_provider) {
        return Err(ConfigError::UnknownDefaultProvider(
            config.llm.default_provider.clone(),
        ));
    }

    for rule in &config.llm.routing {
        if !config.llm.providers.contains_key(&rule.provider) {
            return Err(ConfigError::UnknownRoutingProvider(
                rule.scenario.clone(),
                rule.provider.clone(),
            ));
        }
    }

    for rule in &config.policies {
        if let Some(condition) = &rule.condition.target_count {
            validate_target_count_condition(condition)
                .map_err(|e| ConfigError::MalformedPolicyRule(rule.name.clone(), e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [llm]
        default_provider = "claude"

        [llm.providers.claude]
        model = "claude-sonnet-4"
        api_key_env = "ANTHROPIC_API_KEY"

        [[policies]]
        name = "deny-prod-destructive"
        effect = "deny"
        message = "destructive ops are denied in prod"

        [policies.condition]
        env = "prod"
        action_type = "destructive"
    "#;

    #[test]
    fn parses_a_valid_document() {
        let config = parse(VALID).expect("valid config parses");
        assert_eq!(config.llm.default_provider, "claude");
        assert_eq!(config.policies.len(), 1);
    }

    #[test]
    fn rejects_unknown_default_provider() {
        let text = r#"
            [llm]
            default_provider = "zhipu"

            [llm.providers.claude]
            model = "claude-sonnet-4"
            api_key_env = "ANTHROPIC_API_KEY"
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDefaultProvider(p) if p == "zhipu"));
    }

    #[test]
    fn rejects_malformed_target_count_condition() {
        let text = r#"
            [llm]
            default_provider = "claude"

            [llm.providers.claude]
            model = "claude-sonnet-4"
            api_key_env = "ANTHROPIC_API_KEY"

            [[policies]]
            name = "bad-rule"
            effect = "deny"
            message = "x"

            [policies.condition]
            target_count = ">>5"
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedPolicyRule(name, _) if name == "bad-rule"));
    }
}
