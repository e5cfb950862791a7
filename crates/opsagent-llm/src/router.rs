//! Provider router: selects and memoizes an [`LlmProvider`] instance
//! from an explicit name, a scenario routing rule, or the configured
//! default, in that priority order.

use std::sync::Arc;

use dashmap::DashMap;
use opsagent_config::LlmConfig;

use crate::claude::ClaudeProvider;
use crate::error::{LlmError, LlmResult};
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::provider::{LlmProvider, ProviderHttpConfig};

/// Routes provider lookups against an `[llm]` configuration table and
/// caches the resulting instances.
///
/// Each configured provider is constructed at most once: a second
/// lookup for the same resolved name reuses the first instance rather
/// than re-reading the environment and rebuilding an HTTP client.
pub struct ProviderRouter {
    config: LlmConfig,
    instances: DashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRouter {
    /// Builds a router over a loaded `[llm]` configuration table. Does
    /// not touch the environment or build any provider instance until
    /// the first [`Self::get_provider`] call.
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            instances: DashMap::new(),
        }
    }

    /// Resolves and returns a provider instance.
    ///
    /// Priority order: `provider_name` if given, else the first
    /// routing rule matching `scenario`, else `config.default_provider`.
    /// The chosen name must have a `[llm.providers.<name>]` entry and a
    /// set API key environment variable; both failures are reported
    /// before any HTTP client is built.
    pub fn get_provider(
        &self,
        provider_name: Option<&str>,
        scenario: Option<&str>,
    ) -> LlmResult<Arc<dyn LlmProvider>> {
        let selected = self.route(provider_name, scenario)?;

        if let Some(existing) = self.instances.get(&selected) {
            return Ok(Arc::clone(&existing));
        }

        let instance = self.build_provider(&selected)?;
        self.instances.insert(selected, Arc::clone(&instance));
        Ok(instance)
    }

    fn route(&self, provider_name: Option<&str>, scenario: Option<&str>) -> LlmResult<String> {
        if let Some(name) = provider_name {
            if !self.config.providers.contains_key(name) {
                return Err(LlmError::UnknownProvider(name.to_string()));
            }
            return Ok(name.to_string());
        }

        if let Some(scenario) = scenario {
            if let Some(rule) = self.config.routing.iter().find(|r| r.scenario == scenario) {
                return Ok(rule.provider.clone());
            }
        }

        Ok(self.config.default_provider.clone())
    }

    fn build_provider(&self, name: &str) -> LlmResult<Arc<dyn LlmProvider>> {
        let provider_config = self
            .config
            .providers
            .get(name)
            .ok_or_else(|| LlmError::UnknownProvider(name.to_string()))?;

        let api_key = std::env::var(&provider_config.api_key_env).map_err(|_| {
            LlmError::ApiKeyMissing {
                provider: name.to_string(),
                env_var: provider_config.api_key_env.clone(),
            }
        })?;

        let http_config = ProviderHttpConfig {
            api_key,
            model: provider_config.model.clone(),
            max_tokens: provider_config.max_tokens,
            temperature: provider_config.temperature,
            base_url: None,
        };

        let provider: Arc<dyn LlmProvider> = match name {
            "claude" => Arc::new(ClaudeProvider::new(http_config)),
            "gemini" => Arc::new(GeminiProvider::new(http_config)),
            other => Arc::new(OpenAiCompatProvider::new(http_config, other.to_string())),
        };

        Ok(provider)
    }

    /// Lists every provider name configured under `[llm.providers]`,
    /// regardless of whether it has been instantiated yet.
    #[must_use]
    pub fn list_providers(&self) -> Vec<String> {
        self.config.providers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsagent_config::{ProviderConfig, RoutingRule};
    use std::collections::HashMap;

    fn test_config() -> LlmConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "claude".to_string(),
            ProviderConfig {
                model: "claude-sonnet-4".to_string(),
                api_key_env: "OPSAGENT_TEST_CLAUDE_KEY".to_string(),
                max_tokens: 4096,
                temperature: 0.7,
            },
        );
        providers.insert(
            "zhipu".to_string(),
            ProviderConfig {
                model: "glm-4-plus".to_string(),
                api_key_env: "OPSAGENT_TEST_ZHIPU_KEY".to_string(),
                max_tokens: 4096,
                temperature: 0.7,
            },
        );
        LlmConfig {
            default_provider: "claude".to_string(),
            providers,
            routing: vec![RoutingRule {
                scenario: "cheap".to_string(),
                provider: "zhipu".to_string(),
                model: None,
            }],
        }
    }

    #[test]
    fn explicit_name_wins_over_scenario_and_default() {
        let router = ProviderRouter::new(test_config());
        let selected = router.route(Some("zhipu"), Some("cheap")).unwrap();
        assert_eq!(selected, "zhipu");
    }

    #[test]
    fn scenario_routing_wins_over_default_when_no_explicit_name() {
        let router = ProviderRouter::new(test_config());
        let selected = router.route(None, Some("cheap")).unwrap();
        assert_eq!(selected, "zhipu");
    }

    #[test]
    fn falls_back_to_default_provider() {
        let router = ProviderRouter::new(test_config());
        let selected = router.route(None, None).unwrap();
        assert_eq!(selected, "claude");
    }

    #[test]
    fn explicit_name_not_in_config_is_rejected() {
        let router = ProviderRouter::new(test_config());
        let result = router.route(Some("does-not-exist"), None);
        assert!(matches!(result, Err(LlmError::UnknownProvider(_))));
    }

    #[test]
    fn missing_api_key_env_var_is_fail_fast() {
        std::env::remove_var("OPSAGENT_TEST_CLAUDE_KEY");
        let router = ProviderRouter::new(test_config());
        let result = router.get_provider(Some("claude"), None);
        assert!(matches!(result, Err(LlmError::ApiKeyMissing { .. })));
    }

    #[test]
    fn instances_are_memoized_across_lookups() {
        std::env::set_var("OPSAGENT_TEST_CLAUDE_KEY", "sk-test");
        let router = ProviderRouter::new(test_config());
        let first = router.get_provider(Some("claude"), None).unwrap();
        let second = router.get_provider(Some("claude"), None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        std::env::remove_var("OPSAGENT_TEST_CLAUDE_KEY");
    }
}
