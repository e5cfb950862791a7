use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ToolExecError, ToolExecResult};
use crate::types::{ToolDefinition, ToolResult};

/// A tool the agent loop can invoke by name.
///
/// Implementations are responsible for their own policy checks: a tool
/// that touches something sensitive must consult the policy engine
/// itself (see `opsagent-policy`) rather than relying on its caller to
/// do so.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name; must match [`ToolDefinition::name`] and the
    /// key this tool is registered under.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input arguments.
    fn input_schema(&self) -> Value;

    /// Runs the tool against `args`, already validated (loosely) against
    /// `input_schema` by the caller.
    async fn execute(&self, args: Value) -> ToolResult;

    /// Convenience: bundles [`Self::name`], [`Self::description`], and
    /// [`Self::input_schema`] into one [`ToolDefinition`], the shape
    /// handed to LLM providers.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A name-indexed collection of [`Tool`]s.
///
/// Registration rejects duplicate names outright rather than silently
/// overwriting, since a shadowed tool would otherwise disappear from
/// `list_tools`/`get_mcp_definitions` without any diagnostic.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under its own `name()`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolExecError::DuplicateTool`] if a tool with the same
    /// name is already registered.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> ToolExecResult<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolExecError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Lists all registered tools in unspecified order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    /// Lists the [`ToolDefinition`] for every registered tool, the shape
    /// handed to LLM providers as the tool-use catalog.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::success(args.to_string())
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        let err = registry.register(Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, ToolExecError::DuplicateTool(name) if name == "echo"));
    }

    #[tokio::test]
    async fn registered_tool_is_reachable_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        let tool = registry.get("echo").expect("registered");
        let result = tool.execute(serde_json::json!({"x": 1})).await;
        assert_eq!(result.output, r#"{"x":1}"#);
    }

    #[test]
    fn definitions_cover_every_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}
