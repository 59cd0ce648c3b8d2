use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A named, schema-described callable the model may invoke mid-stream.
///
/// `parameters` is a JSON-schema object describing `execute`'s argument
/// payload. Execution happens outside the streaming core; results are
/// opaque JSON handed back to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Serializable projection of a tool for request payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Set of tools exposed to a turn.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Execute a tool by name. Unknown names are an error; the turn runner
    /// converts failures into error-shaped results rather than aborting
    /// the stream.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value> {
        let Some(tool) = self.get(name) else {
            anyhow::bail!("Unknown tool: {}", name);
        };

        tracing::debug!(tool = name, "executing tool");
        tool.execute(args).await
    }
}
