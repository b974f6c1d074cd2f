use crate::mackerel::{MackerelClient, Result};
use async_trait::async_trait;
use serde_json::Value;

/// A single operation exposed to the MCP host
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as seen by the caller
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments object
    fn parameters_schema(&self) -> Value;

    /// Run the tool and return the raw provider JSON
    async fn execute(&self, client: &MackerelClient, args: Value) -> Result<Value>;
}
