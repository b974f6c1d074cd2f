// ToolRegistry - Owns the tool set and the single error boundary
//
// Every call ends in a `ToolResult` with one text block: the raw provider JSON
// on success, `{"error": "<message>"}` on any failure. Errors never leave here.

use crate::mackerel::{MackerelClient, MackerelError, Result};
use crate::mcp::protocol::{ToolDefinition, ToolResult};
use crate::tools::mackerel::all_tools;
use crate::tools::traits::Tool;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

/// Argument keys worth echoing into logs
const KEY_ARGUMENTS: &[&str] = &[
    "host_id",
    "service_name",
    "service",
    "role",
    "status",
    "name",
    "monitor_id",
    "alert_id",
    "downtime_id",
    "channel_id",
    "from_time",
    "to_time",
];

/// Where tool calls get their API client from
#[derive(Debug, Clone)]
pub enum ClientSource {
    /// Shared immutable client built once at startup
    Ready(Arc<MackerelClient>),
    /// Credentials could not be resolved; every call reports this reason
    Unavailable { reason: String },
}

impl ClientSource {
    pub fn from_result(result: Result<MackerelClient>) -> Self {
        match result {
            Ok(client) => Self::Ready(Arc::new(client)),
            Err(MackerelError::Configuration { reason }) => Self::Unavailable { reason },
            Err(other) => Self::Unavailable {
                reason: other.to_string(),
            },
        }
    }

    fn resolve(&self) -> Result<Arc<MackerelClient>> {
        match self {
            Self::Ready(client) => Ok(Arc::clone(client)),
            Self::Unavailable { reason } => Err(MackerelError::configuration(reason.clone())),
        }
    }
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    client: ClientSource,
}

impl ToolRegistry {
    /// Registry with every Mackerel tool
    pub fn new(client: ClientSource) -> Self {
        Self::with_tools(client, all_tools())
    }

    pub fn with_tools(client: ClientSource, tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools, client }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Invoke a tool by name. `None` means no such tool is registered.
    pub async fn call(&self, name: &str, args: Value) -> Option<ToolResult> {
        let tool = self.find(name)?;
        let summary = summarize_arguments(&args);
        tracing::info!(tool = name, args = %summary, "Calling tool");

        let started = Instant::now();
        let outcome = match self.client.resolve() {
            Ok(client) => tool.execute(&client, args).await,
            Err(err) => Err(err),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        Some(match outcome {
            Ok(value) => {
                tracing::info!(tool = name, elapsed_ms, "Tool call succeeded");
                ToolResult::json(&value)
            }
            Err(err) => {
                tracing::error!(
                    tool = name,
                    args = %summary,
                    kind = err.kind(),
                    status = err.status(),
                    elapsed_ms,
                    error = %err,
                    "Tool call failed"
                );
                ToolResult::error(err.to_string())
            }
        })
    }
}

/// Render the identifying arguments of a call as `key=value` pairs
pub fn summarize_arguments(args: &Value) -> String {
    let mut summary = String::new();
    let Some(map) = args.as_object() else {
        return summary;
    };

    for key in KEY_ARGUMENTS {
        let Some(value) = map.get(*key) else {
            continue;
        };
        if !summary.is_empty() {
            summary.push(' ');
        }
        match value {
            Value::String(s) => {
                let _ = write!(summary, "{key}={s}");
            }
            other => {
                let _ = write!(summary, "{key}={other}");
            }
        }
    }

    if let Some(metrics) = map.get("metrics").and_then(Value::as_array) {
        if !summary.is_empty() {
            summary.push(' ');
        }
        let _ = write!(summary, "metrics_count={}", metrics.len());
    }

    summary
}
