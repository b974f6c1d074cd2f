// MCP server over newline-delimited JSON-RPC
//
// `tools/call` runs on its own task so several calls can be in flight at once;
// everything else is answered inline. Responses funnel through one writer.

use crate::mcp::error::McpError;
use crate::mcp::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolResult, ToolsCapability,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

pub const SERVER_NAME: &str = "mackerel-mcp";

const INSTRUCTIONS: &str = "Tools for the Mackerel monitoring API (hosts, services, metrics, \
monitors, alerts, downtimes, notification channels). Each tool returns one text block holding \
the provider's JSON response, or {\"error\": \"...\"} when the call failed.";

type InFlight = Arc<Mutex<HashMap<JsonRpcId, AbortHandle>>>;

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    in_flight: InFlight,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> Result<(), McpError> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve until `reader` reaches EOF and every in-flight call has answered
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::try_join!(self.read_loop(reader, tx), write_loop(rx, writer))?;
        Ok(())
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn read_loop<R>(
        &self,
        mut reader: R,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| McpError::io_error("reading request", e))?;
            if read == 0 {
                tracing::info!("MCP input closed");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(trimmed, &tx) {
                send_response(&tx, &response)?;
            }
        }
        Ok(())
    }

    fn handle_line(
        &self,
        line: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Received malformed JSON-RPC message");
                return Some(JsonRpcResponse::failure(None, JsonRpcError::parse_error(e)));
            }
        };

        if raw.is_array() {
            return Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::invalid_request("Batch requests are not supported"),
            ));
        }

        let message: JsonRpcMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::invalid_request(format!("Invalid request: {e}")),
                ));
            }
        };

        // Responses from the client carry no method; this server never asks for any
        let method = message.method?;

        // Missing and `null` ids both mean notification: MCP request ids are never null
        let Some(id) = message.id else {
            self.handle_notification(&method, message.params);
            return None;
        };

        if message.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        tracing::debug!(method = %method, "Received MCP request");
        match method.as_str() {
            "initialize" => Some(result_response(id, &self.initialize_result())),
            "ping" => Some(JsonRpcResponse::success(
                Some(id),
                Value::Object(Default::default()),
            )),
            "tools/list" => Some(result_response(
                id,
                &ListToolsResult {
                    tools: self.registry.definitions(),
                },
            )),
            "tools/call" => self.start_tool_call(id, message.params, tx),
            other => Some(JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::method_not_found(other),
            )),
        }
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) {
        match method {
            "notifications/cancelled" => {
                let request_id = params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .cloned()
                    .and_then(|id| serde_json::from_value::<JsonRpcId>(id).ok());
                let Some(request_id) = request_id else {
                    return;
                };
                if let Some(handle) = self.in_flight.lock().remove(&request_id) {
                    handle.abort();
                    tracing::info!(request_id = ?request_id, "Cancelled in-flight tool call");
                }
            }
            "notifications/initialized" => tracing::debug!("MCP client initialized"),
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }

    fn start_tool_call(
        &self,
        id: JsonRpcId,
        params: Option<Value>,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Option<JsonRpcResponse> {
        let params: CallToolParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return Some(JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::invalid_params("tools/call requires params"),
                ));
            }
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::invalid_params(format!("Invalid tools/call params: {e}")),
                ));
            }
        };

        if !self.registry.contains(&params.name) {
            return Some(JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            ));
        }

        let registry = Arc::clone(&self.registry);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = tx.clone();
        let task_id = id.clone();

        // Hold the lock across spawn so the task cannot deregister before it is registered
        let mut pending = self.in_flight.lock();
        let handle = tokio::spawn(async move {
            let name = params.name;
            let args = params.arguments.unwrap_or(Value::Null);

            let result = match AssertUnwindSafe(registry.call(&name, args))
                .catch_unwind()
                .await
            {
                Ok(Some(result)) => result,
                Ok(None) => ToolResult::error(format!("Unknown tool: {name}")),
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(tool = %name, reason = %reason, "Tool call panicked");
                    ToolResult::error(format!("Tool '{name}' failed unexpectedly: {reason}"))
                }
            };

            in_flight.lock().remove(&task_id);
            let response = result_response(task_id, &result);
            if let Err(e) = send_response(&tx, &response) {
                tracing::warn!(error = %e, "Failed to queue tool response");
            }
        });
        pending.insert(id, handle.abort_handle());

        None
    }
}

async fn write_loop<W>(mut rx: mpsc::UnboundedReceiver<String>, mut writer: W) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::io_error("writing response", e))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::io_error("writing response", e))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::io_error("flushing response", e))?;
    }
    Ok(())
}

/// Queue a response for the writer. A closed channel means the writer already
/// failed and reported it, so that case is dropped silently.
fn send_response(
    tx: &mpsc::UnboundedSender<String>,
    response: &JsonRpcResponse,
) -> Result<(), McpError> {
    let line = serde_json::to_string(response)
        .map_err(|e| McpError::json_error("Failed to serialize response", e))?;
    let _ = tx.send(line);
    Ok(())
}

fn result_response<T: Serialize>(id: JsonRpcId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(Some(id), value),
        Err(e) => JsonRpcResponse::failure(
            Some(id),
            JsonRpcError::internal(format!("Failed to serialize result: {e}")),
        ),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
