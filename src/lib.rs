//! Mackerel monitoring API exposed as Model Context Protocol tools.
//!
//! [`mackerel::MackerelClient`] wraps the REST API, [`tools::ToolRegistry`] adapts
//! each operation into an MCP tool with a one-text-block result, and
//! [`mcp::McpServer`] serves the registry over newline-delimited JSON-RPC on stdio.

pub mod config;
pub mod logging;
pub mod mackerel;
pub mod mcp;
pub mod tools;
