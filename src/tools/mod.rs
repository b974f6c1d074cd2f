// Tool adapter layer
//
// Presents each Mackerel client operation as an MCP tool with a uniform
// one-text-block envelope.

pub mod mackerel;
pub mod registry;
pub mod traits;

pub use mackerel::{all_tools, MackerelTool, ToolKind};
pub use registry::{summarize_arguments, ClientSource, ToolRegistry};
pub use traits::Tool;

#[cfg(test)]
mod tests;
