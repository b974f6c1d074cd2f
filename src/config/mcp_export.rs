// MCP host configuration export
//
// Renders the snippet an MCP host needs to launch this server over stdio.
// The API key is always a placeholder; real credentials never leave the process.

use serde_json::{json, Value};

/// Name the server is registered under in host configs
pub const SERVER_NAME: &str = "mackerel";

const KEY_PLACEHOLDER: &str = "<your-mackerel-api-key>";
const VSCODE_INPUT_ID: &str = "mackerel-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// `.vscode/mcp.json` with a prompted key input
    #[value(name = "vscode")]
    VSCode,
    /// Claude Desktop / Claude Code `mcpServers` block
    Claude,
    /// Generic `mcpServers` block
    Standard,
}

/// Build the host config for `command` (path to this binary)
pub fn render_host_config(format: ConfigFormat, command: &str) -> Value {
    match format {
        ConfigFormat::VSCode => json!({
            "inputs": [{
                "type": "promptString",
                "id": VSCODE_INPUT_ID,
                "description": "Mackerel API key",
                "password": true
            }],
            "servers": {
                SERVER_NAME: {
                    "type": "stdio",
                    "command": command,
                    "args": ["serve"],
                    "env": {
                        "MACKEREL_API_KEY": format!("${{input:{VSCODE_INPUT_ID}}}")
                    }
                }
            }
        }),
        ConfigFormat::Claude | ConfigFormat::Standard => json!({
            "mcpServers": {
                SERVER_NAME: {
                    "command": command,
                    "args": ["serve"],
                    "env": {
                        "MACKEREL_API_KEY": KEY_PLACEHOLDER
                    }
                }
            }
        }),
    }
}

/// Path of the running binary, falling back to the package name
pub fn current_command() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
