// Mackerel API health check
//
// Backs the `check` command: one authenticated read against the API proves
// both credentials and connectivity.

use crate::mackerel::MackerelClient;
use serde_json::Value;
use std::fmt::Write as _;
use std::time::Instant;

/// Outcome of a single health probe
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    /// API answered and the key was accepted
    Healthy {
        latency_ms: u128,
        services_count: usize,
    },
    /// Request failed or the key was rejected
    Error { message: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub base_url: String,
    /// Length of the resolved key; `None` when no key was found
    pub key_length: Option<usize>,
    pub status: HealthStatus,
}

/// Probe the API by listing services
pub async fn check_api_health(client: &MackerelClient) -> HealthStatus {
    let started = Instant::now();
    match client.get_services().await {
        Ok(body) => {
            let services_count = body
                .get("services")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            HealthStatus::Healthy {
                latency_ms: started.elapsed().as_millis(),
                services_count,
            }
        }
        Err(e) => HealthStatus::Error {
            message: e.to_string(),
        },
    }
}

/// Format health report for display
pub fn format_health_report(report: &HealthReport) -> String {
    let mut output = String::new();

    output.push_str("Mackerel API Health Report\n");
    output.push_str("==========================\n\n");
    let _ = writeln!(output, "Endpoint: {}", report.base_url);
    match report.key_length {
        Some(len) => {
            let _ = writeln!(output, "API key: present ({len} chars)");
        }
        None => output.push_str("API key: missing\n"),
    }

    match &report.status {
        HealthStatus::Healthy {
            latency_ms,
            services_count,
        } => {
            let _ = writeln!(output, "Status: ✓ Healthy ({latency_ms}ms latency)");
            let _ = writeln!(output, "Services: {services_count} visible");
        }
        HealthStatus::Error { message } => {
            let _ = writeln!(output, "Status: ✗ Error: {message}");
        }
    }

    output
}
