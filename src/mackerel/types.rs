// Locally-constrained Mackerel values
//
// Entities themselves stay opaque JSON owned by the provider. Only the fields this
// crate validates or shapes before sending get a Rust type here.

use crate::mackerel::error::MackerelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Host status accepted by `POST /hosts/{id}/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Working,
    Standby,
    Maintenance,
    Poweroff,
}

impl HostStatus {
    pub const ALL: [HostStatus; 4] = [
        HostStatus::Working,
        HostStatus::Standby,
        HostStatus::Maintenance,
        HostStatus::Poweroff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Standby => "standby",
            Self::Maintenance => "maintenance",
            Self::Poweroff => "poweroff",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostStatus {
    type Err = MackerelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                MackerelError::validation(
                    "status",
                    format!(
                        "must be one of working, standby, maintenance, poweroff (got '{s}')"
                    ),
                )
            })
    }
}

/// Optional `from`/`to` window in Unix seconds. Ordering is left to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeRange {
    pub fn new(from: Option<i64>, to: Option<i64>) -> Self {
        Self { from, to }
    }

    /// Write the bounds that are set into a query payload
    pub fn apply(&self, params: &mut Map<String, Value>) {
        if let Some(from) = self.from {
            params.insert("from".to_string(), Value::from(from));
        }
        if let Some(to) = self.to {
            params.insert("to".to_string(), Value::from(to));
        }
    }
}

const COMPACT_META_KEYS: [&str; 2] = ["agent-version", "kernel"];

/// Reduce a `{"hosts": [...]}` listing to the fields an agent usually needs.
///
/// Responses without a `hosts` array are returned unchanged.
pub fn compact_hosts(response: Value) -> Value {
    let Some(hosts) = response.get("hosts").and_then(Value::as_array) else {
        return response;
    };

    let compacted: Vec<Value> = hosts
        .iter()
        .map(|host| {
            let mut summary = Map::new();
            for key in ["id", "name", "status", "roles", "memo"] {
                if let Some(value) = host.get(key) {
                    summary.insert(key.to_string(), value.clone());
                }
            }
            let meta: Map<String, Value> = host
                .get("meta")
                .and_then(Value::as_object)
                .map(|meta| {
                    meta.iter()
                        .filter(|(k, _)| COMPACT_META_KEYS.contains(&k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();
            summary.insert("meta".to_string(), Value::Object(meta));
            Value::Object(summary)
        })
        .collect();

    serde_json::json!({ "hosts": compacted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_host_statuses_parse() {
        for raw in ["working", "standby", "maintenance", "poweroff"] {
            let status: HostStatus = raw.parse().unwrap();
            assert_eq!(status.as_str(), raw);
        }
    }

    #[test]
    fn test_unknown_host_status_is_validation_error() {
        for raw in ["", "Working", "retired", "power-off", " working"] {
            let err = raw.parse::<HostStatus>().unwrap_err();
            assert!(
                matches!(err, MackerelError::Validation { ref field, .. } if field == "status"),
                "unexpected error for {raw:?}: {err:?}"
            );
        }
    }

    #[test]
    fn test_host_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(HostStatus::Maintenance).unwrap(),
            json!("maintenance")
        );
    }

    #[test]
    fn test_time_range_only_writes_set_bounds() {
        let mut params = Map::new();
        TimeRange::new(Some(1_600_000_000), None).apply(&mut params);
        assert_eq!(Value::Object(params), json!({"from": 1_600_000_000}));

        let mut params = Map::new();
        TimeRange::default().apply(&mut params);
        assert!(params.is_empty());
    }

    #[test]
    fn test_compact_hosts_keeps_summary_fields() {
        let response = json!({
            "hosts": [{
                "id": "host123",
                "name": "test-host",
                "status": "working",
                "roles": {"web": ["app"]},
                "memo": "primary",
                "createdAt": 1600000000,
                "meta": {
                    "agent-version": "0.72.0",
                    "kernel": {"name": "Linux"},
                    "cpu": [{"model": "x"}]
                }
            }]
        });

        let compacted = compact_hosts(response);
        assert_eq!(
            compacted,
            json!({
                "hosts": [{
                    "id": "host123",
                    "name": "test-host",
                    "status": "working",
                    "roles": {"web": ["app"]},
                    "memo": "primary",
                    "meta": {
                        "agent-version": "0.72.0",
                        "kernel": {"name": "Linux"}
                    }
                }]
            })
        );
    }

    #[test]
    fn test_compact_hosts_passes_through_other_shapes() {
        let response = json!({"error": "nope"});
        assert_eq!(compact_hosts(response.clone()), response);
    }
}
