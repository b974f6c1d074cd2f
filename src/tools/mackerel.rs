// Mackerel operations exposed as MCP tools
//
// Each tool parses its arguments into a typed struct, then forwards to the
// matching `MackerelClient` method.

use crate::mackerel::types::compact_hosts;
use crate::mackerel::{MackerelClient, MackerelError, Result, TimeRange};
use crate::tools::traits::Tool;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListHosts,
    GetHost,
    UpdateHostStatus,
    RetireHost,
    ListServices,
    GetService,
    GetServiceRoles,
    PostMetrics,
    GetHostMetrics,
    GetServiceMetrics,
    GetMonitors,
    GetMonitor,
    CreateMonitor,
    UpdateMonitor,
    DeleteMonitor,
    GetAlerts,
    CloseAlert,
    GetDowntimes,
    CreateDowntime,
    UpdateDowntime,
    DeleteDowntime,
    GetChannels,
    CreateChannel,
    DeleteChannel,
}

impl ToolKind {
    pub const ALL: [ToolKind; 24] = [
        ToolKind::ListHosts,
        ToolKind::GetHost,
        ToolKind::UpdateHostStatus,
        ToolKind::RetireHost,
        ToolKind::ListServices,
        ToolKind::GetService,
        ToolKind::GetServiceRoles,
        ToolKind::PostMetrics,
        ToolKind::GetHostMetrics,
        ToolKind::GetServiceMetrics,
        ToolKind::GetMonitors,
        ToolKind::GetMonitor,
        ToolKind::CreateMonitor,
        ToolKind::UpdateMonitor,
        ToolKind::DeleteMonitor,
        ToolKind::GetAlerts,
        ToolKind::CloseAlert,
        ToolKind::GetDowntimes,
        ToolKind::CreateDowntime,
        ToolKind::UpdateDowntime,
        ToolKind::DeleteDowntime,
        ToolKind::GetChannels,
        ToolKind::CreateChannel,
        ToolKind::DeleteChannel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ListHosts => "list_hosts",
            Self::GetHost => "get_host",
            Self::UpdateHostStatus => "update_host_status",
            Self::RetireHost => "retire_host",
            Self::ListServices => "list_services",
            Self::GetService => "get_service",
            Self::GetServiceRoles => "get_service_roles",
            Self::PostMetrics => "post_metrics",
            Self::GetHostMetrics => "get_host_metrics",
            Self::GetServiceMetrics => "get_service_metrics",
            Self::GetMonitors => "get_monitors",
            Self::GetMonitor => "get_monitor",
            Self::CreateMonitor => "create_monitor",
            Self::UpdateMonitor => "update_monitor",
            Self::DeleteMonitor => "delete_monitor",
            Self::GetAlerts => "get_alerts",
            Self::CloseAlert => "close_alert",
            Self::GetDowntimes => "get_downtimes",
            Self::CreateDowntime => "create_downtime",
            Self::UpdateDowntime => "update_downtime",
            Self::DeleteDowntime => "delete_downtime",
            Self::GetChannels => "get_channels",
            Self::CreateChannel => "create_channel",
            Self::DeleteChannel => "delete_channel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ListHosts => "List hosts registered in Mackerel, optionally filtered by service and role. Set compact=true for a short summary per host.",
            Self::GetHost => "Get details of a Mackerel host, including status, roles and metadata.",
            Self::UpdateHostStatus => "Update a host's status. status must be one of: working, standby, maintenance, poweroff.",
            Self::RetireHost => "Retire (remove) a host from Mackerel.",
            Self::ListServices => "List services registered in Mackerel.",
            Self::GetService => "Get details of a Mackerel service.",
            Self::GetServiceRoles => "List the roles defined for a service.",
            Self::PostMetrics => "Post a batch of metric points. Each point has name, value, time (Unix seconds) and optionally host_id or service_name.",
            Self::GetHostMetrics => "Get values of one metric for a host, optionally within from_time/to_time (Unix seconds).",
            Self::GetServiceMetrics => "Get values of one service metric, optionally within from_time/to_time (Unix seconds).",
            Self::GetMonitors => "List all monitors.",
            Self::GetMonitor => "Get a single monitor by ID.",
            Self::CreateMonitor => "Create a monitor. monitor_config is sent as-is (type, name, memo, duration, metric, operator, warning, critical, ...).",
            Self::UpdateMonitor => "Replace the configuration of an existing monitor.",
            Self::DeleteMonitor => "Delete a monitor.",
            Self::GetAlerts => "List alerts, optionally within from_time/to_time (Unix seconds).",
            Self::CloseAlert => "Close an open alert with a reason.",
            Self::GetDowntimes => "List scheduled downtimes.",
            Self::CreateDowntime => "Create a downtime. downtime_config is sent as-is (name, start, duration in minutes, recurrence, service scopes, monitor scopes, ...).",
            Self::UpdateDowntime => "Replace the configuration of an existing downtime.",
            Self::DeleteDowntime => "Delete a downtime.",
            Self::GetChannels => "List notification channels.",
            Self::CreateChannel => "Create a notification channel. channel_config is sent as-is (type, name, emails, url, mentions, ...).",
            Self::DeleteChannel => "Delete a notification channel.",
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            Self::ListHosts => object_schema(
                json!({
                    "service": string_prop("Only hosts belonging to this service"),
                    "role": string_prop("Only hosts with this role (requires service)"),
                    "compact": {"type": "boolean", "description": "Return id, name, status, roles, memo and a reduced meta only"}
                }),
                &[],
            ),
            Self::GetHost | Self::RetireHost => object_schema(
                json!({ "host_id": string_prop("Host ID") }),
                &["host_id"],
            ),
            Self::UpdateHostStatus => object_schema(
                json!({
                    "host_id": string_prop("Host ID"),
                    "status": {
                        "type": "string",
                        "enum": ["working", "standby", "maintenance", "poweroff"],
                        "description": "New host status"
                    }
                }),
                &["host_id", "status"],
            ),
            Self::ListServices
            | Self::GetMonitors
            | Self::GetDowntimes
            | Self::GetChannels => object_schema(json!({}), &[]),
            Self::GetService | Self::GetServiceRoles => object_schema(
                json!({ "service_name": string_prop("Service name") }),
                &["service_name"],
            ),
            Self::PostMetrics => object_schema(
                json!({
                    "metrics": {
                        "type": "array",
                        "description": "Metric points to post",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "value": {"type": "number"},
                                "time": {"type": "integer"},
                                "host_id": {"type": "string"},
                                "service_name": {"type": "string"}
                            },
                            "required": ["name", "value", "time"]
                        }
                    }
                }),
                &["metrics"],
            ),
            Self::GetHostMetrics => object_schema(
                json!({
                    "host_id": string_prop("Host ID"),
                    "name": string_prop("Metric name, e.g. loadavg5"),
                    "from_time": time_prop("Start of the window"),
                    "to_time": time_prop("End of the window")
                }),
                &["host_id", "name"],
            ),
            Self::GetServiceMetrics => object_schema(
                json!({
                    "service_name": string_prop("Service name"),
                    "name": string_prop("Service metric name"),
                    "from_time": time_prop("Start of the window"),
                    "to_time": time_prop("End of the window")
                }),
                &["service_name", "name"],
            ),
            Self::GetMonitor | Self::DeleteMonitor => object_schema(
                json!({ "monitor_id": string_prop("Monitor ID") }),
                &["monitor_id"],
            ),
            Self::CreateMonitor => object_schema(
                json!({ "monitor_config": config_prop("Monitor definition") }),
                &["monitor_config"],
            ),
            Self::UpdateMonitor => object_schema(
                json!({
                    "monitor_id": string_prop("Monitor ID"),
                    "monitor_config": config_prop("New monitor definition")
                }),
                &["monitor_id", "monitor_config"],
            ),
            Self::GetAlerts => object_schema(
                json!({
                    "from_time": time_prop("Start of the window"),
                    "to_time": time_prop("End of the window")
                }),
                &[],
            ),
            Self::CloseAlert => object_schema(
                json!({
                    "alert_id": string_prop("Alert ID"),
                    "reason": string_prop("Why the alert is being closed")
                }),
                &["alert_id", "reason"],
            ),
            Self::CreateDowntime => object_schema(
                json!({ "downtime_config": config_prop("Downtime definition") }),
                &["downtime_config"],
            ),
            Self::UpdateDowntime => object_schema(
                json!({
                    "downtime_id": string_prop("Downtime ID"),
                    "downtime_config": config_prop("New downtime definition")
                }),
                &["downtime_id", "downtime_config"],
            ),
            Self::DeleteDowntime => object_schema(
                json!({ "downtime_id": string_prop("Downtime ID") }),
                &["downtime_id"],
            ),
            Self::CreateChannel => object_schema(
                json!({ "channel_config": config_prop("Channel definition") }),
                &["channel_config"],
            ),
            Self::DeleteChannel => object_schema(
                json!({ "channel_id": string_prop("Channel ID") }),
                &["channel_id"],
            ),
        }
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn time_prop(description: &str) -> Value {
    json!({ "type": "integer", "description": format!("{description} (Unix seconds)") })
}

fn config_prop(description: &str) -> Value {
    json!({ "type": "object", "description": description })
}

#[derive(Debug, Deserialize)]
struct ListHostsArgs {
    service: Option<String>,
    role: Option<String>,
    #[serde(default)]
    compact: bool,
}

#[derive(Debug, Deserialize)]
struct HostArgs {
    host_id: String,
}

#[derive(Debug, Deserialize)]
struct HostStatusArgs {
    host_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ServiceArgs {
    service_name: String,
}

#[derive(Debug, Deserialize)]
struct PostMetricsArgs {
    metrics: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct HostMetricsArgs {
    host_id: String,
    name: String,
    #[serde(default, alias = "from")]
    from_time: Option<i64>,
    #[serde(default, alias = "to")]
    to_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ServiceMetricsArgs {
    service_name: String,
    name: String,
    #[serde(default, alias = "from")]
    from_time: Option<i64>,
    #[serde(default, alias = "to")]
    to_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MonitorArgs {
    monitor_id: String,
}

#[derive(Debug, Deserialize)]
struct MonitorConfigArgs {
    monitor_config: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateMonitorArgs {
    monitor_id: String,
    monitor_config: Value,
}

#[derive(Debug, Default, Deserialize)]
struct AlertsArgs {
    #[serde(default, alias = "from")]
    from_time: Option<i64>,
    #[serde(default, alias = "to")]
    to_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CloseAlertArgs {
    alert_id: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct DowntimeArgs {
    downtime_id: String,
}

#[derive(Debug, Deserialize)]
struct DowntimeConfigArgs {
    downtime_config: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateDowntimeArgs {
    downtime_id: String,
    downtime_config: Value,
}

#[derive(Debug, Deserialize)]
struct ChannelArgs {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelConfigArgs {
    channel_config: Value,
}

/// Parse tool arguments; a missing arguments object is treated as `{}`
fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| MackerelError::validation("arguments", format!("{tool}: {e}")))
}

/// Config payloads must be JSON objects
fn require_object(field: &str, value: Value) -> Result<Value> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(MackerelError::validation(field, "must be a JSON object"))
    }
}

/// One Mackerel operation exposed as a tool
#[derive(Debug, Clone, Copy)]
pub struct MackerelTool {
    kind: ToolKind,
}

impl MackerelTool {
    pub fn new(kind: ToolKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }
}

#[async_trait]
impl Tool for MackerelTool {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn parameters_schema(&self) -> Value {
        self.kind.input_schema()
    }

    async fn execute(&self, client: &MackerelClient, args: Value) -> Result<Value> {
        let tool = self.kind.name();
        match self.kind {
            ToolKind::ListHosts => {
                let a: ListHostsArgs = parse_args(tool, args)?;
                let hosts = client
                    .get_hosts(a.service.as_deref(), a.role.as_deref())
                    .await?;
                Ok(if a.compact { compact_hosts(hosts) } else { hosts })
            }
            ToolKind::GetHost => {
                let a: HostArgs = parse_args(tool, args)?;
                client.get_host(&a.host_id).await
            }
            ToolKind::UpdateHostStatus => {
                let a: HostStatusArgs = parse_args(tool, args)?;
                client.update_host_status(&a.host_id, &a.status).await
            }
            ToolKind::RetireHost => {
                let a: HostArgs = parse_args(tool, args)?;
                client.retire_host(&a.host_id).await
            }
            ToolKind::ListServices => client.get_services().await,
            ToolKind::GetService => {
                let a: ServiceArgs = parse_args(tool, args)?;
                client.get_service(&a.service_name).await
            }
            ToolKind::GetServiceRoles => {
                let a: ServiceArgs = parse_args(tool, args)?;
                client.get_service_roles(&a.service_name).await
            }
            ToolKind::PostMetrics => {
                let a: PostMetricsArgs = parse_args(tool, args)?;
                client.post_metrics(a.metrics).await
            }
            ToolKind::GetHostMetrics => {
                let a: HostMetricsArgs = parse_args(tool, args)?;
                let range = TimeRange::new(a.from_time, a.to_time);
                client.get_host_metrics(&a.host_id, &a.name, range).await
            }
            ToolKind::GetServiceMetrics => {
                let a: ServiceMetricsArgs = parse_args(tool, args)?;
                let range = TimeRange::new(a.from_time, a.to_time);
                client
                    .get_service_metrics(&a.service_name, &a.name, range)
                    .await
            }
            ToolKind::GetMonitors => client.get_monitors().await,
            ToolKind::GetMonitor => {
                let a: MonitorArgs = parse_args(tool, args)?;
                client.get_monitor(&a.monitor_id).await
            }
            ToolKind::CreateMonitor => {
                let a: MonitorConfigArgs = parse_args(tool, args)?;
                let config = require_object("monitor_config", a.monitor_config)?;
                client.create_monitor(config).await
            }
            ToolKind::UpdateMonitor => {
                let a: UpdateMonitorArgs = parse_args(tool, args)?;
                let config = require_object("monitor_config", a.monitor_config)?;
                client.update_monitor(&a.monitor_id, config).await
            }
            ToolKind::DeleteMonitor => {
                let a: MonitorArgs = parse_args(tool, args)?;
                client.delete_monitor(&a.monitor_id).await
            }
            ToolKind::GetAlerts => {
                let a: AlertsArgs = parse_args(tool, args)?;
                client
                    .get_alerts(TimeRange::new(a.from_time, a.to_time))
                    .await
            }
            ToolKind::CloseAlert => {
                let a: CloseAlertArgs = parse_args(tool, args)?;
                client.close_alert(&a.alert_id, &a.reason).await
            }
            ToolKind::GetDowntimes => client.get_downtimes().await,
            ToolKind::CreateDowntime => {
                let a: DowntimeConfigArgs = parse_args(tool, args)?;
                let config = require_object("downtime_config", a.downtime_config)?;
                client.create_downtime(config).await
            }
            ToolKind::UpdateDowntime => {
                let a: UpdateDowntimeArgs = parse_args(tool, args)?;
                let config = require_object("downtime_config", a.downtime_config)?;
                client.update_downtime(&a.downtime_id, config).await
            }
            ToolKind::DeleteDowntime => {
                let a: DowntimeArgs = parse_args(tool, args)?;
                client.delete_downtime(&a.downtime_id).await
            }
            ToolKind::GetChannels => client.get_channels().await,
            ToolKind::CreateChannel => {
                let a: ChannelConfigArgs = parse_args(tool, args)?;
                let config = require_object("channel_config", a.channel_config)?;
                client.create_channel(config).await
            }
            ToolKind::DeleteChannel => {
                let a: ChannelArgs = parse_args(tool, args)?;
                client.delete_channel(&a.channel_id).await
            }
        }
    }
}

/// Every Mackerel tool, in listing order
pub fn all_tools() -> Vec<Box<dyn Tool>> {
    ToolKind::ALL
        .into_iter()
        .map(|kind| Box::new(MackerelTool::new(kind)) as Box<dyn Tool>)
        .collect()
}
