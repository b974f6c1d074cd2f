// Mackerel API client
//
// Every operation is a thin wrapper that fixes the HTTP method and path and
// shapes its arguments into the payload for `request`.

use crate::config::credentials::{resolve_api_key_from_env, ApiKey};
use crate::config::{MackerelConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::mackerel::error::{MackerelError, Result};
use crate::mackerel::transport::{ApiRequest, ReqwestTransport, Transport};
use crate::mackerel::types::{HostStatus, TimeRange};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the Mackerel REST API.
///
/// Holds no mutable state, so one instance can be shared across concurrent calls.
#[derive(Clone)]
pub struct MackerelClient {
    base_url: String,
    api_key: ApiKey,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for MackerelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MackerelClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl MackerelClient {
    /// Build a client against the public API. Without an explicit key,
    /// `MACKEREL_API_KEY` and then `MACKEREL_APIKEY` are consulted.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        let api_key = resolve_api_key_from_env(api_key)?;
        let transport = ReqwestTransport::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;
        Ok(Self::with_transport(
            api_key,
            DEFAULT_BASE_URL,
            Arc::new(transport),
        ))
    }

    pub fn with_config(api_key: ApiKey, config: &MackerelConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(
            api_key,
            &config.base_url,
            Arc::new(transport),
        ))
    }

    pub fn with_transport(
        api_key: ApiKey,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key,
            transport,
        }
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one authenticated request and decode the JSON response.
    ///
    /// For GET and DELETE the payload becomes query parameters; for POST and
    /// PUT it is sent as the JSON body.
    pub async fn request(&self, method: Method, path: &str, payload: Option<Value>) -> Result<Value> {
        let mut headers = vec![(
            API_KEY_HEADER.to_string(),
            self.api_key.expose().to_string(),
        )];

        let carries_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        let (query, body) = if carries_body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
            (Vec::new(), Some(payload.unwrap_or_else(|| json!({}))))
        } else {
            (payload.as_ref().map(query_pairs).unwrap_or_default(), None)
        };

        let request = ApiRequest {
            url: format!("{}{}", self.base_url, path),
            method,
            path: path.to_string(),
            headers,
            query,
            body,
        };

        tracing::debug!(method = %request.method, path, "Sending Mackerel API request");
        let response = self.transport.send(request).await?;

        if !(200..300).contains(&response.status) {
            return Err(MackerelError::provider_status(
                path,
                response.status,
                response.body,
            ));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            MackerelError::provider_decode(path, response.status, response.body.as_str(), &e)
        })
    }

    // Hosts

    pub async fn get_hosts(&self, service: Option<&str>, role: Option<&str>) -> Result<Value> {
        let mut params = Map::new();
        if let Some(service) = service.filter(|s| !s.is_empty()) {
            params.insert("service".to_string(), Value::from(service));
        }
        if let Some(role) = role.filter(|r| !r.is_empty()) {
            params.insert("role".to_string(), Value::from(role));
        }
        self.request(Method::GET, "/hosts", Some(Value::Object(params)))
            .await
    }

    pub async fn get_host(&self, host_id: &str) -> Result<Value> {
        let path = format!("/hosts/{}", segment("host_id", host_id)?);
        self.request(Method::GET, &path, None).await
    }

    /// Rejects anything but the four known statuses before touching the network.
    pub async fn update_host_status(&self, host_id: &str, status: &str) -> Result<Value> {
        let status: HostStatus = status.parse()?;
        let path = format!("/hosts/{}/status", segment("host_id", host_id)?);
        self.request(Method::POST, &path, Some(json!({ "status": status })))
            .await
    }

    pub async fn retire_host(&self, host_id: &str) -> Result<Value> {
        let path = format!("/hosts/{}/retire", segment("host_id", host_id)?);
        self.request(Method::POST, &path, None).await
    }

    // Services

    pub async fn get_services(&self) -> Result<Value> {
        self.request(Method::GET, "/services", None).await
    }

    pub async fn get_service(&self, service_name: &str) -> Result<Value> {
        let path = format!("/services/{}", segment("service_name", service_name)?);
        self.request(Method::GET, &path, None).await
    }

    pub async fn get_service_roles(&self, service_name: &str) -> Result<Value> {
        let path = format!("/services/{}/roles", segment("service_name", service_name)?);
        self.request(Method::GET, &path, None).await
    }

    // Metrics

    /// Post a batch of metric points. The list is forwarded verbatim.
    pub async fn post_metrics(&self, metrics: Vec<Value>) -> Result<Value> {
        self.request(Method::POST, "/metrics", Some(json!({ "metrics": metrics })))
            .await
    }

    pub async fn get_host_metrics(
        &self,
        host_id: &str,
        name: &str,
        range: TimeRange,
    ) -> Result<Value> {
        let path = format!("/hosts/{}/metrics", segment("host_id", host_id)?);
        self.request(Method::GET, &path, Some(metric_query(name, range)?))
            .await
    }

    pub async fn get_service_metrics(
        &self,
        service_name: &str,
        name: &str,
        range: TimeRange,
    ) -> Result<Value> {
        let path = format!("/services/{}/metrics", segment("service_name", service_name)?);
        self.request(Method::GET, &path, Some(metric_query(name, range)?))
            .await
    }

    // Monitors

    pub async fn get_monitors(&self) -> Result<Value> {
        self.request(Method::GET, "/monitors", None).await
    }

    pub async fn get_monitor(&self, monitor_id: &str) -> Result<Value> {
        let path = format!("/monitors/{}", segment("monitor_id", monitor_id)?);
        self.request(Method::GET, &path, None).await
    }

    pub async fn create_monitor(&self, monitor_config: Value) -> Result<Value> {
        self.request(Method::POST, "/monitors", Some(monitor_config))
            .await
    }

    pub async fn update_monitor(&self, monitor_id: &str, monitor_config: Value) -> Result<Value> {
        let path = format!("/monitors/{}", segment("monitor_id", monitor_id)?);
        self.request(Method::PUT, &path, Some(monitor_config)).await
    }

    pub async fn delete_monitor(&self, monitor_id: &str) -> Result<Value> {
        let path = format!("/monitors/{}", segment("monitor_id", monitor_id)?);
        self.request(Method::DELETE, &path, None).await
    }

    // Alerts

    pub async fn get_alerts(&self, range: TimeRange) -> Result<Value> {
        let mut params = Map::new();
        range.apply(&mut params);
        self.request(Method::GET, "/alerts", Some(Value::Object(params)))
            .await
    }

    pub async fn close_alert(&self, alert_id: &str, reason: &str) -> Result<Value> {
        let path = format!("/alerts/{}/close", segment("alert_id", alert_id)?);
        self.request(Method::POST, &path, Some(json!({ "reason": reason })))
            .await
    }

    // Downtimes

    pub async fn get_downtimes(&self) -> Result<Value> {
        self.request(Method::GET, "/downtimes", None).await
    }

    pub async fn create_downtime(&self, downtime_config: Value) -> Result<Value> {
        self.request(Method::POST, "/downtimes", Some(downtime_config))
            .await
    }

    pub async fn update_downtime(&self, downtime_id: &str, downtime_config: Value) -> Result<Value> {
        let path = format!("/downtimes/{}", segment("downtime_id", downtime_id)?);
        self.request(Method::PUT, &path, Some(downtime_config)).await
    }

    pub async fn delete_downtime(&self, downtime_id: &str) -> Result<Value> {
        let path = format!("/downtimes/{}", segment("downtime_id", downtime_id)?);
        self.request(Method::DELETE, &path, None).await
    }

    // Notification channels

    pub async fn get_channels(&self) -> Result<Value> {
        self.request(Method::GET, "/channels", None).await
    }

    pub async fn create_channel(&self, channel_config: Value) -> Result<Value> {
        self.request(Method::POST, "/channels", Some(channel_config))
            .await
    }

    pub async fn delete_channel(&self, channel_id: &str) -> Result<Value> {
        let path = format!("/channels/{}", segment("channel_id", channel_id)?);
        self.request(Method::DELETE, &path, None).await
    }
}

/// Percent-encode an identifier for use as a single path segment
fn segment<'a>(field: &str, value: &'a str) -> Result<Cow<'a, str>> {
    if value.trim().is_empty() {
        return Err(MackerelError::validation(field, "must not be empty"));
    }
    Ok(urlencoding::encode(value))
}

fn metric_query(name: &str, range: TimeRange) -> Result<Value> {
    if name.trim().is_empty() {
        return Err(MackerelError::validation("name", "metric name must not be empty"));
    }
    let mut params = Map::new();
    params.insert("name".to_string(), Value::from(name));
    range.apply(&mut params);
    Ok(Value::Object(params))
}

/// Flatten a JSON object into query pairs. Nulls are dropped and arrays
/// become repeated keys.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Some(map) = payload.as_object() else {
        return Vec::new();
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(rendered) = render_query_value(item) {
                        pairs.push((key.clone(), rendered));
                    }
                }
            }
            other => {
                if let Some(rendered) = render_query_value(other) {
                    pairs.push((key.clone(), rendered));
                }
            }
        }
    }
    pairs
}

fn render_query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
