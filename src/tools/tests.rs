// Tool adapter tests against a simulated Mackerel API

use crate::config::{resolve_api_key, ApiKey, MackerelConfig};
use crate::mackerel::MackerelClient;
use crate::mcp::protocol::ToolResult;
use crate::tools::{ClientSource, ToolRegistry};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_for(server: &MockServer) -> ToolRegistry {
    let config = MackerelConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    let key = ApiKey::new("test-api-key").unwrap();
    ToolRegistry::new(ClientSource::from_result(MackerelClient::with_config(
        key, &config,
    )))
}

fn envelope(result: &ToolResult) -> Value {
    assert_eq!(result.content.len(), 1, "envelope must hold one block");
    serde_json::from_str(result.first_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_list_hosts_returns_raw_provider_json() {
    let server = MockServer::start().await;
    let body = json!({"hosts": [{"id": "host123", "name": "test-host", "status": "working"}]});
    Mock::given(method("GET"))
        .and(path("/hosts"))
        .and(header("X-Api-Key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry.call("list_hosts", json!({})).await.unwrap();

    assert_eq!(envelope(&result), body);
    assert!(!result.is_error());
}

#[tokio::test]
async fn test_missing_host_becomes_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hosts/missing-id"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": {"message": "Host Not Found."}})),
        )
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call("get_host", json!({"host_id": "missing-id"}))
        .await
        .unwrap();

    let value = envelope(&result);
    let message = value["error"].as_str().unwrap();
    assert!(message.contains("404"));
    assert!(message.contains("Host Not Found."));
}

#[tokio::test]
async fn test_missing_credentials_become_error_envelope() {
    let client = resolve_api_key(None, |_: &str| None)
        .and_then(|key| MackerelClient::with_config(key, &MackerelConfig::default()));
    let registry = ToolRegistry::new(ClientSource::from_result(client));

    let result = registry.call("list_services", json!({})).await.unwrap();

    let value = envelope(&result);
    assert!(value["error"]
        .as_str()
        .unwrap()
        .contains("MACKEREL_API_KEY"));
}

#[tokio::test]
async fn test_invalid_status_never_reaches_provider() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call(
            "update_host_status",
            json!({"host_id": "host123", "status": "decommissioned"}),
        )
        .await
        .unwrap();

    assert!(envelope(&result)["error"]
        .as_str()
        .unwrap()
        .contains("status"));
}

#[tokio::test]
async fn test_valid_status_update_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hosts/host123/status"))
        .and(body_json(json!({"status": "maintenance"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call(
            "update_host_status",
            json!({"host_id": "host123", "status": "maintenance"}),
        )
        .await
        .unwrap();

    assert_eq!(envelope(&result), json!({"success": true}));
}

#[tokio::test]
async fn test_post_metrics_round_trip() {
    let server = MockServer::start().await;
    let batch = json!([{"name": "cpu.user", "value": 50, "time": 1600000000, "host_id": "host123"}]);
    Mock::given(method("POST"))
        .and(path("/metrics"))
        .and(body_json(json!({ "metrics": batch })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call("post_metrics", json!({ "metrics": batch }))
        .await
        .unwrap();

    assert_eq!(envelope(&result), json!({"success": true}));
}

#[tokio::test]
async fn test_alert_window_forwarded_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alerts"))
        .and(query_param("from", "1600000000"))
        .and(query_param("to", "1600003600"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alerts": []})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call(
            "get_alerts",
            json!({"from_time": 1600000000, "to_time": 1600003600}),
        )
        .await
        .unwrap();

    assert_eq!(envelope(&result), json!({"alerts": []}));
}

#[tokio::test]
async fn test_compact_host_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hosts"))
        .and(query_param("service", "web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{
                "id": "host123",
                "name": "test-host",
                "status": "working",
                "roles": {"web": ["app"]},
                "memo": "",
                "meta": {"agent-version": "0.72.0", "block_device": {}}
            }]
        })))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call("list_hosts", json!({"service": "web", "compact": true}))
        .await
        .unwrap();

    let value = envelope(&result);
    assert_eq!(value["hosts"][0]["meta"], json!({"agent-version": "0.72.0"}));
    assert_eq!(value["hosts"][0]["id"], "host123");
}

#[tokio::test]
async fn test_malformed_arguments_become_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry
        .call("close_alert", json!({"alert_id": "a1"}))
        .await
        .unwrap();

    assert!(envelope(&result)["error"]
        .as_str()
        .unwrap()
        .contains("reason"));
}

#[tokio::test]
async fn test_undecodable_body_becomes_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let result = registry.call("get_channels", json!({})).await.unwrap();

    assert!(result.is_error());
}

#[tokio::test]
async fn test_unknown_tool_is_not_dispatched() {
    let registry = ToolRegistry::new(ClientSource::Unavailable {
        reason: "unused".into(),
    });
    assert!(registry.call("drop_everything", json!({})).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_do_not_cross_talk() {
    let server = MockServer::start().await;
    for i in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/services/svc-{i}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"service": {"name": format!("svc-{i}"), "roles": [i]}}))
                    .set_delay(std::time::Duration::from_millis(10 * (10 - i))),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let registry = Arc::new(registry_for(&server));
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let result = registry
                    .call("get_service", json!({"service_name": format!("svc-{i}")}))
                    .await
                    .unwrap();
                (i, result)
            })
        })
        .collect();

    for (i, result) in futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
    {
        let value = envelope(&result);
        assert_eq!(value["service"]["name"], json!(format!("svc-{i}")));
        assert_eq!(value["service"]["roles"], json!([i]));
    }
}

#[tokio::test]
async fn test_refused_connection_names_cause_in_envelope() {
    let config = MackerelConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
        ..Default::default()
    };
    let client = MackerelClient::with_config(ApiKey::new("test-api-key").unwrap(), &config);
    let registry = ToolRegistry::new(ClientSource::from_result(client));

    let result = registry.call("get_channels", json!({})).await.unwrap();

    let message = envelope(&result)["error"].as_str().unwrap().to_string();
    assert!(message.contains("/channels"), "{message}");
    assert!(message.contains("connection failed"), "{message}");
    assert!(message.to_lowercase().contains("refused"), "{message}");
}

/// Shared buffer the JSON log formatter writes into
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn lines(&self) -> Vec<Value> {
        String::from_utf8(self.0.lock().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .filter(|line: &Value| {
                line["target"]
                    .as_str()
                    .is_some_and(|target| target.starts_with("mackerel_mcp"))
            })
            .collect()
    }
}

#[tokio::test]
async fn test_each_call_logs_entry_and_exit_without_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"services": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hosts/missing-id"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Host Not Found."))
        .mount(&server)
        .await;

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_writer(move || writer.clone())
        .finish();
    // current_thread runtime: every poll happens on this thread
    let _guard = tracing::subscriber::set_default(subscriber);

    let registry = registry_for(&server);
    registry.call("list_services", json!({})).await.unwrap();
    registry
        .call("get_host", json!({"host_id": "missing-id"}))
        .await
        .unwrap();

    let lines = logs.lines();
    let messages: Vec<&str> = lines
        .iter()
        .filter_map(|line| line["message"].as_str())
        .collect();
    assert_eq!(
        messages,
        vec![
            "Calling tool",
            "Tool call succeeded",
            "Calling tool",
            "Tool call failed"
        ]
    );

    assert_eq!(lines[1]["tool"], "list_services");
    assert!(lines[1]["elapsed_ms"].is_u64());

    let failure = &lines[3];
    assert_eq!(failure["tool"], "get_host");
    assert_eq!(failure["kind"], "provider");
    assert_eq!(failure["status"], 404);
    assert_eq!(failure["args"], "host_id=missing-id");
    assert_eq!(lines[2]["args"], "host_id=missing-id");

    let raw = String::from_utf8(logs.0.lock().clone()).unwrap();
    assert!(!raw.contains("test-api-key"));
}
