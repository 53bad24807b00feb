use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use eyre::Result;
use gateway::{API_SECRET_HEADER, AppState, router};
use incident::{IncidentEngine, Mailer, Notifier};
use models::{HttpMethod, Monitor, MonitorStatus};
use reqwest::StatusCode;
use serde_json::json;
use storage::{MemStore, Store};
use tokio::net::TcpListener;

struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, _to: &str, _subject: &str, _html: &str, _text: &str) -> Result<()> {
        Ok(())
    }
}

fn monitor(id: &str) -> Monitor {
    Monitor {
        id: id.to_owned(),
        name: format!("monitor {id}"),
        url: "https://example.com/health".to_owned(),
        method: HttpMethod::Get,
        expected_status_codes: vec![200],
        timeout: 30,
        interval: 5,
        retries: 0,
        headers: None,
        body: None,
        slug: None,
        is_active: true,
        is_deleted: false,
        current_status: MonitorStatus::Pending,
        last_checked_at: None,
        last_incident_at: None,
    }
}

async fn spawn_gateway(store: Arc<MemStore>) -> SocketAddr {
    let engine = Arc::new(IncidentEngine::new(store.clone()));
    let notifier = Arc::new(Notifier::new(store.clone(), Arc::new(NullMailer)));
    let state = AppState { store, engine, notifier, secret: "s3cret".to_owned() };
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    // Accept loop is up once bind returns; give the task a beat to start.
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

fn result_json(monitor_id: &str, status: &str, code: u16) -> serde_json::Value {
    json!({
        "monitorId": monitor_id,
        "region": "us-east-1",
        "status": status,
        "responseTime": 120,
        "statusCode": code,
        "errorMessage": if status == "DOWN" {
            json!(format!("Unexpected status code: {code}"))
        } else {
            json!(null)
        },
        "checkedAt": Utc::now(),
    })
}

#[tokio::test]
async fn wrong_secret_rejects_the_whole_batch() {
    let store = Arc::new(MemStore::new());
    store.put_monitor(monitor("m1"));
    let addr = spawn_gateway(store.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/monitor-results"))
        .header(API_SECRET_HEADER, "wrong")
        .json(&json!({
            "results": [result_json("m1", "UP", 200)],
            "requestId": "req-1",
            "region": "us-east-1",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(store.result_count(), 0);
}

#[tokio::test]
async fn malformed_envelope_is_a_bad_request() {
    let store = Arc::new(MemStore::new());
    let addr = spawn_gateway(store).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/monitor-results"))
        .header(API_SECRET_HEADER, "s3cret")
        .header("content-type", "application/json")
        .body(r#"{"nope": true}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("Invalid payload"));
}

#[tokio::test]
async fn mixed_batch_processes_what_it_can() {
    let store = Arc::new(MemStore::new());
    store.put_monitor(monitor("m1"));
    let addr = spawn_gateway(store.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/monitor-results"))
        .header(API_SECRET_HEADER, "s3cret")
        .json(&json!({
            "results": [
                result_json("m1", "UP", 200),
                {"garbage": true},
                result_json("ghost", "UP", 200),
            ],
            "requestId": "req-2",
            "region": "us-east-1",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["processed"], json!(1));
    assert_eq!(body["skipped"], json!(2));

    assert_eq!(store.result_count(), 1);
    let m = store.monitor("m1").await.unwrap().unwrap();
    assert_eq!(m.current_status, MonitorStatus::Up);

    let logs = store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "checked");
    assert_eq!(logs[0].details["requestId"], json!("req-2"));
}

#[tokio::test]
async fn down_result_opens_an_incident_before_responding() {
    let store = Arc::new(MemStore::new());
    store.put_monitor(monitor("m1"));
    let addr = spawn_gateway(store.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/monitor-results"))
        .header(API_SECRET_HEADER, "s3cret")
        .json(&json!({
            "results": [result_json("m1", "DOWN", 503)],
            "requestId": "req-3",
            "region": "us-east-1",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let incidents = store.incidents_for("m1");
    assert_eq!(incidents.len(), 1);
    assert!(incidents[0].is_open());
    assert_eq!(incidents[0].error_message.as_deref(), Some("Unexpected status code: 503"));

    let m = store.monitor("m1").await.unwrap().unwrap();
    assert_eq!(m.current_status, MonitorStatus::Down);
    assert!(m.last_incident_at.is_some());
}
