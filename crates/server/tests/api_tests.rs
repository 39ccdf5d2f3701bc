use std::sync::Arc;

use axum_test::TestServer;
use vaultlog_core::{AuditContext, AuditMetrics, DurableStore};
use vaultlog_memory::{MemoryDurableStore, MemoryStoreConfig};
use vaultlog_server::state::AppState;

fn build_app() -> (axum::Router, Arc<dyn DurableStore>) {
    let metrics = Arc::new(AuditMetrics::new());
    let store: Arc<dyn DurableStore> = Arc::new(MemoryDurableStore::new(
        MemoryStoreConfig {
            anchor_interval: 2,
            ..MemoryStoreConfig::default()
        },
        metrics.clone(),
    ));
    let state = AppState {
        audit: Some(store.clone()),
        signer: None,
        metrics,
    };
    (vaultlog_server::api::router(state), store)
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _store) = build_app();
    let server = TestServer::new(app).unwrap();

    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn audit_list_without_tenant_header_is_unauthorized() {
    let (app, _store) = build_app();
    let server = TestServer::new(app).unwrap();

    let response = server.get("/audit").await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn audit_list_returns_events_for_tenant() {
    let (app, store) = build_app();
    let ctx = AuditContext::default();
    store
        .event(&ctx, "tenant-1", "NETWORK_CREATED", "alice", "net-1", serde_json::json!({"foo": "bar"}))
        .await;
    store
        .event(&ctx, "tenant-2", "NETWORK_CREATED", "bob", "net-2", serde_json::json!({}))
        .await;

    let server = TestServer::new(app).unwrap();
    let response = server.get("/audit").add_header("x-tenant-id", "tenant-1").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let data = body["data"].as_array().expect("data is an array");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["action"], "NETWORK_CREATED");
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn audit_integrity_reports_head_after_events() {
    let (app, store) = build_app();
    let ctx = AuditContext::default();
    store
        .event(&ctx, "tenant-1", "NETWORK_CREATED", "alice", "net-1", serde_json::json!({}))
        .await;
    store
        .event(&ctx, "tenant-1", "IP_ALLOCATED", "alice", "net-1", serde_json::json!({}))
        .await;

    let server = TestServer::new(app).unwrap();
    let response = server
        .get("/audit/integrity")
        .add_header("x-tenant-id", "tenant-1")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["latest_seq"], 2);
    assert_eq!(body["anchors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn audit_verify_passes_on_untampered_chain() {
    let (app, store) = build_app();
    store
        .event(&AuditContext::default(), "tenant-1", "NETWORK_CREATED", "alice", "net-1", serde_json::json!({}))
        .await;

    let server = TestServer::new(app).unwrap();
    let response = server.get("/audit/verify").add_header("x-tenant-id", "tenant-1").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["verified"], true);
}
