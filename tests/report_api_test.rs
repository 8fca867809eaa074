use axum::http::StatusCode;
use chrono::NaiveDate;
use ledgerd::api::{self, AppState};
use ledgerd::config::Config;
use ledgerd::dates::FixedDates;
use ledgerd::store::{init_db, SqliteStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const SCHEMA: &str = "acct10001";

async fn setup_test_app() -> (axum::Router, Arc<SqliteStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let store = Arc::new(SqliteStore::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        default_schema: SCHEMA.to_string(),
    };

    // Pin "today" so the permitted reporting window is stable.
    let today = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
    let state = AppState::new(store.clone(), config, Arc::new(FixedDates::on(today)));

    (api::create_router(state), store, temp_dir)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _store, _temp) = setup_test_app().await;

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let (app, _store, _temp) = setup_test_app().await;

    let (status, body) = get(app, "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_report_costs_returns_normalized_query() {
    let (app, _store, _temp) = setup_test_app().await;

    let (status, body) = get(
        app,
        "/v1/reports/aws/costs?group_by[account]=a,b&order_by[cost]=asc&filter[resolution]=daily",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_by"]["account"], serde_json::json!(["a", "b"]));
    assert_eq!(body["order_by"]["cost"], "asc");
    assert_eq!(body["filter"]["resolution"], "daily");
}

#[tokio::test]
async fn test_report_costs_rejects_unknown_parameter() {
    let (app, _store, _temp) = setup_test_app().await;

    let (status, body) = get(app, "/v1/reports/aws/costs?invalid=param").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["invalid"],
        serde_json::json!(["Unsupported parameter or invalid value"])
    );
}

#[tokio::test]
async fn test_report_costs_unknown_scope_is_404() {
    let (app, _store, _temp) = setup_test_app().await;

    let (status, _body) = get(app, "/v1/reports/gcp-nope/costs").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_costs_uses_tenant_tag_keys() {
    let (app, store, _temp) = setup_test_app().await;
    store
        .set_tag_key_enabled(SCHEMA, "env", true)
        .await
        .unwrap();

    let (status, body) = get(
        app.clone(),
        "/v1/reports/ocp/costs?filter[tag%3Aenv]=prod%2Cstage",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["filter"]["tag:env"],
        serde_json::json!(["prod", "stage"])
    );

    // A key never enabled for the tenant is an unknown field.
    let (status, body) = get(app, "/v1/reports/ocp/costs?filter[tag%3Aother]=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]
        .as_object()
        .unwrap()
        .contains_key("filter.tag:other"));
}

#[tokio::test]
async fn test_report_costs_tenant_header_selects_schema() {
    let (app, store, _temp) = setup_test_app().await;
    store
        .set_tag_key_enabled("acct20002", "team", true)
        .await
        .unwrap();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/v1/reports/aws/costs?group_by[tag%3Ateam]=*")
        .header("x-tenant-schema", "acct20002")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same query against the default tenant fails: the key is not enabled there.
    let (status, _body) = get(app, "/v1/reports/aws/costs?group_by[tag%3Ateam]=*").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_costs_date_window_enforced() {
    let (app, _store, _temp) = setup_test_app().await;

    let (status, body) = get(
        app.clone(),
        "/v1/reports/aws/costs?start_date=2021-01-01&end_date=2021-01-05",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_date"], "2021-01-01");

    // Window pinned to [2020-12-01, 2021-01-15].
    let (status, body) = get(
        app,
        "/v1/reports/aws/costs?start_date=2020-11-30&end_date=2021-01-05",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["start_date"],
        serde_json::json!(["Parameter start_date must be from 2020-12-01 to 2021-01-15"])
    );
}

#[tokio::test]
async fn test_summarize_endpoint_skips_without_bill() {
    let (app, _store, _temp) = setup_test_app().await;

    let payload = serde_json::json!({
        "provider_uuid": uuid::Uuid::new_v4(),
        "provider_type": "gcp",
        "start_date": "2021-01-01",
        "end_date": "2021-01-10",
    });
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/summarize")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "skipped_no_bill");
    assert_eq!(json["schema"], SCHEMA);
    assert!(json.get("rows").is_none());
}
