//! HTTP client tests against an in-process backend.

#![cfg(feature = "http-client")]

use std::sync::{Arc, Mutex};

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use growbox_core::history::{FilterCriteria, HistoryQuery, SortField, SortSpec};
use growbox_core::{
    ApiClient, ApiError, DashboardApi, DeviceCommand, Error, SettingWrite, Thresholds,
};
use growbox_types::{DeviceKind, NotificationSettings, Switch};

#[derive(Default)]
struct Recorded {
    writes: Vec<Value>,
    commands: Vec<Value>,
    history_query: Option<String>,
    notification: Option<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn latest() -> Json<Value> {
    Json(json!({
        "timestamp": "2025-05-01 12:00:00",
        "soil": 41.5,
        "temp": 24.0,
        "humidity": 55,
        "light": 320,
        "pressure": 1012.3
    }))
}

async fn stats() -> Json<Value> {
    Json(json!({ "error": "No data" }))
}

async fn history(State(state): State<Shared>, RawQuery(query): RawQuery) -> Json<Value> {
    state.lock().unwrap().history_query = query;
    Json(json!([
        {
            "id": 7,
            "device": "pump",
            "device_name": "Water Pump",
            "status": 1,
            "start_time": "2025-05-01T08:00:00",
            "end_time": null,
            "duration": null,
            "reason": "Smart control"
        },
        {
            "id": 6,
            "device": "fan",
            "status": 0,
            "start_time": "2025-05-01T07:00:00",
            "end_time": "2025-05-01T07:05:00",
            "duration": 300,
            "reason": "Manual toggle from UI"
        }
    ]))
}

async fn current_settings() -> Json<Value> {
    Json(json!({
        "V8": 1, "V20": 35, "V21": 15, "V22": 250, "V23": 65,
        "V24": 450, "V25": 3, "V26": 1, "V27": 0, "V28": 1
    }))
}

async fn write_setting(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().writes.push(body);
    Json(json!({ "status": "ok" }))
}

async fn device_status() -> Json<Value> {
    Json(json!({
        "devices": [
            { "device": "pump", "status": 1 },
            { "device": "lamp", "status": 0 },
            { "device": "fan", "status": 1 },
            { "device": "heater", "status": 1 }
        ],
        "sensors": { "soil": 41.5 }
    }))
}

async fn control_device(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let fan = body["device"] == "fan";
    state.lock().unwrap().commands.push(body);
    if fan {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "relay offline" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}

async fn get_notification(State(state): State<Shared>) -> Json<Value> {
    let stored = state.lock().unwrap().notification.clone();
    Json(stored.unwrap_or_else(|| {
        json!({
            "min_temp": 12, "max_temp": 30, "min_humid": 35, "max_humid": 65,
            "min_press": 990, "max_press": 1015,
            "cold_alert": 1, "heat_alert": 0, "dry_alert": 1,
            "humid_alert": 1, "low_press_alert": 0, "high_press_alert": 1
        })
    }))
}

async fn save_notification(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    if body["max_temp"].as_f64() == Some(99.0) {
        return Json(json!({ "status": "error" }));
    }
    state.lock().unwrap().notification = Some(body);
    Json(json!({ "status": "ok" }))
}

async fn alerts() -> Json<Value> {
    Json(json!([
        { "id": 3, "type": "heat", "message": "Temperature too high: 38°C", "timestamp": "2025-05-01 12:00:00" },
        { "message": "Soil dry" }
    ]))
}

async fn serve() -> (ApiClient, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/latest", get(latest))
        .route("/stats", get(stats))
        .route("/history", get(history))
        .route(
            "/current-settings",
            get(current_settings).post(write_setting),
        )
        .route("/device-status", get(device_status))
        .route("/control-device", axum::routing::post(control_device))
        .route(
            "/notification-settings",
            get(get_notification).post(save_notification),
        )
        .route("/alerts", get(alerts))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ApiClient::new(&format!("http://{addr}/")).unwrap();
    (client, state)
}

#[tokio::test]
async fn test_latest_snapshot() {
    let (client, _) = serve().await;
    let snapshot = client.latest().await.unwrap();
    assert_eq!(snapshot.temp, Some(24.0));
    assert_eq!(snapshot.humidity, Some(55.0));
    assert_eq!(snapshot.timestamp.as_deref(), Some("2025-05-01 12:00:00"));
}

#[tokio::test]
async fn test_error_body_is_no_data() {
    let (client, _) = serve().await;
    let err = client.stats().await.unwrap_err();
    assert!(matches!(err, Error::NoData(ref m) if m == "No data"));
}

#[tokio::test]
async fn test_history_sends_query_params() {
    let (client, state) = serve().await;
    let criteria = FilterCriteria {
        device: Some(DeviceKind::Pump),
        status: Some(Switch::On),
        reason: Some("Smart".to_string()),
        ..Default::default()
    };
    let sort = SortSpec::default().toggle(SortField::Duration);
    let query = HistoryQuery::build(&criteria, sort, 7);

    let records = client.history(&query).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].is_running());
    assert_eq!(records[1].duration, Some(300));

    let raw = state.lock().unwrap().history_query.clone().unwrap();
    assert_eq!(
        raw,
        "days=7&device=pump&status=1&reason=Smart&sort=duration&order=desc"
    );
}

#[tokio::test]
async fn test_current_settings_and_write() {
    let (client, state) = serve().await;
    let raw = client.current_settings().await.unwrap();
    assert_eq!(raw.get("V20"), Some(&35.0));
    let settings = growbox_types::ControlSettings::from_wire(&raw).unwrap();
    assert!(settings.smart_enabled);
    assert_eq!(settings.pump.high(), 65);

    client
        .write_setting(&SettingWrite::new("V22", 280))
        .await
        .unwrap();
    assert_eq!(
        state.lock().unwrap().writes,
        vec![json!({ "pin": "V22", "value": 280 })]
    );
}

#[tokio::test]
async fn test_device_status_ignores_extras() {
    let (client, _) = serve().await;
    let report = client.device_status().await.unwrap();
    assert_eq!(report.devices.len(), 4);
    let board = growbox_types::DeviceBoard::from_report(&report, 1);
    assert_eq!(board.status(DeviceKind::Pump), Switch::On);
    assert_eq!(board.status(DeviceKind::Lamp), Switch::Off);
}

#[tokio::test]
async fn test_control_device_error_status() {
    let (client, state) = serve().await;
    client
        .control_device(&DeviceCommand::manual(DeviceKind::Pump, Switch::On))
        .await
        .unwrap();

    let err = client
        .control_device(&DeviceCommand::manual(DeviceKind::Fan, Switch::Off))
        .await
        .unwrap_err();
    match err {
        Error::Api(ApiError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "relay offline");
        }
        other => panic!("unexpected error: {other}"),
    }

    let commands = state.lock().unwrap().commands.clone();
    assert_eq!(
        commands[0],
        json!({ "device": "pump", "status": 1, "reason": "Manual toggle from UI" })
    );
}

#[tokio::test]
async fn test_notification_settings_round_trip() {
    let (client, state) = serve().await;
    let thresholds = Thresholds::load(&client).await.unwrap();
    assert_eq!(thresholds.settings().min_temp, 12.0);
    assert!(!thresholds.settings().heat_alert);

    let updated = NotificationSettings {
        max_temp: 28.0,
        ..thresholds.settings().clone()
    };
    Thresholds::save(&client, updated).await.unwrap();
    let stored = state.lock().unwrap().notification.clone().unwrap();
    assert_eq!(stored["max_temp"], json!(28.0));
    assert_eq!(stored["heat_alert"], json!(0));
}

#[tokio::test]
async fn test_save_requires_ok_status() {
    let (client, _) = serve().await;
    let settings = NotificationSettings {
        max_temp: 99.0,
        ..Default::default()
    };
    assert!(client.save_notification_settings(&settings).await.is_err());
}

#[tokio::test]
async fn test_alerts() {
    let (client, _) = serve().await;
    let events = client.alerts().await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind.as_deref(), Some("heat"));
    assert_eq!(events[1].id, None);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&format!("http://{addr}")).unwrap();
    let err = client.latest().await.unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::NotReachable { .. })));
}
