//! HTTP client for the growbox backend REST API.
//!
//! [`ApiClient`] implements [`DashboardApi`] over JSON/HTTP.
//!
//! # Example
//!
//! ```no_run
//! use growbox_core::client::ApiClient;
//! use growbox_core::DashboardApi;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new("http://127.0.0.1:5050")?;
//!
//! let snapshot = client.latest().await?;
//! println!("Soil moisture: {:?}", snapshot.soil);
//!
//! let board = client.device_status().await?;
//! println!("{} devices reported", board.devices.len());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use growbox_types::{
    AlertEvent, DeviceStatusReport, HistoryRecord, NotificationSettings, SensorSnapshot,
    SensorStats,
};

use crate::commands::{DeviceCommand, SettingWrite};
use crate::error::{Error, Result};
use crate::history::HistoryQuery;
use crate::traits::DashboardApi;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the growbox backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Error type for HTTP transport failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend is not reachable.
    #[error("Backend not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

/// A body that is either the expected value or `{"error": "..."}`.
///
/// The error variant is tried first: telemetry payloads are all-optional, so
/// an error body would otherwise decode as an empty value.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    Error { error: String },
    Value(T),
}

impl<T> Payload<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Payload::Error { error } => Err(Error::NoData(error)),
            Payload::Value(value) => Ok(value),
        }
    }
}

fn normalize(base_url: &str) -> std::result::Result<String, ApiError> {
    let base_url = base_url.trim_end_matches('/').to_string();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ApiError::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }
    Ok(base_url)
}

impl ApiClient {
    /// Create a new client with the default timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The backend origin (e.g., "http://127.0.0.1:5050")
    pub fn new(base_url: &str) -> std::result::Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> std::result::Result<Self, ApiError> {
        let base_url = normalize(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Request)?;
        Ok(Self { client, base_url })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<T> {
        let url = self.url(path);
        debug!(%url, params = query.len(), "GET");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::NotReachable {
                url: url.clone(),
                source: e,
            })?;

        let payload: Payload<T> = Self::handle_response(response).await?;
        payload.into_result()
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::NotReachable {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from(response).await.into());
        }
        // Write endpoints may answer with an empty or non-JSON body.
        let text = response.text().await.map_err(ApiError::Request)?;
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::Null))
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await.map_err(ApiError::Request)?)
        } else {
            Err(Self::error_from(response).await.into())
        }
    }

    async fn error_from(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());

        ApiError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl DashboardApi for ApiClient {
    async fn latest(&self) -> Result<SensorSnapshot> {
        self.get("/latest", &[]).await
    }

    async fn stats(&self) -> Result<SensorStats> {
        self.get("/stats", &[]).await
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        self.get("/history", query.params()).await
    }

    async fn current_settings(&self) -> Result<BTreeMap<String, f64>> {
        self.get("/current-settings", &[]).await
    }

    async fn write_setting(&self, write: &SettingWrite) -> Result<()> {
        self.post_json("/current-settings", write).await.map(|_| ())
    }

    async fn device_status(&self) -> Result<DeviceStatusReport> {
        self.get("/device-status", &[]).await
    }

    async fn control_device(&self, command: &DeviceCommand) -> Result<()> {
        self.post_json("/control-device", command).await.map(|_| ())
    }

    async fn notification_settings(&self) -> Result<NotificationSettings> {
        self.get("/notification-settings", &[]).await
    }

    async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        let body = self.post_json("/notification-settings", settings).await?;
        if body.get("status").and_then(|s| s.as_str()) == Some("ok") {
            Ok(())
        } else {
            Err(Error::backend(format!("unexpected save response: {body}")))
        }
    }

    async fn alerts(&self) -> Result<Vec<AlertEvent>> {
        self.get("/alerts", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new("http://127.0.0.1:5050");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "http://127.0.0.1:5050");
    }

    #[test]
    fn test_client_normalizes_url() {
        let client = ApiClient::new("http://localhost:5050/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5050");
        assert_eq!(client.url("/latest"), "http://localhost:5050/latest");
    }

    #[test]
    fn test_client_invalid_url() {
        let result = ApiClient::new("localhost:5050");
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_error_body_wins_over_empty_snapshot() {
        let payload: Payload<SensorSnapshot> =
            serde_json::from_str(r#"{"error": "No data"}"#).unwrap();
        assert!(matches!(payload.into_result(), Err(Error::NoData(m)) if m == "No data"));

        let payload: Payload<SensorSnapshot> =
            serde_json::from_str(r#"{"temp": 21.0, "soil": 40}"#).unwrap();
        assert_eq!(payload.into_result().unwrap().temp, Some(21.0));
    }

    #[test]
    fn test_list_payload() {
        let payload: Payload<Vec<AlertEvent>> = serde_json::from_str("[]").unwrap();
        assert!(payload.into_result().unwrap().is_empty());
    }
}
