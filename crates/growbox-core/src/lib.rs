//! Client-side core for the growbox dashboard.
//!
//! This crate keeps a local, observable mirror of a growbox backend: actuator
//! states, smart-control thresholds, live telemetry, the operation log and the
//! alert feed. State is refreshed by periodic pollers and changed through
//! optimistic commands.
//!
//! # Features
//!
//! - **Synchronization**: sequence-guarded resources that drop out-of-order
//!   responses and keep the last good value on failure
//! - **Commands**: optimistic setting writes and device toggles
//! - **Operation log**: server-side filters plus duration and free-text
//!   filtering, three-state column sorting
//! - **Alerts**: polled alert feed fanned out over a broadcast channel
//! - **Teardown**: every consumer is bound to a cancellation token
//!
//! # Consistency model
//!
//! Pollers and commands write the same state and the last applied write wins.
//! A poll issued before a command and resolving after it overwrites the
//! optimistic value. Responses that resolve out of order are discarded by
//! sequence number, never by arrival time.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use growbox_core::{ApiClient, ControlStore, PollGroup, SettingsSynchronizer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(ApiClient::new("http://127.0.0.1:5050")?);
//!     let store = ControlStore::shared();
//!     let sync = Arc::new(SettingsSynchronizer::new(api, store.clone()));
//!
//!     let mut group = PollGroup::new();
//!     sync.start_polling(&mut group, Duration::from_secs(30), Duration::from_secs(10))?;
//!
//!     let mut devices = store.subscribe_devices();
//!     devices.changed().await?;
//!     println!("{:?}", devices.borrow().value);
//!     Ok(())
//! }
//! ```

pub mod alerts;
#[cfg(feature = "http-client")]
pub mod client;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod history;
pub mod mock;
pub mod poller;
pub mod resource;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod thresholds;
pub mod traits;

// Core exports
pub use error::{Error, Result};
pub use traits::DashboardApi;

#[cfg(feature = "http-client")]
pub use client::{ApiClient, ApiError};

pub use alerts::{AlertNotifier, AlertReceiver, AlertSender};
pub use commands::{DeviceCommand, MANUAL_TOGGLE_REASON, SettingWrite};
pub use config::{Config, ConfigError, ValidationError};
pub use dispatch::{
    CommandDispatcher, LogicalSetting, SettingDomain, SettingValue, ThresholdReport, WriteOutcome,
};
pub use filter::{DurationOp, DurationPredicate, apply_client_filters, format_duration};
pub use history::{
    DateRange, FilterCriteria, HistoryQuery, HistoryQueryEngine, SortDirection, SortField,
    SortSpec, ViewState,
};
pub use mock::MockBackend;
pub use poller::{PollGroup, PollHandle, PollOptions, spawn_poller};
pub use resource::{SyncOutcome, Synced, SyncedResource};
pub use store::{ControlStore, SharedStore};
pub use sync::SettingsSynchronizer;
pub use telemetry::TelemetryFeed;
pub use thresholds::{AlertCondition, Thresholds};

// Re-export from growbox-types
pub use growbox_types::{
    AlertEvent, ControlSettings, DeviceBoard, DeviceKind, HistoryRecord, NotificationSettings,
    PlantStatus, SensorSnapshot, SensorStats, Switch, ThresholdKey,
};
