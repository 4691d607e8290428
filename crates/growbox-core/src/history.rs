//! Operation-log queries.
//!
//! [`HistoryQueryEngine`] turns [`FilterCriteria`] and a [`SortSpec`] into a
//! `/history` request, keeps the server's answer as its cache, and derives a
//! [`ViewState`] by running the client-side filters from [`crate::filter`]
//! over that cache.
//!
//! # Server and client responsibilities
//!
//! | Criterion | Resolved by |
//! |-----------|-------------|
//! | Date range (or trailing `days`) | Server |
//! | Device, status, reason | Server |
//! | Sort field and direction | Server (never re-sorted locally) |
//! | Duration predicate | Client |
//! | Free-text search | Client |
//!
//! Changing only client-side criteria re-filters the cache without a request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use time::{Date, OffsetDateTime};
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use growbox_types::{DeviceKind, HistoryRecord, ParseError, ParseResult, Switch};

use crate::error::Result;
use crate::filter::apply_client_filters;
use crate::poller::{PollGroup, PollOptions};
use crate::resource::{SyncOutcome, SyncedResource};
use crate::traits::DashboardApi;

/// Default trailing window in days.
pub const DEFAULT_DAYS: u32 = 7;

/// Today's date in local time, falling back to UTC.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// Inclusive calendar date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: Date, end: Date) -> ParseResult<Self> {
        if start > end {
            return Err(ParseError::inverted("date range", start, end));
        }
        Ok(Self { start, end })
    }

    /// The `days` days before `today`, through `today`.
    pub fn trailing(days: u32, today: Date) -> Self {
        Self {
            start: today.saturating_sub(time::Duration::days(i64::from(days))),
            end: today,
        }
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }
}

/// Column the server sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Device,
    Status,
    StartTime,
    EndTime,
    Duration,
    Reason,
}

impl SortField {
    /// Name sent in the `sort` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Device => "device",
            SortField::Status => "status",
            SortField::StartTime => "start_time",
            SortField::EndTime => "end_time",
            SortField::Duration => "duration",
            SortField::Reason => "reason",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Active sort column and direction. Defaults to `start_time desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::StartTime,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    /// Column-header click: the active column flips direction, any other
    /// column becomes active in descending order.
    #[must_use]
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            Self {
                field,
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                field,
                direction: SortDirection::Desc,
            }
        }
    }
}

/// User-entered filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub device: Option<DeviceKind>,
    pub status: Option<Switch>,
    /// `None` means the trailing default window.
    pub date_range: Option<DateRange>,
    pub reason: Option<String>,
    /// Raw duration filter text, parsed at filter time.
    pub duration: Option<String>,
    pub free_text: Option<String>,
}

/// Query parameters for `/history`, in the order they are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    params: Vec<(String, String)>,
}

impl HistoryQuery {
    /// Build the server-side part of a query.
    pub fn build(criteria: &FilterCriteria, sort: SortSpec, default_days: u32) -> Self {
        let mut params = Vec::new();
        let mut push = |k: &str, v: String| params.push((k.to_string(), v));

        match criteria.date_range {
            Some(range) => {
                push("start_date", format!("{}T00:00:00", range.start()));
                push("end_date", format!("{}T23:59:59", range.end()));
            }
            None => push("days", default_days.to_string()),
        }
        if let Some(device) = criteria.device {
            push("device", device.as_str().to_string());
        }
        if let Some(status) = criteria.status {
            push("status", u8::from(status).to_string());
        }
        if let Some(reason) = criteria.reason.as_deref().filter(|r| !r.is_empty()) {
            push("reason", reason.to_string());
        }
        push("sort", sort.field.as_str().to_string());
        push("order", sort.direction.as_str().to_string());

        Self { params }
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of one parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for HistoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// What the history view shows. Exactly one state at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error(String),
    Empty,
    Populated(Vec<HistoryRecord>),
}

impl ViewState {
    /// Records on screen, empty unless populated.
    pub fn records(&self) -> &[HistoryRecord] {
        match self {
            ViewState::Populated(records) => records,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }
}

/// Query engine for the operation log.
pub struct HistoryQueryEngine {
    api: Arc<dyn DashboardApi>,
    default_days: u32,
    criteria: RwLock<FilterCriteria>,
    sort: RwLock<SortSpec>,
    results: SyncedResource<Vec<HistoryRecord>>,
    view: watch::Sender<ViewState>,
    lifetime: CancellationToken,
}

impl fmt::Debug for HistoryQueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryQueryEngine")
            .field("default_days", &self.default_days)
            .field("view", &*self.view.borrow())
            .finish_non_exhaustive()
    }
}

impl HistoryQueryEngine {
    /// Create an engine using the trailing `default_days` window when no date
    /// range is set.
    pub fn new(api: Arc<dyn DashboardApi>, default_days: u32) -> Self {
        Self::with_lifetime(api, default_days, CancellationToken::new())
    }

    pub fn with_lifetime(
        api: Arc<dyn DashboardApi>,
        default_days: u32,
        lifetime: CancellationToken,
    ) -> Self {
        let (view, _) = watch::channel(ViewState::Loading);
        Self {
            api,
            default_days,
            criteria: RwLock::new(FilterCriteria::default()),
            sort: RwLock::new(SortSpec::default()),
            results: SyncedResource::new("history", Vec::new()),
            view,
            lifetime,
        }
    }

    pub async fn criteria(&self) -> FilterCriteria {
        self.criteria.read().await.clone()
    }

    pub async fn sort(&self) -> SortSpec {
        *self.sort.read().await
    }

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    /// Re-fetch with the current criteria, keeping the current view until
    /// the response arrives. Used by background polls.
    pub async fn refresh(&self) -> SyncOutcome {
        // Criteria writers wait for these guards, so a request built from
        // older criteria always draws the lower sequence number.
        let (seq, query) = {
            let criteria = self.criteria.read().await;
            let sort = self.sort.read().await;
            let query = HistoryQuery::build(&criteria, *sort, self.default_days);
            (self.results.issue(), query)
        };
        debug!(seq, query = %query, "Refreshing history");
        let outcome = self
            .results
            .refresh_issued(seq, &self.lifetime, self.api.history(&query), |records, _| {
                Ok(records)
            })
            .await;

        match outcome {
            SyncOutcome::Applied(_) => self.render().await,
            SyncOutcome::Failed => {
                if let Some(error) = self.results.get().error {
                    warn!(%error, "History fetch failed");
                    self.view.send_replace(ViewState::Error(format!(
                        "Failed to load operation history: {error}"
                    )));
                }
            }
            SyncOutcome::Stale(_) | SyncOutcome::Cancelled => {}
        }
        outcome
    }

    /// Show the loading state, then re-fetch.
    pub async fn reload(&self) -> SyncOutcome {
        if !self.lifetime.is_cancelled() {
            self.view.send_replace(ViewState::Loading);
        }
        self.refresh().await
    }

    /// Replace the criteria.
    ///
    /// Returns `None` when only client-side criteria changed: the cache is
    /// re-filtered and no request is made.
    pub async fn set_criteria(&self, criteria: FilterCriteria) -> Option<SyncOutcome> {
        let sort = self.sort().await;
        let server_side_changed = {
            let mut current = self.criteria.write().await;
            let before = HistoryQuery::build(&current, sort, self.default_days);
            let after = HistoryQuery::build(&criteria, sort, self.default_days);
            *current = criteria;
            before != after
        };
        if server_side_changed {
            Some(self.reload().await)
        } else {
            self.render().await;
            None
        }
    }

    /// Change the free-text search and re-filter the cache.
    pub async fn set_free_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.criteria.write().await.free_text = (!text.is_empty()).then_some(text);
        self.render().await;
    }

    /// Column-header click: see [`SortSpec::toggle`]. Always re-fetches.
    pub async fn sort_by(&self, field: SortField) -> SyncOutcome {
        {
            let mut sort = self.sort.write().await;
            *sort = sort.toggle(field);
            debug!(
                field = sort.field.as_str(),
                direction = sort.direction.as_str(),
                "Sort changed"
            );
        }
        self.reload().await
    }

    /// Clear all criteria and select the trailing default window ending
    /// `today`. The sort is kept.
    pub async fn reset_filters(&self, today: Date) -> SyncOutcome {
        *self.criteria.write().await = FilterCriteria {
            date_range: Some(DateRange::trailing(self.default_days, today)),
            ..FilterCriteria::default()
        };
        info!(days = self.default_days, "History filters reset");
        self.reload().await
    }

    /// Register a background refresh poller in `group`.
    pub fn start_polling(self: &Arc<Self>, group: &mut PollGroup, every: Duration) -> Result<()> {
        let this = Arc::clone(self);
        group.spawn(PollOptions::new("history", every), move || {
            let this = Arc::clone(&this);
            async move {
                this.refresh().await;
            }
        })
    }

    /// Drop every response that resolves from now on.
    pub fn teardown(&self) {
        self.lifetime.cancel();
    }

    /// Recompute the view from the cache and the client-side criteria.
    async fn render(&self) {
        if self.lifetime.is_cancelled() {
            return;
        }
        let synced = self.results.get();
        if !synced.is_synced() {
            return;
        }
        let criteria = self.criteria.read().await;
        let visible = apply_client_filters(
            &synced.value,
            criteria.duration.as_deref(),
            criteria.free_text.as_deref(),
        );
        debug!(
            fetched = synced.value.len(),
            visible = visible.len(),
            "History view updated"
        );
        let state = if visible.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Populated(visible)
        };
        self.view.send_replace(state);
    }
}
