//! Interval-driven fetch scheduling.
//!
//! A poller invokes its action immediately, then once per interval, until it
//! is stopped. Each tick spawns the action as its own task, so a slow fetch
//! never delays the next tick and overlapping fetches may resolve in any
//! order. Consumers guard against that with [`crate::resource::SyncedResource`].
//!
//! Stopping a poller (explicitly, or by dropping its [`PollHandle`]) releases
//! the timer and prevents further ticks. Fetches already in flight are left to
//! finish; owners that must not observe them hold a cancellation token and
//! check it before applying results (see [`PollGroup`]).

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Options for a poller.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Time between ticks. The first tick fires immediately.
    pub interval: Duration,
    /// Name used in log lines.
    pub name: &'static str,
}

impl PollOptions {
    /// Create options for a named poller.
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self { interval, name }
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::invalid_config(format!(
                "poll interval for '{}' must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Handle to a running poller.
///
/// Dropping the handle stops the poller.
#[derive(Debug)]
pub struct PollHandle {
    name: &'static str,
    cancel_token: CancellationToken,
    timer: JoinHandle<()>,
}

/// Start polling: run `action` now and then every `options.interval`.
///
/// Returns [`Error::InvalidConfig`] for a zero interval. Must be called from
/// within a tokio runtime.
pub fn spawn_poller<F, Fut>(options: PollOptions, action: F) -> Result<PollHandle>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    options.validate()?;
    let cancel_token = CancellationToken::new();
    let task_token = cancel_token.clone();
    let PollOptions { interval: period, name } = options;

    let timer = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(poller = name, ?period, "Poller started");

        loop {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!(poller = name, "Poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    trace!(poller = name, "Tick");
                    tokio::spawn(action());
                }
            }
        }
    });

    Ok(PollHandle {
        name,
        cancel_token,
        timer,
    })
}

impl PollHandle {
    /// Name of the poller.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop ticking. In-flight fetches are not cancelled.
    pub fn stop(&self) {
        self.cancel_token.cancel();
        self.timer.abort();
    }

    /// Whether the timer is still running.
    pub fn is_active(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.timer.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// View-scoped set of pollers sharing one lifetime token.
///
/// Fetch actions should check [`PollGroup::lifetime`] before applying their
/// results; [`PollGroup::teardown`] stops every timer and cancels the token.
#[derive(Debug, Default)]
pub struct PollGroup {
    lifetime: CancellationToken,
    handles: Vec<PollHandle>,
}

impl PollGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// The group's lifetime token.
    pub fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Start a poller owned by this group.
    pub fn spawn<F, Fut>(&mut self, options: PollOptions, action: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = spawn_poller(options, action)?;
        self.handles.push(handle);
        Ok(())
    }

    /// Number of pollers in the group.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the group has no pollers.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Stop every poller and cancel the lifetime token.
    pub fn teardown(&mut self) {
        self.lifetime.cancel();
        for handle in self.handles.drain(..) {
            handle.stop();
        }
        debug!("Poll group torn down");
    }
}

impl Drop for PollGroup {
    fn drop(&mut self) {
        self.teardown();
    }
}
