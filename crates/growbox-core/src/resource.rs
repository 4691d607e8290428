//! Sequence-guarded, observable holders for remote state.
//!
//! A [`SyncedResource`] pairs a value with the sequence number of the fetch
//! that produced it. Every fetch draws a number from [`SyncedResource::issue`]
//! before it starts; when it resolves, its result is applied only if that
//! number is greater than the last one applied. Overlapping polls can resolve
//! in any order without an older response overwriting a newer one.
//!
//! Optimistic edits go through [`SyncedResource::patch`], which does not take
//! a sequence number. A poll that was issued before the edit but resolves
//! after it will still replace the edited value: the last applied write wins.
//!
//! # Example
//!
//! ```
//! use growbox_core::resource::SyncedResource;
//!
//! let counter = SyncedResource::new("counter", 0u32);
//! let first = counter.issue();
//! let second = counter.issue();
//!
//! assert!(counter.apply(second, 2));
//! assert!(!counter.apply(first, 1)); // stale, discarded
//! assert_eq!(counter.value(), 2);
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

/// A value plus its synchronization metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Synced<T> {
    /// Current value: the caller's default until the first applied fetch.
    pub value: T,
    /// Sequence number of the last applied fetch, `None` before the first.
    pub last_applied_seq: Option<u64>,
    /// Message of the most recent failure, cleared by the next apply.
    pub error: Option<String>,
}

impl<T> Synced<T> {
    /// Whether any fetch has been applied yet.
    pub fn is_synced(&self) -> bool {
        self.last_applied_seq.is_some()
    }
}

/// What happened to one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The response replaced the value.
    Applied(u64),
    /// A newer response had already been applied; this one was dropped.
    Stale(u64),
    /// The fetch failed; the value was kept and the error flag raised.
    Failed,
    /// The owner was torn down before the response arrived.
    Cancelled,
}

/// Observable, sequence-guarded holder for one piece of remote state.
#[derive(Debug)]
pub struct SyncedResource<T> {
    name: &'static str,
    next_seq: AtomicU64,
    state: watch::Sender<Synced<T>>,
}

impl<T: Clone + Send + Sync + 'static> SyncedResource<T> {
    /// Create a resource holding `initial` until the first fetch applies.
    pub fn new(name: &'static str, initial: T) -> Self {
        let (state, _) = watch::channel(Synced {
            value: initial,
            last_applied_seq: None,
            error: None,
        });
        Self {
            name,
            next_seq: AtomicU64::new(1),
            state,
        }
    }

    /// Name used in log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Draw the next sequence number. Numbers start at 1 and strictly increase.
    pub fn issue(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Replace the value with a response tagged `seq`.
    ///
    /// Returns `false`, leaving state untouched, when `seq` does not exceed
    /// the last applied sequence number.
    pub fn apply(&self, seq: u64, value: T) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if state.last_applied_seq.is_some_and(|last| seq <= last) {
                return false;
            }
            state.value = value;
            state.last_applied_seq = Some(seq);
            state.error = None;
            applied = true;
            true
        });
        if applied {
            debug!(resource = self.name, seq, "Applied response");
        } else {
            debug!(resource = self.name, seq, "Discarded stale response");
        }
        applied
    }

    /// Raise the error flag for a failed fetch tagged `seq`, keeping the value.
    ///
    /// Failures older than the last applied response are ignored.
    pub fn record_failure(&self, seq: u64, error: &crate::Error) {
        let message = error.to_string();
        let raised = self.state.send_if_modified(|state| {
            if state.last_applied_seq.is_some_and(|last| seq <= last) {
                return false;
            }
            state.error = Some(message.clone());
            true
        });
        if raised {
            warn!(resource = self.name, seq, error = %message, "Fetch failed, keeping last value");
        }
    }

    /// Mutate the value in place without consuming a sequence number.
    pub fn patch(&self, f: impl FnOnce(&mut T)) {
        self.state.send_modify(|state| f(&mut state.value));
    }

    /// Like [`patch`](Self::patch), but `f` may reject the edit.
    ///
    /// `f` runs against a copy of the current value while the state is
    /// locked; the copy replaces the value only when `f` returns `Ok`.
    pub fn try_patch<E>(
        &self,
        f: impl FnOnce(&mut T) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            let mut next = state.value.clone();
            match f(&mut next) {
                Ok(()) => {
                    state.value = next;
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }

    /// Issue, await `fetch`, then apply or record the failure.
    ///
    /// Nothing is touched if `lifetime` is cancelled, before or after the
    /// fetch.
    pub async fn refresh<F>(&self, lifetime: &CancellationToken, fetch: F) -> SyncOutcome
    where
        F: Future<Output = Result<T>>,
    {
        self.refresh_with(lifetime, fetch, |value, _| Ok(value)).await
    }

    /// Like [`refresh`](Self::refresh), with a conversion step that also sees
    /// the sequence number. A conversion error counts as a fetch failure.
    pub async fn refresh_with<F, R, B>(
        &self,
        lifetime: &CancellationToken,
        fetch: F,
        build: B,
    ) -> SyncOutcome
    where
        F: Future<Output = Result<R>>,
        B: FnOnce(R, u64) -> Result<T>,
    {
        if lifetime.is_cancelled() {
            return SyncOutcome::Cancelled;
        }
        let seq = self.issue();
        self.refresh_issued(seq, lifetime, fetch, build).await
    }

    /// Await `fetch` under a sequence number the caller already drew.
    ///
    /// Callers that derive the request from shared state draw `seq` while
    /// that state is still locked, so a request built from older state always
    /// carries a lower number.
    pub async fn refresh_issued<F, R, B>(
        &self,
        seq: u64,
        lifetime: &CancellationToken,
        fetch: F,
        build: B,
    ) -> SyncOutcome
    where
        F: Future<Output = Result<R>>,
        B: FnOnce(R, u64) -> Result<T>,
    {
        if lifetime.is_cancelled() {
            return SyncOutcome::Cancelled;
        }
        let result = fetch.await;
        if lifetime.is_cancelled() {
            debug!(resource = self.name, seq, "Owner torn down, dropping response");
            return SyncOutcome::Cancelled;
        }
        match result.and_then(|raw| build(raw, seq)) {
            Ok(value) => {
                if self.apply(seq, value) {
                    SyncOutcome::Applied(seq)
                } else {
                    SyncOutcome::Stale(seq)
                }
            }
            Err(e) => {
                self.record_failure(seq, &e);
                SyncOutcome::Failed
            }
        }
    }

    /// Snapshot of value and metadata.
    pub fn get(&self) -> Synced<T> {
        self.state.borrow().clone()
    }

    /// Clone of the current value.
    pub fn value(&self) -> T {
        self.state.borrow().value.clone()
    }

    /// Whether the last fetch failed.
    pub fn has_error(&self) -> bool {
        self.state.borrow().error.is_some()
    }

    /// Watch every replacement of the state.
    pub fn subscribe(&self) -> watch::Receiver<Synced<T>> {
        self.state.subscribe()
    }
}
