//! The per-request run state threaded through a pipeline.
//!
//! A `RunContext` is created fresh for every request, wrapped in an `Arc`
//! and handed to each node in turn. Parallel children hold clones of the
//! same `Arc` and mutate it concurrently.
//!
//! ## Synchronization
//! Candidates, recall results, favorites and the trace log live behind one
//! `Mutex`. Every accessor takes or returns owned values, so no caller can
//! keep a reference into the guarded state. The lock is never held across
//! an `.await`.
//!
//! ## Cancellation
//! The context carries an optional deadline and an explicit cancel flag.
//! Nodes that block on I/O race their work against `cancelled()`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::types::{Item, User};

#[derive(Debug, Default)]
struct RunState {
    user: User,
    candidates: Vec<Item>,
    recall_results: HashMap<String, Vec<Item>>,
    trace: Vec<String>,
}

/// Shared, concurrency-safe state for one pipeline run.
#[derive(Debug)]
pub struct RunContext {
    user_id: String,
    config: HashMap<String, Value>,
    deadline: Option<Instant>,
    cancel_tx: watch::Sender<bool>,
    state: Mutex<RunState>,
}

impl RunContext {
    /// Create a context for `user` with empty candidates and no deadline.
    pub fn new(user: User) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            user_id: user.id.clone(),
            config: HashMap::new(),
            deadline: None,
            cancel_tx,
            state: Mutex::new(RunState {
                user,
                ..Default::default()
            }),
        }
    }

    /// Add a scoped config entry such as the active `domain` (builder pattern).
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Set an absolute deadline for the run.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Snapshot of the caller.
    pub fn user(&self) -> User {
        self.lock().user.clone()
    }

    /// Snapshot of the caller's favorites.
    pub fn favorites(&self) -> Vec<String> {
        self.lock().user.favorites.clone()
    }

    /// Replace the caller's favorites for the rest of this run.
    pub fn set_favorites(&self, favorites: Vec<String>) {
        self.lock().user.favorites = favorites;
    }

    pub fn config(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Independent copy of the current candidate set.
    pub fn candidates(&self) -> Vec<Item> {
        self.lock().candidates.clone()
    }

    /// Append items to the candidate set.
    pub fn add_candidates(&self, items: Vec<Item>) {
        self.lock().candidates.extend(items);
    }

    /// Replace the candidate set wholesale (filters and rankers).
    pub fn update_candidates(&self, items: Vec<Item>) {
        self.lock().candidates = items;
    }

    /// Record what a recall source produced and merge it into the candidates.
    pub fn set_recall_result(&self, source: impl Into<String>, items: Vec<Item>) {
        let mut state = self.lock();
        state.candidates.extend(items.iter().cloned());
        state.recall_results.insert(source.into(), items);
    }

    pub fn recall_result(&self, source: &str) -> Option<Vec<Item>> {
        self.lock().recall_results.get(source).cloned()
    }

    pub fn recall_results(&self) -> HashMap<String, Vec<Item>> {
        self.lock().recall_results.clone()
    }

    /// Append a human readable entry to the trace log.
    pub fn add_log(&self, message: impl Into<String>) {
        self.lock().trace.push(message.into());
    }

    pub fn trace(&self) -> Vec<String> {
        self.lock().trace.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Signal every node observing this context to stop.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once `cancel` is called or the deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        let signal = async move {
            // The sender lives in `self`, so `wait_for` only returns on cancel.
            let _ = rx.wait_for(|cancelled| *cancelled).await;
        };
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = signal => {}
                _ = tokio::time::sleep_until(deadline) => {}
            },
            None => signal.await,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // A panicking branch can poison the mutex; the state itself is still whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
