use super::FeedState;
use crate::{
    error::FeedError,
    explorer::LogSource,
    schedule::RepeatingTask,
};
use std::{
    sync::{
        Arc,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::sync::watch;

/// A mounted event feed: one log source, one cursor, one event list.
///
/// Dropping the feed (or calling [`EventFeed::shutdown`]) stops polling;
/// results of queries still in flight are discarded.
pub struct EventFeed {
    state: watch::Receiver<FeedState>,
    task: Option<RepeatingTask>,
}

impl EventFeed {
    /// Poll `source` right away and then every `interval`.
    pub fn spawn<S: LogSource>(source: S, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(FeedState::default());
        let tx = Arc::new(tx);
        let source = Arc::new(source);
        let issued = AtomicU64::new(0);
        let task = RepeatingTask::spawn(interval, move || {
            let poll = issued.fetch_add(1, Ordering::Relaxed) + 1;
            let source = Arc::clone(&source);
            let tx = Arc::clone(&tx);
            async move { poll_once(source.as_ref(), &tx, poll).await }
        });
        Self {
            state: rx,
            task: Some(task),
        }
    }

    /// A feed that never polls and only reports `error`.
    pub fn blocked(error: FeedError) -> Self {
        tracing::warn!(%error, "event feed blocked");
        let (_tx, rx) = watch::channel(FeedState::blocked(&error));
        Self {
            state: rx,
            task: None,
        }
    }

    /// Spawn when a source could be built, otherwise mount blocked.
    pub fn mount<S: LogSource>(source: Result<S, FeedError>, interval: Duration) -> Self {
        match source {
            Ok(source) => Self::spawn(source, interval),
            Err(error) => Self::blocked(error),
        }
    }

    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}

/// Run the `poll`-th query from the current cursor and fold its outcome into
/// `state`.
///
/// The new state is computed from whatever value is current when the query
/// completes, so overlapping polls may finish in any order; a poll finishing
/// behind a later one still merges its events but leaves the status alone.
pub async fn poll_once<S: LogSource>(source: &S, state: &watch::Sender<FeedState>, poll: u64) {
    let from_block = state.borrow().next_from_block();
    let outcome = source.fetch_logs(from_block).await;
    match &outcome {
        Ok(raw) => tracing::debug!(poll, from_block, entries = raw.len(), "explorer batch received"),
        Err(err) => tracing::warn!(poll, from_block, error = %err, "explorer poll failed"),
    }
    state.send_modify(|current| *current = current.applied_in_order(poll, outcome));
}
