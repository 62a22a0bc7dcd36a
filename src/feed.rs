use crate::{
    decode::decode_batch,
    error::FeedError,
    events::RollEvent,
    explorer::RawLog,
};

pub mod merge;
pub mod poller;

pub use merge::{
    advance_cursor,
    merge,
};
pub use poller::EventFeed;


#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedStatus {
    /// No poll has completed yet.
    #[default]
    Loading,
    Ready,
    Failed(String),
}

/// Everything a mounted feed knows, replaced wholesale on every completed poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    /// Newest block first, unique by transaction hash.
    pub events: Vec<RollEvent>,
    pub cursor: Option<u64>,
    pub status: FeedStatus,
    pub decode_failures: usize,
    /// Issue number of the poll whose outcome `status` reflects; 0 before any.
    pub status_poll: u64,
}

impl FeedState {
    /// A feed that will never poll, showing `error` instead.
    pub fn blocked(error: &FeedError) -> Self {
        Self {
            status: FeedStatus::Failed(error.to_string()),
            ..Self::default()
        }
    }

    pub fn next_from_block(&self) -> u64 {
        self.cursor.map_or(0, |c| c.saturating_add(1))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            FeedStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == FeedStatus::Loading
    }

    pub fn applied(&self, outcome: Result<Vec<RawLog>, FeedError>) -> Self {
        match outcome {
            Ok(raw) => self.with_batch(&raw),
            Err(err) => self.with_failure(&err),
        }
    }

    /// Like [`FeedState::applied`] for the `poll`-th issued query. Events and
    /// cursor always absorb a batch, but the status only follows polls issued
    /// after the one it currently reflects.
    pub fn applied_in_order(&self, poll: u64, outcome: Result<Vec<RawLog>, FeedError>) -> Self {
        let mut next = self.applied(outcome);
        if poll < self.status_poll {
            next.status = self.status.clone();
        } else {
            next.status_poll = poll;
        }
        next
    }

    pub fn with_batch(&self, raw: &[RawLog]) -> Self {
        let batch = decode_batch(raw);
        Self {
            events: merge(&self.events, &batch.events),
            cursor: advance_cursor(self.cursor, batch.raw_max_block),
            status: FeedStatus::Ready,
            decode_failures: self.decode_failures + batch.failures,
            status_poll: self.status_poll,
        }
    }

    /// Keeps events and cursor; only the status changes.
    pub fn with_failure(&self, err: &FeedError) -> Self {
        Self {
            status: FeedStatus::Failed(err.to_string()),
            ..self.clone()
        }
    }
}
