use std::{
    future::Future,
    time::Duration,
};
use tokio::{
    task::{
        JoinHandle,
        JoinSet,
    },
    time::{
        self,
        MissedTickBehavior,
    },
};

/// A job fired once right away and then every `period` until cancelled.
///
/// A firing does not wait for the previous job to finish, so jobs may
/// overlap. Cancelling (or dropping) the task stops the timer and aborts
/// every job still in flight.
pub struct RepeatingTask {
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// `period` must be non-zero.
    pub fn spawn<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        in_flight.spawn(job());
                    }
                    Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(err) = done {
                            if err.is_panic() {
                                tracing::error!(error = %err, "scheduled job panicked");
                            }
                        }
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
