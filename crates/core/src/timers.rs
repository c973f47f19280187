use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Per-session registry of delayed actions.
///
/// Each scheduled action is a task that sleeps and then posts its message to
/// the session. `cancel_all` aborts every task that has not fired yet, and
/// dropping the registry does the same.
pub struct PacingTimers<T> {
    tasks: JoinSet<()>,
    tx: mpsc::Sender<T>,
}

impl<T: Send + 'static> PacingTimers<T> {
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self {
            tasks: JoinSet::new(),
            tx,
        }
    }

    /// Posts `message` after `delay`.
    pub fn schedule(&mut self, delay: Duration, message: T) {
        // Reap tasks that already fired.
        while self.tasks.try_join_next().is_some() {}

        let tx = self.tx.clone();
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(message).await.is_err() {
                tracing::debug!("Session is gone, dropping paced action.");
            }
        });
    }

    /// Number of scheduled actions that have not completed yet.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn cancel_all(&mut self) {
        if !self.tasks.is_empty() {
            tracing::debug!("Cancelling {} pending paced action(s).", self.tasks.len());
        }
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_in_delay_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = PacingTimers::new(tx);
        timers.schedule(Duration::from_millis(1500), "advance");
        timers.schedule(Duration::from_millis(500), "welcome");

        assert_eq!(rx.recv().await, Some("welcome"));
        assert_eq!(rx.recv().await, Some("advance"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_actions_never_fire() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = PacingTimers::new(tx);
        timers.schedule(Duration::from_millis(1000), "prompt");
        assert_eq!(timers.pending(), 1);

        timers.cancel_all();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(rx.try_recv().is_err());
    }
}
