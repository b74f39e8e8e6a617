//! Single-shot timer armed at an absolute instant.
//!
//! At most one timer is pending per watcher context; arming a new one
//! unconditionally cancels the previous one. A fired timer is consumed --
//! re-arming only happens on a fresh page lifetime or a schedule change.
//!
//! The sleep is lower-bounded by the requested delay, so the timer never
//! fires before the target instant. How long after is subject to host
//! scheduling jitter; the decision cycle re-checks the wall clock, so jitter
//! can only delay an attempt, never advance one.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct TargetTimer {
    fire_tx: mpsc::Sender<DateTime<Utc>>,
    fire_rx: mpsc::Receiver<DateTime<Utc>>,
    pending: Option<Pending>,
}

struct Pending {
    target: DateTime<Utc>,
    task: JoinHandle<()>,
}

impl TargetTimer {
    pub fn new() -> Self {
        let (fire_tx, fire_rx) = mpsc::channel(1);
        Self {
            fire_tx,
            fire_rx,
            pending: None,
        }
    }

    /// Arm the timer to fire at `target`, cancelling any pending timer.
    /// Returns false without arming when the target is not in the future:
    /// the caller's immediate evaluation pass owns the already-elapsed case.
    pub fn arm(&mut self, now: DateTime<Utc>, target: DateTime<Utc>) -> bool {
        self.cancel();

        let Ok(delay) = (target - now).to_std() else {
            return false;
        };
        if delay.is_zero() {
            return false;
        }

        let tx = self.fire_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(target).await;
        });
        self.pending = Some(Pending { target, task });
        true
    }

    /// Cancel the pending timer, if any, and discard a tick that raced with
    /// the cancellation.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
        while self.fire_rx.try_recv().is_ok() {}
    }

    /// The instant the pending timer is armed for.
    pub fn target(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().map(|p| p.target)
    }

    /// Resolve when the armed timer fires, consuming it. Pends forever when
    /// nothing is armed, so it composes with `tokio::select!`.
    pub async fn fired(&mut self) -> DateTime<Utc> {
        if self.pending.is_none() {
            return std::future::pending().await;
        }
        match self.fire_rx.recv().await {
            Some(target) => {
                self.pending = None;
                target
            }
            // Unreachable: we hold a sender for the channel's whole lifetime.
            None => std::future::pending().await,
        }
    }
}

impl Default for TargetTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn instant(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_738_591_527, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_at_target() {
        let mut timer = TargetTimer::new();
        let now = instant(0);
        let target = instant(30);

        assert!(timer.arm(now, target));
        assert_eq!(timer.target(), Some(target));

        let fired = timer.fired().await;
        assert_eq!(fired, target);
        assert_eq!(timer.target(), None);

        // Consumed: no second tick.
        let second = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(second.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arming_past_target_is_noop() {
        let mut timer = TargetTimer::new();
        let now = instant(10);

        assert!(!timer.arm(now, instant(5)));
        assert!(!timer.arm(now, now));
        assert_eq!(timer.target(), None);

        let fired = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_cancels_previous() {
        let mut timer = TargetTimer::new();
        let now = instant(0);
        let stale = instant(10);
        let fresh = instant(20);

        assert!(timer.arm(now, stale));
        assert!(timer.arm(now, fresh));
        assert_eq!(timer.target(), Some(fresh));

        // Only the fresh timer ever fires.
        let fired = timer.fired().await;
        assert_eq!(fired, fresh);
        let second = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(second.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_tick() {
        let mut timer = TargetTimer::new();
        let now = instant(0);

        assert!(timer.arm(now, instant(5)));
        timer.cancel();
        assert_eq!(timer.target(), None);

        let fired = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(fired.is_err());
    }
}
