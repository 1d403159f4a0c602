use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Interval between countdown ticks.
pub const TICK: Duration = Duration::from_secs(1);

struct Run {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// One-second countdown running on the tokio timer.
///
/// `on_tick` receives the remaining seconds after each elapsed second, strictly
/// decreasing down to 0. `on_expire` fires once, right after the tick that
/// reaches 0, unless the countdown was cancelled first. Holds no exam state.
#[derive(Default)]
pub struct Countdown {
    run: Option<Run>,
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down from `total_seconds`, cancelling any earlier run.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<T, E>(&mut self, total_seconds: u32, mut on_tick: T, on_expire: E)
    where
        T: FnMut(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.cancel();

        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut remaining = total_seconds;

            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    return;
                }
                if remaining > 0 {
                    remaining -= 1;
                    on_tick(remaining);
                }
                if remaining == 0 {
                    // Whoever flips the flag first wins: expiry or cancel, never both.
                    if !flag.swap(true, Ordering::AcqRel) {
                        on_expire();
                    }
                    return;
                }
            }
        });

        self.run = Some(Run { stopped, task });
    }

    /// Stop the countdown. Safe to call any number of times.
    pub fn cancel(&mut self) {
        if let Some(run) = self.run.take() {
            run.stopped.store(true, Ordering::Release);
            run.task.abort();
        }
    }

    /// Whether a countdown is running and has neither expired nor been cancelled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.stopped.load(Ordering::Acquire) && !run.task.is_finished())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        ticks: Arc<Mutex<Vec<u32>>>,
        expired: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                ticks: Arc::new(Mutex::new(Vec::new())),
                expired: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn start(&self, countdown: &mut Countdown, total: u32) {
            let ticks = Arc::clone(&self.ticks);
            let expired = Arc::clone(&self.expired);
            countdown.start(
                total,
                move |remaining| ticks.lock().unwrap().push(remaining),
                move || {
                    expired.fetch_add(1, Ordering::SeqCst);
                },
            );
        }

        fn ticks(&self) -> Vec<u32> {
            self.ticks.lock().unwrap().clone()
        }

        fn expired(&self) -> usize {
            self.expired.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expires_once_after_exactly_total_ticks() {
        let recorder = Recorder::new();
        let mut countdown = Countdown::new();
        recorder.start(&mut countdown, 3);
        assert!(countdown.is_running());

        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(recorder.ticks(), [2, 1]);
        assert_eq!(recorder.expired(), 0);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(recorder.ticks(), [2, 1, 0]);
        assert_eq!(recorder.expired(), 1);
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_expiry_suppresses_expire() {
        let recorder = Recorder::new();
        let mut countdown = Countdown::new();
        recorder.start(&mut countdown, 5);

        time::sleep(Duration::from_millis(2_500)).await;
        countdown.cancel();
        countdown.cancel();
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(recorder.ticks(), [4, 3]);
        assert_eq!(recorder.expired(), 0);
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_replaces_previous_run() {
        let first = Recorder::new();
        let second = Recorder::new();
        let mut countdown = Countdown::new();
        first.start(&mut countdown, 10);
        time::sleep(Duration::from_millis(1_500)).await;

        second.start(&mut countdown, 2);
        time::sleep(Duration::from_secs(20)).await;

        assert_eq!(first.ticks(), [9]);
        assert_eq!(first.expired(), 0);
        assert_eq!(second.ticks(), [1, 0]);
        assert_eq!(second.expired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_seconds_expires_without_ticking() {
        let recorder = Recorder::new();
        let mut countdown = Countdown::new();
        recorder.start(&mut countdown, 0);

        time::sleep(Duration::from_millis(1_500)).await;
        assert!(recorder.ticks().is_empty());
        assert_eq!(recorder.expired(), 1);
    }

    #[test]
    fn cancel_without_start_is_noop() {
        let mut countdown = Countdown::new();
        countdown.cancel();
        assert!(!countdown.is_running());
    }
}
