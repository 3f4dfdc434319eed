//! Owned timer handle
//!
//! A `Timer` owns the task driving it; stopping or dropping the handle aborts
//! the task, so a timer can never outlive the component holding it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

#[derive(Debug, Default)]
pub struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Timer that is not running
    pub fn idle() -> Self {
        Self::default()
    }

    /// Call `tick` every `period`, first after one period; stops when it returns false
    pub fn repeating<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut clock = interval_at(Instant::now() + period, period);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                clock.tick().await;
                if !tick().await {
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Run `fire` once after `delay`
    pub fn once<F>(delay: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the driving task; a no-op on an idle timer
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Stop the current timer, then install `next`; returns whether one was running
    pub fn replace(&mut self, next: Timer) -> bool {
        let was_active = self.is_active();
        self.stop();
        *self = next;
        was_active
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_repeating_ticks_until_false() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        let timer = Timer::repeating(Duration::from_millis(10), move || {
            let seen = seen.clone();
            async move { seen.fetch_add(1, Ordering::SeqCst) + 1 < 3 }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        let mut timer = Timer::repeating(Duration::from_millis(10), move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(25)).await;
        timer.stop();
        let after_stop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(after_stop, 2);
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_and_drop_cancels() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = Timer::once(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst)
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fired.load(Ordering::SeqCst));
        drop(timer);

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let timer = Timer::once(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst)
        });
        drop(timer);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_reports_previous() {
        let mut timer = Timer::idle();
        assert!(!timer.replace(Timer::once(Duration::from_secs(1), || {})));
        assert!(timer.replace(Timer::once(Duration::from_secs(1), || {})));
        assert!(timer.is_active());
    }
}
