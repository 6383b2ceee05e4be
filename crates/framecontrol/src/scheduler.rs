//! The perpetual render loop and the tick source that paces it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Paces the render loop, one call per display refresh.
pub trait TickScheduler: Send {
    /// Block until the next tick is due.
    fn wait_tick(&mut self);
}

/// Fixed-rate stand-in for a display's animation-frame callback.
pub struct IntervalScheduler {
    period: Duration,
    next: Option<Instant>,
}

impl IntervalScheduler {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64),
            next: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl TickScheduler for IntervalScheduler {
    fn wait_tick(&mut self) {
        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        // After a stall, resume the cadence from now instead of bursting to catch up
        let after = due + self.period;
        self.next = Some(if after < now { now + self.period } else { after });
    }
}

/// Runs a tick callback on its own thread until stopped or dropped.
pub struct RenderLoop {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl RenderLoop {
    pub fn spawn<S, F>(mut scheduler: S, mut on_tick: F) -> Result<Self>
    where
        S: TickScheduler + 'static,
        F: FnMut() + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();

        let thread = thread::Builder::new()
            .name("framecontrol-render".into())
            .spawn(move || {
                log::info!("Render loop started");
                let mut ticks = 0u64;
                while !cancel_flag.load(Ordering::Acquire) {
                    scheduler.wait_tick();
                    // Teardown may have happened while we slept
                    if cancel_flag.load(Ordering::Acquire) {
                        break;
                    }
                    on_tick();
                    ticks += 1;
                }
                log::info!("Render loop stopped after {ticks} ticks");
                ticks
            })?;

        Ok(Self {
            cancel,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the pending tick and wait for the loop to exit.
    /// Returns how many ticks ran. Safe to call more than once.
    pub fn stop(&mut self) -> u64 {
        self.cancel.store(true, Ordering::Release);
        match self.thread.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                log::error!("Render loop thread panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Ticks as fast as possible.
    struct Immediate;

    impl TickScheduler for Immediate {
        fn wait_tick(&mut self) {
            thread::yield_now();
        }
    }

    #[test]
    fn loop_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut render = RenderLoop::spawn(Immediate, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        while count.load(Ordering::SeqCst) < 10 {
            thread::yield_now();
        }
        assert!(render.is_running());
        let ticks = render.stop();
        assert!(!render.is_running());

        let after_stop = count.load(Ordering::SeqCst);
        assert_eq!(ticks as usize, after_stop);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert_eq!(render.stop(), 0);
    }

    #[test]
    fn drop_cancels_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let render = RenderLoop::spawn(IntervalScheduler::new(1000), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(render);

        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn interval_scheduler_paces_ticks() {
        let mut scheduler = IntervalScheduler::new(200);
        assert_eq!(scheduler.period(), Duration::from_millis(5));
        let start = Instant::now();
        for _ in 0..5 {
            scheduler.wait_tick();
        }
        // First tick is immediate, then four periods
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn zero_hz_is_treated_as_one() {
        assert_eq!(IntervalScheduler::new(0).period(), Duration::from_secs(1));
    }
}
