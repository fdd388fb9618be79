//! Throttle and debounce primitives built on a [`Scheduler`].

use super::Scheduler;
use crate::types::TimerId;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

type Invoke<A> = Box<dyn Fn(A) + Send + Sync>;

/// Leading-edge rate limiter.
///
/// The first call in a window of length `wait` runs immediately; later calls
/// inside the same window are dropped, not queued.
pub struct Throttled<A> {
    scheduler: Arc<dyn Scheduler>,
    wait: Duration,
    /// Time of the last call that was let through.
    last: Mutex<Option<Duration>>,
    f: Invoke<A>,
}

impl<A> Throttled<A> {
    pub fn new<F>(scheduler: Arc<dyn Scheduler>, wait: Duration, f: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            scheduler,
            wait,
            last: Mutex::new(None),
            f: Box::new(f),
        }
    }

    /// Invoke the wrapped function unless a call already ran in this window.
    ///
    /// Returns whether the call went through.
    pub fn call(&self, args: A) -> bool {
        let now = self.scheduler.now();
        {
            let mut last = self.last.lock();
            match *last {
                Some(at) if now.saturating_sub(at) < self.wait => {
                    trace!(wait_ms = self.wait.as_millis() as u64, "throttled");
                    return false;
                }
                _ => *last = Some(now),
            }
        }
        (self.f)(args);
        true
    }
}

struct DebounceState<A> {
    timer: Option<TimerId>,
    /// Bumped on every call so a superseded timer can tell it is stale.
    generation: u64,
    /// Generation whose timer last closed the window.
    fired: u64,
    /// Latest arguments awaiting the trailing edge.
    pending: Option<A>,
}

struct DebounceInner<A> {
    scheduler: Arc<dyn Scheduler>,
    wait: Duration,
    immediate: bool,
    f: Invoke<A>,
    state: Mutex<DebounceState<A>>,
}

/// Collapses bursts of calls into one.
///
/// Every call restarts a quiescence window of length `wait`. In trailing mode
/// the latest arguments are delivered once the window closes; in immediate
/// mode the first call of a burst is delivered at once and the rest of the
/// burst is discarded.
pub struct Debounced<A> {
    inner: Arc<DebounceInner<A>>,
}

impl<A: Send + 'static> Debounced<A> {
    pub fn new<F>(scheduler: Arc<dyn Scheduler>, wait: Duration, immediate: bool, f: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DebounceInner {
                scheduler,
                wait,
                immediate,
                f: Box::new(f),
                state: Mutex::new(DebounceState {
                    timer: None,
                    generation: 0,
                    fired: 0,
                    pending: None,
                }),
            }),
        }
    }

    pub fn call(&self, args: A) {
        let inner = &self.inner;

        // The scheduler is only touched with the state lock released, so a
        // scheduler that blocks cannot stall a timer firing on another thread.
        let (previous, generation, run_now) = {
            let mut state = inner.state.lock();
            let previous = state.timer.take();
            let idle = previous.is_none() && state.fired == state.generation;

            state.generation += 1;
            let run_now = if inner.immediate {
                idle.then_some(args)
            } else {
                state.pending = Some(args);
                None
            };
            (previous, state.generation, run_now)
        };

        if let Some(timer) = previous {
            inner.scheduler.cancel(timer);
        }

        let weak: Weak<DebounceInner<A>> = Arc::downgrade(inner);
        let timer = inner.scheduler.schedule_once(
            inner.wait,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.fire(generation);
                }
            }),
        );

        {
            let mut state = inner.state.lock();
            if state.generation == generation && state.fired != generation {
                state.timer = Some(timer);
            }
        }

        if let Some(args) = run_now {
            (inner.f)(args);
        }
    }

    /// Whether a quiescence window is currently open.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }
}

impl<A> DebounceInner<A> {
    fn fire(&self, generation: u64) {
        let args = {
            let mut state = self.state.lock();
            if state.generation != generation {
                trace!(generation, "stale debounce timer");
                return;
            }
            state.timer = None;
            state.fired = generation;
            state.pending.take()
        };

        if let Some(args) = args {
            (self.f)(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn collector() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: u32| sink.lock().push(v))
    }

    #[test]
    fn test_throttle_leading_edge() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (seen, sink) = collector();
        let throttled = Throttled::new(scheduler.clone(), ms(100), sink);

        assert!(throttled.call(1));
        scheduler.advance(ms(50));
        assert!(!throttled.call(2));
        scheduler.advance(ms(49));
        assert!(!throttled.call(3));
        scheduler.advance(ms(1));
        assert!(throttled.call(4));

        // Dropped calls are never replayed.
        scheduler.run_until_idle();
        assert_eq!(*seen.lock(), vec![1, 4]);
    }

    #[test]
    fn test_throttle_zero_wait_passes_everything() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (seen, sink) = collector();
        let throttled = Throttled::new(scheduler, Duration::ZERO, sink);

        for v in 0..4 {
            throttled.call(v);
        }
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_debounce_trailing_delivers_latest() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (seen, sink) = collector();
        let debounced = Debounced::new(scheduler.clone(), ms(50), false, sink);

        debounced.call(1);
        scheduler.advance(ms(30));
        debounced.call(2);
        scheduler.advance(ms(30));
        debounced.call(3);
        assert!(seen.lock().is_empty());
        assert!(debounced.is_pending());

        scheduler.advance(ms(49));
        assert!(seen.lock().is_empty());
        scheduler.advance(ms(1));
        assert_eq!(*seen.lock(), vec![3]);
        assert!(!debounced.is_pending());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_debounce_immediate_fires_first_of_burst() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (seen, sink) = collector();
        let debounced = Debounced::new(scheduler.clone(), ms(50), true, sink);

        debounced.call(1);
        debounced.call(2);
        scheduler.advance(ms(40));
        debounced.call(3);
        assert_eq!(*seen.lock(), vec![1]);

        // Window closes 50ms after the last call, with no trailing delivery.
        scheduler.advance(ms(50));
        assert_eq!(*seen.lock(), vec![1]);

        debounced.call(4);
        assert_eq!(*seen.lock(), vec![1, 4]);
    }

    #[test]
    fn test_debounce_timer_outliving_owner_is_noop() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (seen, sink) = collector();
        let debounced = Debounced::new(scheduler.clone(), ms(10), false, sink);

        debounced.call(7);
        drop(debounced);
        scheduler.run_until_idle();
        assert!(seen.lock().is_empty());
    }
}
