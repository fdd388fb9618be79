//! Constructors for the stock strategies.
//!
//! Every factory validates its arguments up front. An invalid argument is an
//! `Err` here and never a failure at delivery time.

use super::{Next, Strategy, StrategyKind};
use crate::error::{Result, StrategyError};
use crate::predicates::{ConsecutiveDistinctPredicate, DistinctPredicate, Predicate};
use crate::scheduler::{Debounced, Scheduler, Throttled};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Options for [`distinct`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctOptions {
    /// Compare against every value ever accepted instead of only the last one.
    #[serde(default)]
    pub all: bool,
}

/// Convert a millisecond count into a `Duration`.
///
/// Rejects NaN, infinities and negative values.
pub fn millis(ms: f64) -> Result<Duration> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(StrategyError::InvalidMilliseconds(ms.to_string()));
    }
    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
}

/// Delay each message by `ms` before continuing.
///
/// Every message gets its own timer; nothing is cancelled, so concurrent
/// messages may reach the subscriber in any order.
pub fn with_delay<T, E>(scheduler: Arc<dyn Scheduler>, ms: f64) -> Result<Strategy<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let delay = millis(ms)?;
    Ok(delay_strategy(scheduler, delay))
}

/// Yield to the scheduler once before continuing. Same as a zero delay.
pub fn defer<T, E>(scheduler: Arc<dyn Scheduler>) -> Strategy<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    delay_strategy(scheduler, Duration::ZERO)
}

fn delay_strategy<T, E>(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Strategy<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Strategy::new(StrategyKind::WithDelay, move |next, data, envelope| {
        let next = next.clone();
        scheduler.schedule_once(
            delay,
            Box::new(move || {
                if !next.call_if_live(data, envelope) {
                    trace!("delayed message dropped, subscription disposed");
                }
            }),
        );
    })
}

/// Pass every message through, and call `on_exhausted` once on the
/// `max_calls`-th message.
///
/// The exhausting message itself still continues down the pipeline. If
/// `on_exhausted` disposes the subscription, the first `max_calls` messages
/// keep going through any timed stages further in.
pub fn stop_after<T, E, F>(max_calls: u64, on_exhausted: F) -> Result<Strategy<T, E>>
where
    T: 'static,
    E: 'static,
    F: FnOnce() + Send + 'static,
{
    if max_calls == 0 {
        return Err(StrategyError::InvalidMaxCalls(max_calls.to_string()));
    }

    let calls = AtomicU64::new(0);
    let on_exhausted: Mutex<Option<Box<dyn FnOnce() + Send>>> =
        Mutex::new(Some(Box::new(on_exhausted)));

    Ok(Strategy::new(StrategyKind::StopAfter, move |next, data, envelope| {
        let count = calls.fetch_add(1, Ordering::AcqRel) + 1;
        if count > max_calls {
            next.call(data, envelope);
            return;
        }
        if count == max_calls {
            let callback = on_exhausted.lock().take();
            if let Some(callback) = callback {
                debug!(max_calls, "call limit reached");
                let was_live = next.is_live();
                callback();
                if was_live && !next.is_live() {
                    next.liveness().retire();
                }
            }
        }
        next.admitted().call(data, envelope);
    }))
}

/// Let at most one message through per `ms` window (leading edge).
pub fn with_throttle<T, E>(scheduler: Arc<dyn Scheduler>, ms: f64) -> Result<Strategy<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let wait = millis(ms)?;
    let throttled = Throttled::new(scheduler, wait, |(next, data, envelope): (Next<T, E>, T, E)| {
        next.call(data, envelope)
    });

    Ok(Strategy::new(StrategyKind::WithThrottle, move |next, data, envelope| {
        throttled.call((next.clone(), data, envelope));
    }))
}

/// Collapse bursts closer together than `ms` into one message.
///
/// Trailing mode delivers the last message of the burst after `ms` of quiet;
/// `immediate` delivers the first one right away instead.
pub fn with_debounce<T, E>(
    scheduler: Arc<dyn Scheduler>,
    ms: f64,
    immediate: bool,
) -> Result<Strategy<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let wait = millis(ms)?;
    let debounced = Debounced::new(
        scheduler,
        wait,
        immediate,
        |(next, data, envelope): (Next<T, E>, T, E)| {
            if !next.call_if_live(data, envelope) {
                trace!("debounced message dropped, subscription disposed");
            }
        },
    );

    Ok(Strategy::new(StrategyKind::WithDebounce, move |next, data, envelope| {
        debounced.call((next.clone(), data, envelope));
    }))
}

/// Continue only when `predicate(data, envelope)` holds.
pub fn with_constraint<T, E, F>(predicate: F) -> Strategy<T, E>
where
    T: 'static,
    E: 'static,
    F: Fn(&T, &E) -> bool + Send + Sync + 'static,
{
    Strategy::new(StrategyKind::WithConstraint, move |next, data, envelope| {
        if predicate(&data, &envelope) {
            next.call(data, envelope);
        } else {
            trace!("constraint rejected message");
        }
    })
}

/// Continue only for data not seen before.
///
/// By default a value is compared with the previous one only; with
/// `options.all` it is compared with every value accepted so far.
pub fn distinct<T, E>(options: DistinctOptions) -> Strategy<T, E>
where
    T: PartialEq + Clone + Send + 'static,
    E: 'static,
{
    let engine: Box<dyn Predicate<T> + Send> = if options.all {
        Box::new(DistinctPredicate::<T>::new())
    } else {
        Box::new(ConsecutiveDistinctPredicate::<T>::new())
    };
    let engine = Mutex::new(engine);

    Strategy::new(StrategyKind::Distinct, move |next, data, envelope| {
        let fresh = engine.lock().check(&data);
        if fresh {
            next.call(data, envelope);
        } else {
            trace!(all = options.all, "repeated value dropped");
        }
    })
}
