//! Core types shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Bound for message data and envelopes carried through a pipeline.
///
/// Values move into timer tasks that may run on another thread, and the
/// manager hands one copy to each subscriber.
pub trait Payload: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Payload for T {}

/// Handle to a task registered with a scheduler.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerId({})", self.0)
    }
}

/// Wall-clock timestamp (microseconds since Unix epoch).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Default message metadata.
///
/// Strategies never look inside an envelope; any `Payload` type can be used
/// in its place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub topic: String,
    pub timestamp: Timestamp,
}

impl Envelope {
    pub fn new(channel: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Shared active/disposed flag for one subscription.
///
/// Starts alive; `kill` flips it exactly once. A subscription disposed by its
/// own call limit is additionally marked retired, which lets messages the
/// limit already admitted finish their way through timed stages.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<LivenessFlags>);

#[derive(Debug)]
struct LivenessFlags {
    alive: AtomicBool,
    retired: AtomicBool,
}

impl Liveness {
    pub fn new() -> Self {
        Liveness(Arc::new(LivenessFlags {
            alive: AtomicBool::new(true),
            retired: AtomicBool::new(false),
        }))
    }

    pub fn is_alive(&self) -> bool {
        self.0.alive.load(Ordering::Acquire)
    }

    /// Mark as disposed. Returns true only for the call that made the transition.
    pub fn kill(&self) -> bool {
        self.0
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record that a call limit, not the caller, ended the subscription.
    pub fn retire(&self) {
        self.0.retired.store(true, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.0.retired.load(Ordering::Acquire)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
