//! Timer collaborators that drive asynchronous strategies.
//!
//! Strategies never sleep or spawn on their own. They hand thunks to a
//! [`Scheduler`], which decides when and on which thread to run them:
//! - [`ManualScheduler`]: virtual clock advanced explicitly (tests, host loops)
//! - [`EventLoop`]: a single background thread firing tasks in deadline order
//!
//! [`Throttled`] and [`Debounced`] build the rate-limiting primitives on top
//! of any scheduler.

mod event_loop;
mod manual;
mod timing;

pub use event_loop::{EventLoop, EventLoopConfig, EventLoopHandle};
pub use manual::ManualScheduler;
pub use timing::{Debounced, Throttled};

use crate::types::TimerId;
use std::time::Duration;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of time and one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Time elapsed since the scheduler's epoch.
    fn now(&self) -> Duration;

    /// Run `task` once, no earlier than `delay` from now.
    ///
    /// Always returns to the caller before `task` runs, even for a zero delay.
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerId;

    /// Forget a scheduled task. Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}
