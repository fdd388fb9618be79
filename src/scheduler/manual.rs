//! Virtual-clock scheduler.

use super::{Scheduler, Task};
use crate::types::TimerId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

struct ManualState {
    now: Duration,
    next_id: u64,
    /// Pending tasks ordered by deadline, then by registration.
    queue: BTreeMap<(Duration, TimerId), Task>,
    /// Deadline lookup for cancellation.
    due: HashMap<TimerId, Duration>,
}

/// A scheduler whose clock only moves when told to.
///
/// Tasks run on the thread that calls [`advance`](Self::advance) or
/// [`run_until_idle`](Self::run_until_idle), never while the internal lock is
/// held, so a task may schedule or cancel further tasks.
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Create a scheduler with its clock at zero.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                next_id: 1,
                queue: BTreeMap::new(),
                due: HashMap::new(),
            }),
        }
    }

    /// Move the clock forward by `by`, running every task that comes due.
    ///
    /// Each task observes `now()` equal to its own deadline. Returns the
    /// number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut ran = 0;

        while let Some(task) = self.pop_due(Some(target)) {
            task();
            ran += 1;
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
        ran
    }

    /// Run tasks until none remain, moving the clock to each deadline.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(None) {
            task();
            ran += 1;
        }
        ran
    }

    /// Number of tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<Task> {
        let mut state = self.state.lock();
        let key = *state.queue.keys().next()?;
        if matches!(limit, Some(limit) if key.0 > limit) {
            return None;
        }

        let task = state.queue.remove(&key)?;
        state.due.remove(&key.1);
        if state.now < key.0 {
            state.now = key.0;
        }
        Some(task)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn schedule_once(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = self.state.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;

        let deadline = state.now + delay;
        state.queue.insert((deadline, id), task);
        state.due.insert(id, deadline);
        id
    }

    fn cancel(&self, id: TimerId) {
        let mut state = self.state.lock();
        if let Some(deadline) = state.due.remove(&id) {
            state.queue.remove(&(deadline, id));
        }
    }
}
