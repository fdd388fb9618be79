//! Real-time scheduler backed by a single worker thread.

use super::{Scheduler, Task};
use crate::error::{Result, StrategyError};
use crate::types::TimerId;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Event loop configuration.
#[derive(Clone, Debug)]
pub struct EventLoopConfig {
    /// Name of the worker thread.
    pub thread_name: String,

    /// Bound on queued commands (None = unbounded).
    pub command_capacity: Option<usize>,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            thread_name: "subpipe-event-loop".to_string(),
            command_capacity: None,
        }
    }
}

enum Command {
    Schedule { id: TimerId, due: Instant, task: Task },
    Cancel(TimerId),
    Shutdown,
}

/// State shared between handles and the worker.
struct Shared {
    next_id: AtomicU64,
    worker: OnceLock<ThreadId>,
    /// Commands issued by tasks running on the worker itself. These never go
    /// through the channel, which only the worker drains.
    local: Mutex<Vec<Command>>,
}

/// Cloneable scheduling handle onto a running [`EventLoop`].
#[derive(Clone)]
pub struct EventLoopHandle {
    sender: Sender<Command>,
    epoch: Instant,
    shared: Arc<Shared>,
}

impl EventLoopHandle {
    /// Schedule a task, failing if the loop has stopped.
    pub fn try_schedule(&self, delay: Duration, task: Task) -> Result<TimerId> {
        let id = self.allocate_id();
        let due = Instant::now() + delay;
        self.send(Command::Schedule { id, due, task })?;
        Ok(id)
    }

    fn allocate_id(&self) -> TimerId {
        TimerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn on_worker(&self) -> bool {
        self.shared.worker.get() == Some(&thread::current().id())
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.on_worker() {
            self.shared.local.lock().push(command);
            return Ok(());
        }
        self.sender
            .send(command)
            .map_err(|_| StrategyError::SchedulerClosed)
    }
}

impl Scheduler for EventLoopHandle {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn schedule_once(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.allocate_id();
        let due = Instant::now() + delay;
        if let Err(e) = self.send(Command::Schedule { id, due, task }) {
            warn!(timer = ?id, error = %e, "dropping task");
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        let _ = self.send(Command::Cancel(id));
    }
}

/// Owns the worker thread. Dropping the loop shuts it down.
///
/// All tasks run on the one worker thread, in deadline order, FIFO among
/// equal deadlines. With a bounded `command_capacity`, callers on other
/// threads block while the queue is full; tasks on the worker never do.
pub struct EventLoop {
    handle: EventLoopHandle,
    worker: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Start an event loop with default configuration.
    pub fn start() -> Result<Self> {
        Self::with_config(EventLoopConfig::default())
    }

    /// Start an event loop.
    pub fn with_config(config: EventLoopConfig) -> Result<Self> {
        let (sender, receiver) = match config.command_capacity {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };
        let shared = Arc::new(Shared {
            next_id: AtomicU64::new(1),
            worker: OnceLock::new(),
            local: Mutex::new(Vec::new()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_loop(receiver, worker_shared))?;
        let _ = shared.worker.set(worker.thread().id());

        debug!(thread = %config.thread_name, "event loop started");

        Ok(Self {
            handle: EventLoopHandle {
                sender,
                epoch: Instant::now(),
                shared,
            },
            worker: Some(worker),
        })
    }

    /// A handle usable wherever a scheduler is expected.
    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    /// Stop the worker, discarding tasks that have not fired yet.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.send(Command::Shutdown);
            // A task that drops the loop would otherwise join itself.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct Timers {
    deadlines: BinaryHeap<Reverse<(Instant, TimerId)>>,
    tasks: HashMap<TimerId, Task>,
}

impl Timers {
    /// Apply one command. Returns false on shutdown.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Schedule { id, due, task } => {
                self.deadlines.push(Reverse((due, id)));
                self.tasks.insert(id, task);
            }
            Command::Cancel(id) => {
                self.tasks.remove(&id);
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Earliest deadline of a task that is still scheduled.
    fn next_due(&mut self) -> Option<Instant> {
        // Cancelled timers leave their heap entry behind; drop them here.
        while let Some(Reverse((due, id))) = self.deadlines.peek().copied() {
            if self.tasks.contains_key(&id) {
                return Some(due);
            }
            self.deadlines.pop();
        }
        None
    }

    fn pop_due(&mut self, now: Instant) -> Option<Task> {
        loop {
            let due = self.next_due()?;
            if due > now {
                return None;
            }
            let Reverse((_, id)) = self.deadlines.pop()?;
            if let Some(task) = self.tasks.remove(&id) {
                return Some(task);
            }
        }
    }
}

fn run_loop(receiver: Receiver<Command>, shared: Arc<Shared>) {
    let mut timers = Timers::default();

    'outer: loop {
        // Fire everything that is due.
        let now = Instant::now();
        while let Some(task) = timers.pop_due(now) {
            task();
            let local = std::mem::take(&mut *shared.local.lock());
            for command in local {
                if !timers.apply(command) {
                    break 'outer;
                }
            }
        }

        let command = match timers.next_due() {
            Some(due) => {
                let wait = due.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(wait) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        if !timers.apply(command) {
            break;
        }
    }

    if !timers.tasks.is_empty() {
        warn!(pending = timers.tasks.len(), "event loop stopped with pending timers");
    }
    debug!("event loop stopped");
}
