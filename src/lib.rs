//! # Subscription Pipelines
//!
//! Composable, stateful delivery strategies placed between a pub/sub bus and
//! a subscriber's callback.
//!
//! ## Core Concepts
//!
//! - **Strategies**: Continuation-passing wrappers deciding whether and when a
//!   message moves on (delay, throttle, debounce, filter, dedupe, auto-dispose)
//! - **Pipelines**: Strategies composed in attachment order, first attached
//!   outermost, ending at the callback
//! - **Predicates**: Per-strategy history for change and novelty detection
//! - **Schedulers**: The timer collaborator behind every asynchronous strategy
//!
//! ## Example
//!
//! ```ignore
//! use subpipe::{Envelope, ManualScheduler, SubscriptionManager};
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let manager = SubscriptionManager::new(scheduler.clone());
//!
//! let sub = manager.subscribe(|n: u32, _env: Envelope| println!("got {n}"));
//! sub.with_constraint(|n, _| n % 2 == 1)
//!     .distinct()
//!     .dispose_after(3)?;
//!
//! for n in 1..=10 {
//!     manager.publish(n, Envelope::new("numbers", "odd"));
//! }
//! ```

pub mod error;
pub mod pipeline;
pub mod predicates;
pub mod scheduler;
pub mod strategies;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, StrategyError};
pub use pipeline::Pipeline;
pub use predicates::{ConsecutiveDistinctPredicate, DistinctPredicate, Predicate};
pub use scheduler::{
    Debounced, EventLoop, EventLoopConfig, EventLoopHandle, ManualScheduler, Scheduler, Task,
    Throttled,
};
pub use strategies::{Callback, DistinctOptions, Next, Strategy, StrategyKind, StrategySpec};
pub use subscriptions::{Subscription, SubscriptionId, SubscriptionManager, SubscriptionState};
pub use types::*;
