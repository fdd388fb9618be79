//! Subscriptions: a callback plus the strategy pipeline in front of it.
//!
//! A [`Subscription`] is the handle user code configures:
//! - Timing: `with_delay`, `defer`, `with_throttle`, `with_debounce`
//! - Filtering: `with_constraint`, `distinct`, `distinct_until_changed`
//! - Lifecycle: `once`, `dispose_after`, `unsubscribe`
//!
//! The [`SubscriptionManager`] plays the bus: it hands out subscriptions and
//! delivers each published message to all of them.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = Arc::new(ManualScheduler::new());
//! let manager = SubscriptionManager::new(scheduler.clone());
//!
//! manager
//!     .subscribe(|price: f64, env: Envelope| println!("{}: {price}", env.topic))
//!     .distinct_until_changed()
//!     .with_throttle(100.0)?;
//!
//! manager.publish(10.0, Envelope::new("quotes", "ACME"));
//! ```

mod manager;
mod subscription;
mod types;

pub use manager::SubscriptionManager;
pub use subscription::Subscription;
pub use types::{SubscriptionId, SubscriptionState};
