//! Subscription handle and its fluent strategy combinators.

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;
use crate::strategies::{factory, DistinctOptions, Strategy, StrategySpec};
use crate::types::Liveness;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{SubscriptionId, SubscriptionState};

type UnsubscribeHook = Box<dyn FnOnce(SubscriptionId) + Send>;

struct SubscriptionInner<T, E> {
    id: SubscriptionId,
    scheduler: Arc<dyn Scheduler>,
    liveness: Liveness,
    pipeline: Mutex<Pipeline<T, E>>,
    /// Detaches the subscription from whoever delivers to it.
    on_unsubscribe: Mutex<Option<UnsubscribeHook>>,
}

/// Handle to one subscriber's pipeline.
///
/// Clones share the same pipeline. Combinators attach a strategy and return
/// the handle so calls can be chained:
///
/// ```ignore
/// subscription
///     .with_constraint(|order: &Order, _| order.total > 100)
///     .distinct_until_changed()
///     .with_throttle(250.0)?
///     .dispose_after(10)?;
/// ```
pub struct Subscription<T, E> {
    inner: Arc<SubscriptionInner<T, E>>,
}

impl<T, E> Clone for Subscription<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("active", &self.inner.liveness.is_alive())
            .finish()
    }
}

impl<T, E> Subscription<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a detached subscription around `callback`.
    ///
    /// Nothing delivers to it until the caller (usually a
    /// [`SubscriptionManager`](super::SubscriptionManager)) calls `deliver`.
    pub fn new<F>(id: SubscriptionId, scheduler: Arc<dyn Scheduler>, callback: F) -> Self
    where
        F: Fn(T, E) + Send + Sync + 'static,
    {
        let liveness = Liveness::new();
        let pipeline = Pipeline::new(Arc::new(callback), liveness.clone());
        Self {
            inner: Arc::new(SubscriptionInner {
                id,
                scheduler,
                liveness,
                pipeline: Mutex::new(pipeline),
                on_unsubscribe: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn set_on_unsubscribe<F>(&self, hook: F)
    where
        F: FnOnce(SubscriptionId) + Send + 'static,
    {
        *self.inner.on_unsubscribe.lock() = Some(Box::new(hook));
    }

    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    pub fn state(&self) -> SubscriptionState {
        if self.inner.liveness.is_alive() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Disposed
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.liveness.is_alive()
    }

    /// Strategy names, outermost first.
    pub fn strategy_names(&self) -> Vec<String> {
        self.inner.pipeline.lock().names()
    }

    /// Append a strategy to the pipeline.
    ///
    /// Ignored once the subscription is disposed.
    pub fn attach(&self, strategy: Strategy<T, E>) -> &Self {
        if !self.is_active() {
            warn!(
                subscription = %self.inner.id,
                strategy = strategy.name(),
                "attach on disposed subscription ignored"
            );
            return self;
        }
        debug!(subscription = %self.inner.id, strategy = strategy.name(), "strategy attached");
        self.inner.pipeline.lock().attach(strategy);
        self
    }

    /// Run one message through the pipeline.
    ///
    /// No lock is held while strategies or the callback run, so they may
    /// attach to or unsubscribe this subscription.
    pub fn deliver(&self, data: T, envelope: E) {
        if !self.is_active() {
            return;
        }
        let entry = self.inner.pipeline.lock().entry();
        entry.call(data, envelope);
    }

    /// Dispose the subscription. Returns false if it was already disposed.
    pub fn unsubscribe(&self) -> bool {
        if !self.inner.liveness.kill() {
            return false;
        }
        self.inner.pipeline.lock().clear();

        let hook = self.inner.on_unsubscribe.lock().take();
        if let Some(hook) = hook {
            hook(self.inner.id);
        }
        debug!(subscription = %self.inner.id, "subscription disposed");
        true
    }

    /// An unsubscribe capability that does not keep the subscription alive.
    fn unsubscriber(&self) -> impl FnOnce() + Send + 'static {
        let weak = Arc::downgrade(&self.inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                Subscription { inner }.unsubscribe();
            }
        }
    }

    // --- Combinators ---

    /// Delay each delivery by `ms` milliseconds.
    pub fn with_delay(&self, ms: f64) -> Result<&Self> {
        let strategy = factory::with_delay(Arc::clone(&self.inner.scheduler), ms)?;
        Ok(self.attach(strategy))
    }

    /// Deliver on the scheduler's next turn instead of synchronously.
    pub fn defer(&self) -> &Self {
        self.attach(factory::defer(Arc::clone(&self.inner.scheduler)))
    }

    /// At most one delivery per `ms` milliseconds (leading edge).
    pub fn with_throttle(&self, ms: f64) -> Result<&Self> {
        let strategy = factory::with_throttle(Arc::clone(&self.inner.scheduler), ms)?;
        Ok(self.attach(strategy))
    }

    /// Collapse bursts of deliveries closer than `ms` milliseconds.
    pub fn with_debounce(&self, ms: f64, immediate: bool) -> Result<&Self> {
        let strategy = factory::with_debounce(Arc::clone(&self.inner.scheduler), ms, immediate)?;
        Ok(self.attach(strategy))
    }

    /// Only deliver messages for which `predicate` holds.
    pub fn with_constraint<F>(&self, predicate: F) -> &Self
    where
        F: Fn(&T, &E) -> bool + Send + Sync + 'static,
    {
        self.attach(factory::with_constraint(predicate))
    }

    /// Unsubscribe after `max_calls` messages have passed this point.
    pub fn dispose_after(&self, max_calls: u64) -> Result<&Self> {
        let strategy = factory::stop_after(max_calls, self.unsubscriber())?;
        Ok(self.attach(strategy))
    }

    /// Unsubscribe after the first message has passed this point.
    pub fn once(&self) -> &Self {
        self.dispose_after(1).unwrap_or(self)
    }
}

impl<T, E> Subscription<T, E>
where
    T: PartialEq + Clone + Send + 'static,
    E: Send + 'static,
{
    /// Only deliver data never delivered before.
    pub fn distinct(&self) -> &Self {
        self.attach(factory::distinct(DistinctOptions { all: true }))
    }

    /// Only deliver data that differs from the previous message's.
    pub fn distinct_until_changed(&self) -> &Self {
        self.attach(factory::distinct(DistinctOptions { all: false }))
    }

    /// Attach a strategy described as data.
    pub fn apply(&self, spec: &StrategySpec) -> Result<&Self> {
        let strategy = spec.build(&self.inner.scheduler, self.unsubscriber())?;
        Ok(self.attach(strategy))
    }

    /// Attach several strategies, outermost first.
    ///
    /// Every spec is built before any is attached, so an invalid entry
    /// leaves the pipeline untouched.
    pub fn apply_all(&self, specs: &[StrategySpec]) -> Result<&Self> {
        let strategies = specs
            .iter()
            .map(|spec| spec.build(&self.inner.scheduler, self.unsubscriber()))
            .collect::<Result<Vec<Strategy<T, E>>>>()?;
        for strategy in strategies {
            self.attach(strategy);
        }
        Ok(self)
    }
}
