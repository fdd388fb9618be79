//! Strategy units: composable wrappers around message delivery.
//!
//! A strategy receives every message together with `next`, the rest of the
//! pipeline, and decides whether, when, and how often to call it. The
//! [`factory`] functions build the stock strategies; [`StrategySpec`] is the
//! declarative form used by configuration.

pub mod factory;
mod spec;

pub use factory::{
    defer, distinct, stop_after, with_constraint, with_debounce, with_delay, with_throttle,
    DistinctOptions,
};
pub use spec::StrategySpec;

use crate::types::Liveness;
use std::fmt;
use std::sync::Arc;

/// A subscriber callback, or any stage of a composed pipeline.
pub type Callback<T, E> = Arc<dyn Fn(T, E) + Send + Sync>;

type StrategyFn<T, E> = dyn Fn(&Next<T, E>, T, E) + Send + Sync;

/// Diagnostic tag for a strategy unit. Never used for dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    WithDelay,
    StopAfter,
    WithThrottle,
    WithDebounce,
    WithConstraint,
    Distinct,
    Custom(String),
}

impl StrategyKind {
    pub fn name(&self) -> &str {
        match self {
            StrategyKind::WithDelay => "withDelay",
            StrategyKind::StopAfter => "stopAfter",
            StrategyKind::WithThrottle => "withThrottle",
            StrategyKind::WithDebounce => "withDebounce",
            StrategyKind::WithConstraint => "withConstraint",
            StrategyKind::Distinct => "distinct",
            StrategyKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inner form of a pipeline stage: the message plus whether a call limit
/// admitted it.
pub(crate) type Link<T, E> = Arc<dyn Fn(T, E, bool) + Send + Sync>;

/// Continuation handed to a strategy: the remainder of the pipeline.
///
/// Cheap to clone. Strategies that resume from a timer must go through
/// [`call_if_live`](Self::call_if_live) so a disposed subscription stays
/// silent.
pub struct Next<T, E> {
    link: Link<T, E>,
    liveness: Liveness,
    /// Set on messages a call limit let through before it ended the
    /// subscription.
    admitted: bool,
}

impl<T: 'static, E: 'static> Next<T, E> {
    pub(crate) fn new(f: Callback<T, E>, liveness: Liveness) -> Self {
        let link: Link<T, E> = Arc::new(move |data: T, envelope: E, _admitted: bool| {
            f(data, envelope)
        });
        Self::from_link(link, liveness)
    }
}

impl<T, E> Next<T, E> {
    pub(crate) fn from_link(link: Link<T, E>, liveness: Liveness) -> Self {
        Self {
            link,
            liveness,
            admitted: false,
        }
    }

    /// Continue the pipeline.
    pub fn call(&self, data: T, envelope: E) {
        (self.link)(data, envelope, self.admitted)
    }

    /// Continue the pipeline unless the subscription was disposed meanwhile.
    ///
    /// A message admitted by a call limit still continues when that limit is
    /// what disposed the subscription.
    pub fn call_if_live(&self, data: T, envelope: E) -> bool {
        let admitted = self.admitted && self.liveness.is_retired();
        if !admitted && !self.liveness.is_alive() {
            return false;
        }
        self.call(data, envelope);
        true
    }

    pub fn is_live(&self) -> bool {
        self.liveness.is_alive()
    }

    pub fn is_admitted(&self) -> bool {
        self.admitted
    }

    /// This continuation, carrying the admitted mark.
    pub(crate) fn admitted(&self) -> Self {
        Self {
            admitted: true,
            ..self.clone()
        }
    }

    pub(crate) fn liveness(&self) -> &Liveness {
        &self.liveness
    }
}

impl<T, E> Clone for Next<T, E> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            liveness: self.liveness.clone(),
            admitted: self.admitted,
        }
    }
}

/// A named middleware unit.
///
/// Created once per attachment; any state its function captures lives as
/// long as the subscription it is attached to.
pub struct Strategy<T, E> {
    kind: StrategyKind,
    func: Arc<StrategyFn<T, E>>,
}

impl<T, E> Strategy<T, E> {
    pub fn new<F>(kind: StrategyKind, func: F) -> Self
    where
        F: Fn(&Next<T, E>, T, E) + Send + Sync + 'static,
    {
        Self {
            kind,
            func: Arc::new(func),
        }
    }

    /// A caller-authored strategy.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Next<T, E>, T, E) + Send + Sync + 'static,
    {
        Self::new(StrategyKind::Custom(name.into()), func)
    }

    pub fn kind(&self) -> &StrategyKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Run this stage for one message.
    pub fn invoke(&self, next: &Next<T, E>, data: T, envelope: E) {
        (self.func)(next, data, envelope)
    }
}

impl<T, E> Clone for Strategy<T, E> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T, E> fmt::Debug for Strategy<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name()).finish()
    }
}
