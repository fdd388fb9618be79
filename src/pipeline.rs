//! Composition of strategy units around a subscriber callback.
//!
//! The first strategy attached is the outermost stage: it sees each message
//! first, and the callback is the innermost link. The composed chain is
//! derived lazily and cached until the next `attach`.

use crate::strategies::{Callback, Link, Next, Strategy};
use crate::types::Liveness;
use std::sync::Arc;
use tracing::debug;

/// Ordered strategies terminating at one callback.
pub struct Pipeline<T, E> {
    strategies: Vec<Strategy<T, E>>,
    callback: Callback<T, E>,
    liveness: Liveness,
    /// Cached entry point; None when stale.
    composed: Option<Next<T, E>>,
}

impl<T: 'static, E: 'static> Pipeline<T, E> {
    pub fn new(callback: Callback<T, E>, liveness: Liveness) -> Self {
        Self {
            strategies: Vec::new(),
            callback,
            liveness,
            composed: None,
        }
    }

    /// Append a strategy as the innermost stage so far.
    pub fn attach(&mut self, strategy: Strategy<T, E>) {
        self.strategies.push(strategy);
        self.composed = None;
    }

    /// Entry point the bus should call, composing it first if stale.
    pub fn entry(&mut self) -> Next<T, E> {
        if let Some(entry) = &self.composed {
            return entry.clone();
        }
        let entry = self.compose();
        self.composed = Some(entry.clone());
        entry
    }

    /// Deliver one message through the chain, if the pipeline is still live.
    pub fn invoke(&mut self, data: T, envelope: E) {
        if !self.liveness.is_alive() {
            return;
        }
        self.entry().call(data, envelope);
    }

    /// Drop every strategy, and with them all timers' and predicates' state.
    pub fn clear(&mut self) {
        self.strategies.clear();
        self.composed = None;
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy names, outermost first.
    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    fn compose(&self) -> Next<T, E> {
        debug!(stages = self.strategies.len(), "composing pipeline");

        let terminal = Next::new(Arc::clone(&self.callback), self.liveness.clone());
        self.strategies.iter().rev().fold(terminal, |inner, strategy| {
            let strategy = strategy.clone();
            let stage: Link<T, E> = Arc::new(move |data: T, envelope: E, admitted: bool| {
                if admitted {
                    strategy.invoke(&inner.admitted(), data, envelope);
                } else {
                    strategy.invoke(&inner, data, envelope);
                }
            });
            Next::from_link(stage, self.liveness.clone())
        })
    }
}
