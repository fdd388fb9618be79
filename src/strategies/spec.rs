//! Declarative strategy descriptions.

use super::factory::{self, DistinctOptions};
use super::Strategy;
use crate::error::{Result, StrategyError};
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A strategy described as data, e.g. `{"strategy": "withDelay", "ms": 50}`.
///
/// Parsing only checks shape. Values are validated by the same factories the
/// fluent API uses, when [`build`](Self::build) runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum StrategySpec {
    WithDelay {
        ms: f64,
    },
    Defer,
    WithThrottle {
        ms: f64,
    },
    WithDebounce {
        ms: f64,
        #[serde(default)]
        immediate: bool,
    },
    Distinct {
        #[serde(default)]
        all: bool,
    },
    DistinctUntilChanged,
    Once,
    DisposeAfter {
        #[serde(rename = "maxCalls")]
        max_calls: i64,
    },
}

impl StrategySpec {
    /// Parse a single spec from JSON.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a JSON array of specs, outermost first.
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Diagnostic name of the strategy this spec builds.
    pub fn name(&self) -> &'static str {
        match self {
            StrategySpec::WithDelay { .. } | StrategySpec::Defer => "withDelay",
            StrategySpec::WithThrottle { .. } => "withThrottle",
            StrategySpec::WithDebounce { .. } => "withDebounce",
            StrategySpec::Distinct { .. } | StrategySpec::DistinctUntilChanged => "distinct",
            StrategySpec::Once | StrategySpec::DisposeAfter { .. } => "stopAfter",
        }
    }

    /// Build the strategy unit.
    ///
    /// `unsubscribe` is only called by `once` and `disposeAfter` units.
    pub fn build<T, E, F>(
        &self,
        scheduler: &Arc<dyn Scheduler>,
        unsubscribe: F,
    ) -> Result<Strategy<T, E>>
    where
        T: PartialEq + Clone + Send + 'static,
        E: Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let scheduler = Arc::clone(scheduler);
        match *self {
            StrategySpec::WithDelay { ms } => factory::with_delay(scheduler, ms),
            StrategySpec::Defer => Ok(factory::defer(scheduler)),
            StrategySpec::WithThrottle { ms } => factory::with_throttle(scheduler, ms),
            StrategySpec::WithDebounce { ms, immediate } => {
                factory::with_debounce(scheduler, ms, immediate)
            }
            StrategySpec::Distinct { all } => Ok(factory::distinct(DistinctOptions { all })),
            StrategySpec::DistinctUntilChanged => {
                Ok(factory::distinct(DistinctOptions { all: false }))
            }
            StrategySpec::Once => factory::stop_after(1, unsubscribe),
            StrategySpec::DisposeAfter { max_calls } => {
                let max_calls = u64::try_from(max_calls)
                    .map_err(|_| StrategyError::InvalidMaxCalls(max_calls.to_string()))?;
                factory::stop_after(max_calls, unsubscribe)
            }
        }
    }
}
