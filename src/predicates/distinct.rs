//! Novelty detection against every value accepted so far.

use super::Predicate;

/// Passes a value only the first time an equal value is seen.
///
/// History is never pruned; it lives as long as the owning strategy.
#[derive(Clone, Debug)]
pub struct DistinctPredicate<V> {
    previous: Vec<V>,
}

impl<V> DistinctPredicate<V> {
    pub fn new() -> Self {
        Self {
            previous: Vec::new(),
        }
    }
}

impl<V> Default for DistinctPredicate<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PartialEq + Clone> Predicate<V> for DistinctPredicate<V> {
    fn check(&mut self, value: &V) -> bool {
        let is_distinct = !self.previous.iter().any(|p| p == value);
        if is_distinct {
            self.previous.push(value.clone());
        }
        is_distinct
    }

    fn history_len(&self) -> usize {
        self.previous.len()
    }
}
