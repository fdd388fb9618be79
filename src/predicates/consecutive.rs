//! Change detection against the immediately preceding value.

use super::Predicate;

/// Passes a value unless it equals the one seen just before it.
///
/// `previous` advances on every call, including calls that return false, so
/// `[1, 1, 2, 2, 2, 1]` yields `[true, false, true, false, false, true]`.
#[derive(Clone, Debug)]
pub struct ConsecutiveDistinctPredicate<V> {
    previous: Option<V>,
}

impl<V> ConsecutiveDistinctPredicate<V> {
    pub fn new() -> Self {
        Self { previous: None }
    }
}

impl<V> Default for ConsecutiveDistinctPredicate<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PartialEq + Clone> Predicate<V> for ConsecutiveDistinctPredicate<V> {
    fn check(&mut self, value: &V) -> bool {
        let changed = self.previous.as_ref() != Some(value);
        self.previous = Some(value.clone());
        changed
    }

    fn history_len(&self) -> usize {
        usize::from(self.previous.is_some())
    }
}
