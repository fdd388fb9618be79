//! Predicate engines for change and novelty detection.
//!
//! Each engine owns its history exclusively. A `distinct` strategy builds a
//! fresh engine when it is attached, so two subscriptions never observe each
//! other's values.

mod consecutive;
mod distinct;

pub use consecutive::ConsecutiveDistinctPredicate;
pub use distinct::DistinctPredicate;

/// A stateful classifier over a stream of values.
pub trait Predicate<V> {
    /// Returns true when `value` should pass, recording it as required.
    fn check(&mut self, value: &V) -> bool;

    /// Number of values currently retained.
    fn history_len(&self) -> usize;
}
