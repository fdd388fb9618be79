//! Subscription manager for fanning messages out to pipelines.

use crate::scheduler::Scheduler;
use crate::types::Payload;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::subscription::Subscription;
use super::types::SubscriptionId;

type Registry<T, E> = RwLock<BTreeMap<SubscriptionId, Subscription<T, E>>>;

/// Owns subscriptions and delivers published messages to each of them.
///
/// There is no routing: every active subscription receives every message,
/// in subscription order.
pub struct SubscriptionManager<T, E> {
    /// Active subscriptions by ID.
    subscriptions: Arc<Registry<T, E>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Timer source handed to every subscription's strategies.
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Payload, E: Payload> SubscriptionManager<T, E> {
    /// Create a new subscription manager.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
            scheduler,
        }
    }

    /// Register `callback` and return its subscription handle.
    ///
    /// Unsubscribing through the handle, including from a `once` or
    /// `dispose_after` strategy, removes it from this manager.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<T, E>
    where
        F: Fn(T, E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let subscription = Subscription::new(id, Arc::clone(&self.scheduler), callback);

        let registry: Weak<Registry<T, E>> = Arc::downgrade(&self.subscriptions);
        subscription.set_on_unsubscribe(move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.write().remove(&id);
            }
        });

        self.subscriptions.write().insert(id, subscription.clone());
        debug!(subscription = %id, "subscribed");
        subscription
    }

    /// Unsubscribe and clean up. Returns false for unknown IDs.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let subscription = self.subscriptions.read().get(&id).cloned();
        match subscription {
            Some(subscription) => subscription.unsubscribe(),
            None => false,
        }
    }

    /// Unsubscribe everything.
    pub fn unsubscribe_all(&self) {
        for subscription in self.snapshot() {
            subscription.unsubscribe();
        }
    }

    /// Look up a subscription handle.
    pub fn get(&self, id: SubscriptionId) -> Option<Subscription<T, E>> {
        self.subscriptions.read().get(&id).cloned()
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver a message to every active subscription.
    ///
    /// Returns how many pipelines were entered. Timed strategies may still be
    /// holding the message when this returns.
    pub fn publish(&self, data: T, envelope: E) -> usize {
        let mut delivered = 0;
        for subscription in self.snapshot() {
            if subscription.is_active() {
                subscription.deliver(data.clone(), envelope.clone());
                delivered += 1;
            }
        }
        trace!(delivered, "published");
        delivered
    }

    /// Handles cloned out so no lock is held while pipelines run.
    fn snapshot(&self) -> Vec<Subscription<T, E>> {
        self.subscriptions.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::types::Envelope;
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(String, i32)>>>;

    fn recorder(label: &str, seen: &Seen) -> impl Fn(i32, Envelope) + Send + Sync + 'static {
        let label = label.to_string();
        let seen = Arc::clone(seen);
        move |d: i32, _: Envelope| seen.lock().push((label.clone(), d))
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager: SubscriptionManager<i32, Envelope> =
            SubscriptionManager::new(Arc::new(ManualScheduler::new()));

        let handle = manager.subscribe(|_, _| {});
        assert_eq!(manager.subscription_count(), 1);
        assert!(manager.get(handle.id()).is_some());

        assert!(manager.unsubscribe(handle.id()));
        assert_eq!(manager.subscription_count(), 0);
        assert!(!manager.unsubscribe(handle.id()));
        assert!(!handle.is_active());
    }

    #[test]
    fn test_publish_in_subscription_order() {
        let manager = SubscriptionManager::new(Arc::new(ManualScheduler::new()));
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        manager.subscribe(recorder("a", &seen));
        manager.subscribe(recorder("b", &seen));

        let delivered = manager.publish(5, Envelope::new("c", "t"));
        assert_eq!(delivered, 2);
        assert_eq!(
            *seen.lock(),
            vec![("a".to_string(), 5), ("b".to_string(), 5)]
        );
    }

    #[test]
    fn test_exhausted_subscription_leaves_registry() {
        let manager = SubscriptionManager::new(Arc::new(ManualScheduler::new()));
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        manager.subscribe(recorder("once", &seen)).once();
        manager.subscribe(recorder("all", &seen));

        manager.publish(1, Envelope::new("c", "t"));
        assert_eq!(manager.subscription_count(), 1);

        assert_eq!(manager.publish(2, Envelope::new("c", "t")), 1);
        assert_eq!(
            *seen.lock(),
            vec![
                ("once".to_string(), 1),
                ("all".to_string(), 1),
                ("all".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_unsubscribe_all() {
        let manager: SubscriptionManager<i32, Envelope> =
            SubscriptionManager::new(Arc::new(ManualScheduler::new()));
        let handles: Vec<_> = (0..3).map(|_| manager.subscribe(|_, _| {})).collect();

        manager.unsubscribe_all();
        assert_eq!(manager.subscription_count(), 0);
        assert!(handles.iter().all(|h| !h.is_active()));
    }
}
