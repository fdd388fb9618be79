//! Integration tests for subscription pipelines.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subpipe::{
    Envelope, ManualScheduler, Strategy, StrategySpec, Subscription, SubscriptionId,
    SubscriptionManager, SubscriptionState,
};

type Seen<T> = Arc<Mutex<Vec<T>>>;

fn manager() -> (Arc<ManualScheduler>, SubscriptionManager<i64, Envelope>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let manager = SubscriptionManager::new(scheduler.clone());
    (scheduler, manager)
}

fn env() -> Envelope {
    Envelope::new("tests", "numbers")
}

fn collect(seen: &Seen<i64>) -> impl Fn(i64, Envelope) + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |d: i64, _: Envelope| seen.lock().push(d)
}

// --- Lifecycle ---

#[test]
fn test_once_delivers_a_single_message() {
    let (_, manager) = manager();
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let sub = manager.subscribe(collect(&seen));
    sub.once();

    manager.publish(1, env());
    manager.publish(2, env());

    assert_eq!(*seen.lock(), vec![1]);
    assert_eq!(sub.state(), SubscriptionState::Disposed);
    assert_eq!(manager.subscription_count(), 0);
}

#[test]
fn test_dispose_after_three() {
    let scheduler = Arc::new(ManualScheduler::new());
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let unsubscribes = Arc::new(AtomicUsize::new(0));

    let out = Arc::clone(&seen);
    let sub = Subscription::new(SubscriptionId(1), scheduler.clone(), move |d: i64, _: ()| {
        out.lock().push(d)
    });

    // Count the unsubscribe capability directly, bypassing the handle's guard.
    let counter = Arc::clone(&unsubscribes);
    let handle = sub.clone();
    sub.attach(
        subpipe::strategies::stop_after(3, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            handle.unsubscribe();
        })
        .unwrap(),
    );

    for n in 1..=6 {
        sub.deliver(n, ());
    }

    assert_eq!(*seen.lock(), vec![1, 2, 3]);
    assert_eq!(unsubscribes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_external_unsubscribe_stops_delivery() {
    let (_, manager) = manager();
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let sub = manager.subscribe(collect(&seen));

    manager.publish(1, env());
    assert!(manager.unsubscribe(sub.id()));
    manager.publish(2, env());
    sub.deliver(3, env());

    assert_eq!(*seen.lock(), vec![1]);
}

// --- Filtering ---

#[test]
fn test_constraint_keeps_odd_numbers_in_order() {
    let (_, manager) = manager();
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    manager
        .subscribe(collect(&seen))
        .with_constraint(|n, _| n % 2 != 0);

    for n in 1..=5 {
        manager.publish(n, env());
    }

    assert_eq!(*seen.lock(), vec![1, 3, 5]);
}

#[test]
fn test_constraint_sees_envelope() {
    let (_, manager) = manager();
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    manager
        .subscribe(collect(&seen))
        .with_constraint(|_, env: &Envelope| env.topic == "wanted");

    manager.publish(1, Envelope::new("c", "ignored"));
    manager.publish(2, Envelope::new("c", "wanted"));

    assert_eq!(*seen.lock(), vec![2]);
}

#[test]
fn test_distinct_until_changed_vs_distinct() {
    let (_, manager) = manager();
    let changed: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let novel: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    manager.subscribe(collect(&changed)).distinct_until_changed();
    manager.subscribe(collect(&novel)).distinct();

    for n in [1, 1, 2, 2, 2, 1, 3, 1] {
        manager.publish(n, env());
    }

    assert_eq!(*changed.lock(), vec![1, 2, 1, 3, 1]);
    assert_eq!(*novel.lock(), vec![1, 2, 3]);
}

#[test]
fn test_distinct_compares_json_structurally() {
    let scheduler = Arc::new(ManualScheduler::new());
    let manager: SubscriptionManager<serde_json::Value, Envelope> =
        SubscriptionManager::new(scheduler);
    let seen: Seen<serde_json::Value> = Arc::new(Mutex::new(Vec::new()));
    let out = Arc::clone(&seen);
    manager.subscribe(move |v, _| out.lock().push(v)).distinct();

    manager.publish(json!({"user": "ada", "roles": ["admin"]}), env());
    manager.publish(json!({"roles": ["admin"], "user": "ada"}), env());
    manager.publish(json!({"user": "ada", "roles": []}), env());

    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_subscriptions_do_not_share_history() {
    let (_, manager) = manager();
    let first: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let second: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    manager.subscribe(collect(&first)).distinct();

    manager.publish(1, env());
    manager.subscribe(collect(&second)).distinct();
    manager.publish(1, env());

    assert_eq!(*first.lock(), vec![1]);
    assert_eq!(*second.lock(), vec![1]);
}

// --- Composition ---

#[test]
fn test_no_strategies_matches_direct_call() {
    let (_, manager) = manager();
    let direct: Seen<(i64, String)> = Arc::new(Mutex::new(Vec::new()));
    let piped: Seen<(i64, String)> = Arc::new(Mutex::new(Vec::new()));

    let direct_out = Arc::clone(&direct);
    let callback = move |d: i64, e: Envelope| direct_out.lock().push((d, e.topic));
    let piped_out = Arc::clone(&piped);
    manager.subscribe(move |d: i64, e: Envelope| piped_out.lock().push((d, e.topic)));

    for n in [3, -1, 3] {
        let envelope = env();
        callback(n, envelope.clone());
        manager.publish(n, envelope);
    }

    assert_eq!(*direct.lock(), *piped.lock());
}

#[test]
fn test_order_of_attachment_matters() {
    let (_, manager) = manager();
    let limit_first: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let filter_first: Seen<i64> = Arc::new(Mutex::new(Vec::new()));

    // Counts every message, odd or not.
    manager
        .subscribe(collect(&limit_first))
        .dispose_after(2)
        .unwrap()
        .with_constraint(|n, _| n % 2 != 0);

    // Counts only messages that passed the filter.
    manager
        .subscribe(collect(&filter_first))
        .with_constraint(|n, _| n % 2 != 0)
        .dispose_after(2)
        .unwrap();

    for n in 1..=6 {
        manager.publish(n, env());
    }

    assert_eq!(*limit_first.lock(), vec![1]);
    assert_eq!(*filter_first.lock(), vec![1, 3]);
}

#[test]
fn test_custom_strategy_composes_with_builtins() {
    let (_, manager) = manager();
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let sub = manager.subscribe(collect(&seen));

    // Doubles every value; the distinct stage downstream sees doubled values.
    sub.attach(Strategy::custom("double", |next, data: i64, envelope| {
        next.call(data * 2, envelope)
    }))
    .distinct();

    for n in [1, 2, 1, 3] {
        manager.publish(n, env());
    }

    assert_eq!(*seen.lock(), vec![2, 4, 6]);
    assert_eq!(sub.strategy_names(), vec!["double", "distinct"]);
}

#[test]
fn test_apply_specs_from_json() {
    let (scheduler, manager) = manager();
    let seen: Seen<i64> = Arc::new(Mutex::new(Vec::new()));
    let specs = StrategySpec::parse_list(
        r#"[
            {"strategy": "distinctUntilChanged"},
            {"strategy": "withDelay", "ms": 10},
            {"strategy": "disposeAfter", "maxCalls": 2}
        ]"#,
    )
    .unwrap();
    let sub = manager.subscribe(collect(&seen));
    sub.apply_all(&specs).unwrap();

    for n in [5, 5, 6, 7] {
        manager.publish(n, env());
    }
    assert!(seen.lock().is_empty());

    scheduler.advance(Duration::from_millis(10));
    assert_eq!(*seen.lock(), vec![5, 6]);
    assert!(!sub.is_active());
}

#[test]
fn test_apply_all_is_all_or_nothing() {
    let (_, manager) = manager();
    let sub = manager.subscribe(|_, _| {});
    let specs = vec![
        StrategySpec::Once,
        StrategySpec::WithThrottle { ms: f64::NAN },
    ];

    assert!(sub.apply_all(&specs).is_err());
    assert!(sub.strategy_names().is_empty());
}
