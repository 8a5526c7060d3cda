use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use tracewire::context::active_context;
use tracewire::scheduler::{EventEmitter, EventSource, Scheduler, TokioScheduler};
use tracewire::Agent;

const UNITS: u64 = 10;

#[tokio::test]
async fn test_ten_units_keep_their_own_context() {
    let agent = Agent::default();
    let scheduler = Arc::new(agent.bind_scheduler(TokioScheduler::current().unwrap()));
    let emitter = agent.bind_emitter(EventEmitter::new());
    let completed = Arc::new(AtomicUsize::new(0));
    let (registered_tx, mut registered_rx) = mpsc::unbounded_channel::<()>();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<(Uuid, Option<Uuid>)>();

    let start = {
        let scheduler = scheduler.clone();
        let emitter = emitter.clone();
        let completed = completed.clone();
        agent.tracer().create_scoped_execution(move |n: u64| {
            let own = active_context().map(|c| c.id()).expect("unit has a context");
            let timers = scheduler.clone();
            let emitter = emitter.clone();
            let completed = completed.clone();
            let registered_tx = registered_tx.clone();
            let seen_tx = seen_tx.clone();

            // deferred callback -> timer -> event subscription
            scheduler.defer(Box::new(move || {
                // Later units get shorter delays so timers fire in reverse order.
                let delay = Duration::from_millis((UNITS - n) * 3);
                timers.set_timeout(
                    delay,
                    Box::new(move || {
                        emitter.on(
                            "flush",
                            Arc::new(move |_payload: &Value| {
                                let seen = active_context().map(|c| c.id());
                                completed.fetch_add(1, Ordering::SeqCst);
                                let _ = seen_tx.send((own, seen));
                            }),
                        );
                        let _ = registered_tx.send(());
                    }),
                );
            }));
            own
        })
    };

    // 1. Start all units back to back
    let mut ids = Vec::new();
    for n in 0..UNITS {
        ids.push(start(n));
    }
    assert!(active_context().is_none());

    // 2. Wait until every unit has subscribed
    for _ in 0..UNITS {
        registered_rx.recv().await.unwrap();
    }

    // 3. Fire from outside any context
    let fired = emitter.emit("flush", &json!({}));
    assert_eq!(fired, UNITS as usize);

    // 4. Every listener saw exactly its own unit
    let mut observed = Vec::new();
    for _ in 0..UNITS {
        let (own, seen) = seen_rx.recv().await.unwrap();
        assert_eq!(seen, Some(own), "listener ran under a foreign context");
        observed.push(own);
    }
    observed.sort();
    ids.sort();
    assert_eq!(observed, ids);
    assert_eq!(completed.load(Ordering::SeqCst), UNITS as usize);
}

#[tokio::test]
async fn test_subscription_fires_many_times_with_same_context() {
    let agent = Agent::default();
    let emitter = agent.bind_emitter(EventEmitter::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let captured = agent.tracer().in_new_context(|| {
        let tx = tx.clone();
        emitter.on(
            "tick",
            Arc::new(move |payload: &Value| {
                let _ = tx.send((payload.clone(), active_context()));
            }),
        );
        active_context().unwrap()
    });

    let other = agent.tracer().create_context();
    emitter.emit("tick", &json!(1));
    tracewire::context::run_in(Some(other), || emitter.emit("tick", &json!(2)));
    emitter.emit("tick", &json!(3));

    for expected in 1..=3 {
        let (payload, ctx) = rx.recv().await.unwrap();
        assert_eq!(payload, json!(expected), "arguments pass through untouched");
        assert_eq!(ctx, Some(captured.clone()));
    }
}

#[tokio::test]
async fn test_unsubscribed_listener_stops_firing() {
    let agent = Agent::default();
    let emitter = agent.bind_emitter(EventEmitter::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let id = emitter.on(
        "evt",
        Arc::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(emitter.emit("evt", &Value::Null), 1);
    assert!(emitter.off("evt", id));
    assert!(!emitter.off("evt", id));
    assert_eq!(emitter.emit("evt", &Value::Null), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(emitter.inner().listener_count("evt"), 0);
}

#[tokio::test]
async fn test_cancelled_timeout_never_fires() {
    let agent = Agent::default();
    let scheduler = agent.bind_scheduler(TokioScheduler::current().unwrap());
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = fired.clone();
    let handle = agent.tracer().in_new_context(|| {
        scheduler.set_timeout(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
    });
    handle.cancel();
    assert!(handle.is_cancelled());

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_interval_keeps_context_and_stops_on_cancel() {
    let agent = Agent::default();
    let scheduler = agent.bind_scheduler(TokioScheduler::current().unwrap());
    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let counter = fired.clone();
    let (handle, captured) = agent.tracer().in_new_context(|| {
        let handle = scheduler.set_interval(
            Duration::from_millis(5),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(active_context());
            }),
        );
        (handle, active_context().unwrap())
    });

    for _ in 0..3 {
        let seen = rx.recv().await.unwrap();
        assert_eq!(seen, Some(captured.clone()));
    }
    handle.cancel();
    let at_cancel = fired.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fired.load(Ordering::SeqCst), at_cancel);
}

#[tokio::test]
async fn test_unbound_primitive_does_not_propagate() {
    let agent = Agent::default();
    let raw = TokioScheduler::current().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    agent.tracer().in_new_context(|| {
        raw.defer(Box::new(move || {
            let _ = tx.send(active_context());
        }));
    });

    assert!(rx.recv().await.unwrap().is_none());
}
