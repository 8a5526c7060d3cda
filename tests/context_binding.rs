use std::panic::{self, AssertUnwindSafe};

use serde_json::json;

use tracewire::context::{active_context, bind_fn, bind_future, bind_once, run_in, ContextState};
use tracewire::error::ContextError;
use tracewire::{Agent, AgentConfig};

#[test]
fn test_no_active_context_by_default() {
    assert!(active_context().is_none());
}

#[test]
fn test_scoped_execution_installs_fresh_context_each_call() {
    let agent = Agent::default();
    let scoped = agent
        .tracer()
        .create_scoped_execution(|n: u32| (n, active_context()));

    let (_, first) = scoped(1);
    let (_, second) = scoped(2);

    let first = first.expect("context inside scope");
    let second = second.expect("context inside scope");
    assert_ne!(first.id(), second.id());
    assert!(active_context().is_none(), "slot restored after each call");
    assert_eq!(agent.telemetry_snapshot().context_stats.started, 2);
}

#[test]
fn test_scope_restores_previous_context_on_panic() {
    let agent = Agent::default();
    let tracer = agent.tracer();
    let outer = tracer.create_context();

    run_in(Some(outer.clone()), || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            tracer.in_new_context(|| panic!("request handler blew up"))
        }));
        assert!(result.is_err());
        assert_eq!(active_context(), Some(outer.clone()));
    });

    assert!(active_context().is_none());
}

#[test]
fn test_nested_scopes_restore_in_lifo_order() {
    let agent = Agent::default();
    let tracer = agent.tracer();
    let a = tracer.create_context();
    let b = tracer.create_context();

    run_in(Some(a.clone()), || {
        assert_eq!(active_context(), Some(a.clone()));
        run_in(Some(b.clone()), || {
            assert_eq!(active_context(), Some(b.clone()));
            run_in(None, || assert!(active_context().is_none()));
            assert_eq!(active_context(), Some(b.clone()));
        });
        assert_eq!(active_context(), Some(a.clone()));
    });
}

#[test]
fn test_bind_fn_reapplies_captured_context_on_every_call() {
    let agent = Agent::default();
    let tracer = agent.tracer();

    let (bound, captured) = tracer.in_new_context(|| {
        let captured = active_context().expect("inside scope");
        (bind_fn(|_: ()| active_context()), captured)
    });

    // Called from nowhere, and from inside an unrelated context
    assert_eq!(bound(()), Some(captured.clone()));
    let other = tracer.create_context();
    run_in(Some(other.clone()), || {
        assert_eq!(bound(()), Some(captured.clone()));
        assert_eq!(active_context(), Some(other.clone()), "restored after bound call");
    });
    assert_eq!(bound(()), Some(captured));
}

#[test]
fn test_binding_with_no_context_captures_none() {
    let agent = Agent::default();
    let bound = bind_once(active_context);

    let seen = agent.tracer().in_new_context(bound);

    assert!(seen.is_none());
}

#[tokio::test]
async fn test_bind_future_sees_context_across_awaits() {
    let agent = Agent::default();
    let tracer = agent.tracer();

    let (fut, captured) = tracer.in_new_context(|| {
        let captured = active_context().expect("inside scope");
        let fut = bind_future(async {
            tokio::task::yield_now().await;
            let first = active_context();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            (first, active_context())
        });
        (fut, captured)
    });

    let handle = tokio::spawn(fut);
    let (first, second) = handle.await.unwrap();

    assert_eq!(first, Some(captured.clone()));
    assert_eq!(second, Some(captured));
    assert!(active_context().is_none());
}

#[test]
fn test_end_is_logical_and_happens_once() {
    let agent = Agent::default();
    let tracer = agent.tracer();
    let ctx = tracer.create_context();

    run_in(Some(ctx.clone()), || {
        assert!(tracer.end(&ctx));
        // Still in the slot: ending does not pop it
        let current = active_context().expect("slot untouched");
        assert_eq!(current.state(), ContextState::Ended);
    });

    assert!(!tracer.end(&ctx), "second end is ignored");
    let snapshot = agent.telemetry_snapshot();
    assert_eq!(snapshot.context_stats.ended, 1);
}

#[test]
fn test_mutation_after_end_is_rejected_reads_stay_valid() {
    let agent = Agent::default();
    let tracer = agent.tracer();
    let ctx = tracer.create_context();

    ctx.set_name("WebTransaction/users").unwrap();
    ctx.set_attribute("http.status", json!(200)).unwrap();
    let open = ctx.start_segment("db").unwrap();
    tracer.end(&ctx);

    assert_eq!(ctx.set_name("renamed"), Err(ContextError::Ended));
    assert_eq!(ctx.set_attribute("late", json!(1)), Err(ContextError::Ended));
    assert_eq!(ctx.start_segment("late").err(), Some(ContextError::Ended));
    assert_eq!(open.end().err(), Some(ContextError::Ended));

    assert_eq!(ctx.name().as_deref(), Some("WebTransaction/users"));
    assert_eq!(ctx.attributes().get("http.status"), Some(&json!(200)));
    let segments = ctx.segments();
    assert_eq!(segments.len(), 1);
    assert!(!segments[0].is_open(), "open segments are closed at end");
}

#[test]
fn test_segment_limit() {
    let config = AgentConfig {
        max_segments_per_context: 2,
        ..AgentConfig::default()
    };
    let agent = Agent::new(config);
    let ctx = agent.tracer().create_context();

    ctx.start_segment("one").unwrap().end().unwrap();
    ctx.start_segment("two").unwrap();

    assert_eq!(ctx.start_segment("three").err(), Some(ContextError::SegmentLimit));
    assert_eq!(ctx.segments().len(), 2);
}
