use std::convert::Infallible;

use serde_json::json;

use tracewire::telemetry::{TelemetryEvent, TelemetryRecorder};
use tracewire::{Agent, AgentConfig, Descriptor, Export, LoadStatus};

#[test]
fn test_config_defaults_and_overrides() {
    let defaults = AgentConfig::from_json_str("{}").unwrap();
    assert!(defaults.enabled);
    assert!(defaults.disabled_targets.is_empty());
    assert_eq!(defaults.max_segments_per_context, 900);

    let custom = AgentConfig::from_json_str(
        r#"{ "enabled": false, "max_segments_per_context": 10 }"#,
    )
    .unwrap();
    assert!(!custom.enabled);
    assert!(!custom.is_target_enabled("anything"));
    assert_eq!(custom.max_segments_per_context, 10);

    assert!(AgentConfig::from_json_str("{ not json").is_err());
}

#[test]
fn test_disabled_agent_passes_everything_through() {
    let agent = Agent::new(AgentConfig {
        enabled: false,
        ..AgentConfig::default()
    });
    agent.register(Descriptor::new("pg", |_, _, _| anyhow::bail!("must not run")));

    agent.load("pg", || Ok::<_, Infallible>(Export::Value(json!(1)))).unwrap();

    assert_eq!(agent.load_status("pg"), Some(LoadStatus::PassedThrough));
    assert_eq!(agent.telemetry_snapshot().load_stats.hook_failures, 0);
}

#[test]
fn test_snapshot_aggregates_load_and_context_events() {
    let agent = Agent::default();
    agent.register(Descriptor::new("ok", |_, _, _| Ok(None)));
    agent.register(Descriptor::new("bad", |_, _, _| anyhow::bail!("nope")));

    for target in ["ok", "bad", "other", "ok"] {
        agent
            .load(target, || Ok::<_, Infallible>(Export::Value(json!(target))))
            .unwrap();
    }

    let tracer = agent.tracer();
    let a = tracer.create_context();
    let b = tracer.create_context();
    a.start_segment("x").unwrap().end().unwrap();
    a.start_segment("y").unwrap();
    tracer.end(&a);
    tracer.end(&b);
    tracer.end(&b);

    let snap = agent.telemetry_snapshot();
    assert_eq!(snap.load_stats.instrumented, 1);
    assert_eq!(snap.load_stats.skipped, 1);
    assert_eq!(snap.load_stats.hook_failures, 1);
    assert_eq!(snap.load_stats.passed_through, 1);
    assert_eq!(snap.context_stats.started, 2);
    assert_eq!(snap.context_stats.ended, 2);
    assert_eq!(snap.context_stats.total_segments, 2);
    assert!(snap.context_stats.avg_duration_ms >= 0.0);
}

#[test]
fn test_recorder_is_bounded() {
    let mut recorder = TelemetryRecorder::new();
    for i in 0..10_005 {
        recorder.record(TelemetryEvent::TargetPassedThrough {
            target: format!("t{i}"),
        });
    }

    assert_eq!(recorder.len(), 10_000);
    assert_eq!(
        recorder.events().next(),
        Some(&TelemetryEvent::TargetPassedThrough {
            target: "t5".to_string()
        }),
        "oldest events are dropped first"
    );

    recorder.clear();
    assert!(recorder.is_empty());
}
