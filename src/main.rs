use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use tracewire::scheduler::{EventEmitter, EventSource, Scheduler, TokioScheduler};
use tracewire::{active_context, Agent, AgentConfig, Descriptor, Export, Method, Object, ShimKind};

const REQUESTS: usize = 3;

/// Stand-in for a third-party database client.
fn load_pg_client() -> anyhow::Result<Export> {
    let client = Object::new()
        .with_method("connect", Method::new(|_| Ok(json!(true))))
        .with_method(
            "query",
            Method::new(|args| {
                let sql = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(json!({ "rows": [], "command": sql.split_whitespace().next() }))
            }),
        );
    Ok(Export::Object(client))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("tracewire demo booting...");

    let config = match std::env::var("TRACEWIRE_CONFIG") {
        Ok(raw) => AgentConfig::from_json_str(&raw)?,
        Err(_) => AgentConfig::default(),
    };
    let agent = Agent::new(config);

    agent.register(
        Descriptor::new("pg", |shim, export, _target| {
            let Some(ds) = shim.as_datastore() else {
                anyhow::bail!("pg instrumentation needs a datastore shim");
            };
            let Some(client) = export.as_object() else {
                anyhow::bail!("pg export is not an object");
            };
            ds.record_operation(client, "connect", "connect");
            ds.record_query(client, "query");
            Ok(None)
        })
        .with_shim_kind(ShimKind::Datastore {
            product: "Postgres".to_string(),
        })
        .with_on_error(|err| tracing::error!("pg instrumentation failed: {err}")),
    );

    let pg = agent.load("pg", load_pg_client)?;
    let Some(client) = pg.as_object().cloned() else {
        anyhow::bail!("pg export is not an object");
    };

    let scheduler = agent.bind_scheduler(TokioScheduler::current()?);
    let emitter = agent.bind_emitter(EventEmitter::new());
    let tracer = agent.tracer().clone();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    for n in 0..REQUESTS {
        let scheduler_inner = scheduler.clone();
        let emitter_inner = emitter.clone();
        let client = client.clone();
        let done_tx = done_tx.clone();

        tracer.in_new_context(|| {
            if let Some(ctx) = active_context() {
                if let Err(err) = ctx.set_name(format!("Request/{n}")) {
                    tracing::warn!(request = n, %err, "could not name request");
                }
            }
            scheduler.defer(Box::new(move || {
                if let Err(err) = client.call("connect", &[]) {
                    tracing::warn!(request = n, %err, "connect failed");
                }
                scheduler_inner.set_timeout(
                    Duration::from_millis(10 * (REQUESTS - n) as u64),
                    Box::new(move || {
                        if let Err(err) =
                            client.call("query", &[json!("SELECT * FROM users WHERE id = $1")])
                        {
                            tracing::warn!(request = n, %err, "query failed");
                        }
                        emitter_inner.on(
                            "flush",
                            std::sync::Arc::new(move |_payload: &Value| {
                                if let Some(ctx) = active_context() {
                                    if done_tx.send(ctx).is_err() {
                                        tracing::warn!(request = n, "result receiver dropped");
                                    }
                                }
                            }),
                        );
                    }),
                );
            }));
        });
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let fired = emitter.emit("flush", &Value::Null);
    tracing::info!(fired, "flush emitted");

    // Listeners ran synchronously inside emit, so every result is queued.
    while let Ok(ctx) = done_rx.try_recv() {
        tracer.end(&ctx);
        let names: Vec<String> = ctx.segments().into_iter().map(|s| s.name).collect();
        tracing::info!(context_id = %ctx.id(), name = ?ctx.name(), ?names, "request finished");
    }

    let snapshot = agent.telemetry_snapshot();
    tracing::info!(?snapshot, "telemetry");
    Ok(())
}
