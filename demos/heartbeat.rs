//! Heartbeat Example
//!
//! Demonstrates:
//! - Lifecycle handlers (`__init__` / `__exit__`)
//! - A struct handler and a closure handler
//! - Recurring and delayed triggers
//! - Ctrl-C or timeout ending the driver loop
//!
//! Run with: RUST_LOG=info cargo run --example heartbeat

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sched_trigger::{
    Context, Event, EventHandler, PublishOptions, SchedulerBuilder, SchedulerConfig,
    common::{EventData, ON_EXIT, ON_INIT},
    trigger,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct BeatHandler;

#[async_trait]
impl EventHandler for BeatHandler {
    fn name(&self) -> &str {
        "beat"
    }

    async fn handle(&self, ctx: Arc<Context>, event: Arc<Event>) -> anyhow::Result<Value> {
        let count = ctx.update("beats", |v| json!(v.as_u64().unwrap_or(0) + 1));
        info!(
            source = %event.get::<String>("source").unwrap_or_default(),
            count = %count,
            "Heartbeat."
        );
        Ok(count)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let shutdown = CancellationToken::new();
    let scheduler = SchedulerBuilder::new()
        .with_config(SchedulerConfig::new_dev())
        .with_handler("beat", Arc::new(BeatHandler))
        .with_shutdown_token(shutdown.clone())
        .build()?;

    scheduler.register_fn(ON_INIT, "init", |_ctx, _ev| async {
        info!("Scheduler warming up.");
        Ok(())
    });
    scheduler.register_fn(ON_EXIT, "summary", |ctx: Arc<Context>, _ev| async move {
        info!(beats = ?ctx.get("beats"), "Scheduler finished.");
        Ok(())
    });
    scheduler.register_fn("farewell", "farewell", |_ctx, _ev| async {
        info!("Delayed event fired.");
        Ok(())
    });

    let mut data = EventData::new();
    data.insert("source".into(), json!("every-500ms"));
    scheduler.publish_with(
        "beat",
        data,
        PublishOptions::default().with_trigger(trigger::every(0.5, Some(5))?),
    );
    scheduler.publish("farewell", Some(trigger::after(Duration::from_secs(2))));

    // 演示结束后自动停机，Ctrl-C 也可以提前结束
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        stopper.cancel();
    });

    scheduler
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    info!(metrics = ?scheduler.metrics(), "Done.");
    Ok(())
}
