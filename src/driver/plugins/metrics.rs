use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::Event,
    driver::{SchedulerMetrics, SchedulerPlugin},
};

/// 指标插件 (自动注入到插件链首位)
pub struct MetricsPlugin {
    metrics: Arc<SchedulerMetrics>,
}

impl MetricsPlugin {
    pub fn new(metrics: Arc<SchedulerMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl SchedulerPlugin for MetricsPlugin {
    async fn before_dispatch(&self, _event: &Event) {
        self.metrics.inc_dispatched();
    }
    // 活跃数 +1
    async fn before_handler(&self, _event: &Event, _handler: &str) {
        self.metrics.inc_active();
    }
    // 活跃数 -1, success/failure +1
    async fn after_handler(&self, _event: &Event, _handler: &str, _duration: f64, ok: bool) {
        self.metrics.finish(ok);
    }
}
