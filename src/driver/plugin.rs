use async_trait::async_trait;

use crate::common::Event;

/// 调度器插件/钩子接口
///
/// 用户可以通过实现此 Trait 来介入调度器的生命周期。
/// 常见用途：
/// - 自定义日志/监控 (Metrics)
/// - 错误报警 (Alerting)
/// - 审计 (Audit)
///
/// 钩子在分发路径上被 await，实现应当足够轻量。
#[async_trait]
pub trait SchedulerPlugin: Send + Sync + 'static {
    /// [生命周期] `start()` 时调用，早于 `ON_INIT` 事件
    async fn on_start(&self, _scheduler: &str) {}

    /// [生命周期] `stop()` 时调用，晚于 `ON_EXIT` 事件
    async fn on_stop(&self, _scheduler: &str) {}

    /// 一个事件开始分发前调用 (每个事件一次)
    async fn before_dispatch(&self, _event: &Event) {}

    /// 单个 Handler 执行前调用
    async fn before_handler(&self, _event: &Event, _handler: &str) {}

    /// 单个 Handler 执行结束 (无论成功失败都会调用)
    ///
    /// - `duration`: 耗时 (秒)
    /// - `ok`: 是否成功 (Err 与 Panic 均视为失败)
    async fn after_handler(&self, _event: &Event, _handler: &str, _duration: f64, _ok: bool) {}
}

// ==========================================
// 默认的空插件 (No-Op)
// ==========================================

pub struct NoOpPlugin;

#[async_trait]
impl SchedulerPlugin for NoOpPlugin {}
