use std::{fmt::Debug, time::Duration};

use crate::common::Result;

pub mod cron;
pub mod interval;
pub mod once;

pub use self::cron::CronTrigger;
pub use interval::IntervalTrigger;
pub use once::OnceTrigger;

/// 触发器接口 (The Interface)
///
/// - 决定一个事件在什么时间点触发，以及是否还有下一次。
/// - 由 EventQueue 独占持有：入队时调用一次，每次出队后再调用一次以决定是否重新入队。
///
/// # 约定
/// 同一个实例的连续返回值必须单调不减，否则队列可能出现活锁。
pub trait Trigger: Send + Sync + Debug + 'static {
    /// 计算下一次触发时间 (Unix 秒)
    ///
    /// - `now`: 调用时刻的当前时间。
    /// - 返回 `None` 表示已耗尽，不会再触发。
    fn next_fire_time(&mut self, now: f64) -> Option<f64>;

    /// 是否已耗尽
    fn is_exhausted(&self) -> bool;
}

pub type BoxTrigger = Box<dyn Trigger>;

/// 只在指定时间点触发一次
pub fn once_at(ts: f64) -> Result<BoxTrigger> {
    Ok(Box::new(OnceTrigger::at(ts)?))
}

/// 立即触发一次 (入队时刻)
pub fn immediately() -> BoxTrigger {
    Box::new(OnceTrigger::immediate())
}

/// 延时触发一次
pub fn after(delay: Duration) -> BoxTrigger {
    Box::new(OnceTrigger::after(delay))
}

/// 固定间隔重复触发，`times = None` 表示无限次
pub fn every(interval_secs: f64, times: Option<u32>) -> Result<BoxTrigger> {
    Ok(Box::new(IntervalTrigger::every(interval_secs, times)?))
}

/// Cron 表达式触发
pub fn cron(expr: &str, timezone: Option<&str>, times: Option<u32>) -> Result<BoxTrigger> {
    Ok(Box::new(CronTrigger::new(expr, timezone, times)?))
}
