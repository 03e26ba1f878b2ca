use std::str::FromStr;

use chrono_tz::Tz;
use ::cron::Schedule;

use crate::{
    common::{Result, SchedulerError, TimeUtils},
    trigger::Trigger,
};

/// Cron 触发器
///
/// 每次返回严格晚于 `max(now, 上一次触发时间)` 的第一个匹配点，因此天然单调。
#[derive(Debug, Clone)]
pub struct CronTrigger {
    schedule: Schedule,
    tz: Tz,
    remaining: Option<u32>,
    last: Option<f64>,
    done: bool,
}

impl CronTrigger {
    /// - `expr`: cron 表达式 (秒 分 时 日 月 周 [年])
    /// - `timezone`: IANA 时区名，默认 UTC
    /// - `times`: 最多触发次数，None 为无限
    pub fn new(expr: &str, timezone: Option<&str>, times: Option<u32>) -> Result<Self> {
        let schedule = Schedule::from_str(expr)?;
        let tz = match timezone {
            Some(name) => name.parse::<Tz>().map_err(|_| {
                SchedulerError::InvalidTrigger(format!("unknown timezone '{name}'"))
            })?,
            None => chrono_tz::UTC,
        };
        if times == Some(0) {
            return Err(SchedulerError::InvalidTrigger(
                "repeat count must be at least 1".into(),
            ));
        }
        Ok(Self {
            schedule,
            tz,
            remaining: times,
            last: None,
            done: false,
        })
    }
}

impl Trigger for CronTrigger {
    fn next_fire_time(&mut self, now: f64) -> Option<f64> {
        if self.done {
            return None;
        }
        if self.remaining == Some(0) {
            self.done = true;
            return None;
        }
        let base = self.last.map_or(now, |prev| prev.max(now));
        // 表达式可能再也没有匹配点 (例如指定了过去的年份)
        let Some(next) = TimeUtils::cron_next(&self.schedule, &self.tz, base) else {
            self.done = true;
            return None;
        };
        if let Some(left) = self.remaining.as_mut() {
            *left -= 1;
        }
        self.last = Some(next);
        Some(next)
    }

    fn is_exhausted(&self) -> bool {
        self.done || self.remaining == Some(0)
    }
}
