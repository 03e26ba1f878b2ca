use std::time::Duration;

use crate::{
    common::{Result, SchedulerError},
    trigger::Trigger,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FireAt {
    /// 入队即触发
    Now,
    /// 入队时刻 + 延时
    Delay(Duration),
    /// 绝对时间点 (Unix 秒)，允许是过去的时间
    At(f64),
}

/// 一次性触发器
///
/// 第一次调用返回触发时间，之后永远返回 `None`。
#[derive(Debug, Clone)]
pub struct OnceTrigger {
    fire_at: FireAt,
    fired: bool,
}

impl OnceTrigger {
    /// 在指定时间点触发
    ///
    /// 过去的时间点不是错误，下一轮循环会立即执行。
    pub fn at(ts: f64) -> Result<Self> {
        if !ts.is_finite() {
            return Err(SchedulerError::InvalidTrigger(format!(
                "once_at timestamp must be finite, got {ts}"
            )));
        }
        Ok(Self {
            fire_at: FireAt::At(ts),
            fired: false,
        })
    }

    pub fn immediate() -> Self {
        Self {
            fire_at: FireAt::Now,
            fired: false,
        }
    }

    pub fn after(delay: Duration) -> Self {
        Self {
            fire_at: FireAt::Delay(delay),
            fired: false,
        }
    }
}

impl Trigger for OnceTrigger {
    fn next_fire_time(&mut self, now: f64) -> Option<f64> {
        if self.fired {
            return None;
        }
        self.fired = true;
        Some(match self.fire_at {
            FireAt::Now => now,
            FireAt::Delay(d) => now + d.as_secs_f64(),
            FireAt::At(ts) => ts,
        })
    }

    fn is_exhausted(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_once() {
        let mut t = OnceTrigger::at(100.0).unwrap();
        assert!(!t.is_exhausted());
        assert_eq!(t.next_fire_time(50.0), Some(100.0));
        assert!(t.is_exhausted());
        assert_eq!(t.next_fire_time(150.0), None);
        assert_eq!(t.next_fire_time(200.0), None);
    }

    #[test]
    fn past_timestamp_is_allowed() {
        let mut t = OnceTrigger::at(1.0).unwrap();
        assert_eq!(t.next_fire_time(1_000.0), Some(1.0));
    }

    #[test]
    fn non_finite_timestamp_rejected() {
        assert!(matches!(
            OnceTrigger::at(f64::NAN),
            Err(SchedulerError::InvalidTrigger(_))
        ));
        assert!(OnceTrigger::at(f64::INFINITY).is_err());
    }

    #[test]
    fn immediate_and_delay_are_relative_to_first_call() {
        let mut now = OnceTrigger::immediate();
        assert_eq!(now.next_fire_time(42.0), Some(42.0));

        let mut later = OnceTrigger::after(Duration::from_millis(500));
        assert_eq!(later.next_fire_time(42.0), Some(42.5));
        assert_eq!(later.next_fire_time(43.0), None);
    }
}
