use crate::{
    common::{Result, SchedulerError},
    trigger::Trigger,
};

/// 固定间隔触发器
///
/// - 第一次触发时间为第一次调用 `next_fire_time` 的时刻 (也就是入队时刻)，不额外等一个间隔。
/// - 之后每次在上一次触发时间上累加 `interval` (固定速率，不随 Handler 耗时漂移)。
/// - `times` 个触发时间之后返回 `None`；`None` 表示无限重复。
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    interval: f64,
    remaining: Option<u32>,
    last: Option<f64>,
}

impl IntervalTrigger {
    pub fn every(interval_secs: f64, times: Option<u32>) -> Result<Self> {
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(SchedulerError::InvalidTrigger(format!(
                "interval must be a positive number of seconds, got {interval_secs}"
            )));
        }
        if times == Some(0) {
            return Err(SchedulerError::InvalidTrigger(
                "repeat count must be at least 1".into(),
            ));
        }
        Ok(Self {
            interval: interval_secs,
            remaining: times,
            last: None,
        })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// 剩余触发次数，无限重复时为 None
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }
}

impl Trigger for IntervalTrigger {
    fn next_fire_time(&mut self, now: f64) -> Option<f64> {
        if let Some(left) = self.remaining.as_mut() {
            if *left == 0 {
                return None;
            }
            *left -= 1;
        }
        let next = match self.last {
            None => now,
            Some(prev) => prev + self.interval,
        };
        self.last = Some(next);
        Some(next)
    }

    fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fire_is_now_then_fixed_rate() {
        let mut t = IntervalTrigger::every(2.0, None).unwrap();
        assert_eq!(t.next_fire_time(10.0), Some(10.0));
        // 调用时刻晚了也按上一次触发时间累加
        assert_eq!(t.next_fire_time(11.5), Some(12.0));
        assert_eq!(t.next_fire_time(12.0), Some(14.0));
        assert!(!t.is_exhausted());
    }

    #[test]
    fn stops_after_times() {
        let mut t = IntervalTrigger::every(1.0, Some(3)).unwrap();
        let fires: Vec<_> = (0..5).map(|i| t.next_fire_time(i as f64)).collect();
        assert_eq!(fires, vec![Some(0.0), Some(1.0), Some(2.0), None, None]);
        assert!(t.is_exhausted());
    }

    #[test]
    fn rejects_non_positive_interval() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                IntervalTrigger::every(bad, None),
                Err(SchedulerError::InvalidTrigger(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_times() {
        assert!(IntervalTrigger::every(1.0, Some(0)).is_err());
    }
}
