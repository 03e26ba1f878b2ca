use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use cron::Schedule;

/// 全局统一的时间计算器
pub struct TimeUtils;

impl TimeUtils {
    /// [标准] 获取当前 Unix 时间戳 (秒, 双精度)
    /// 全系统统一使用这个方法获取“现在”
    pub fn now_f64() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// 秒 -> 微秒 (队列排序键)
    pub fn to_micros(ts: f64) -> i64 {
        (ts * 1_000_000.0).round() as i64
    }

    pub fn from_micros(micros: i64) -> f64 {
        micros as f64 / 1_000_000.0
    }

    /// Cron 计算: 严格晚于 `base_time` 的第一个匹配点
    pub fn cron_next<Z: TimeZone>(schedule: &Schedule, tz: &Z, base_time: f64) -> Option<f64> {
        let base_dt = Self::f64_to_datetime(base_time, tz)?;

        schedule
            .after(&base_dt)
            .next()
            .map(|dt| dt.with_timezone(&Utc).timestamp_micros() as f64 / 1_000_000.0)
    }

    /// 辅助：f64 -> DateTime
    fn f64_to_datetime<Z: TimeZone>(ts: f64, tz: &Z) -> Option<DateTime<Z>> {
        let secs = ts.floor() as i64;
        let nsecs = ((ts - secs as f64) * 1_000_000_000.0) as u32;
        tz.timestamp_opt(secs, nsecs.min(999_999_999)).single()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn micros_round_trip_keeps_precision() {
        let ts = 1_700_000_000.123_456;
        assert_eq!(TimeUtils::to_micros(ts), 1_700_000_000_123_456);
        assert!((TimeUtils::from_micros(1_700_000_000_123_456) - ts).abs() < 1e-6);
    }

    #[test]
    fn cron_next_is_strictly_after_base() {
        // 每分钟第 0 秒
        let schedule = Schedule::from_str("0 * * * * *").unwrap();
        // 2024-01-01T00:00:00Z
        let base = 1_704_067_200.0;
        let next = TimeUtils::cron_next(&schedule, &Utc, base).unwrap();
        assert_eq!(next, base + 60.0);
        let next = TimeUtils::cron_next(&schedule, &Utc, base + 0.5).unwrap();
        assert_eq!(next, base + 60.0);
    }
}
