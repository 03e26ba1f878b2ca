use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// 调度器核心指标
// 使用 Atomic 保证高并发下的计数性能
#[derive(Debug, Default, Serialize)]
pub struct SchedulerMetrics {
    // --- 瞬时状态 (Gauges) ---
    /// 当前正在执行的 Handler 调用数
    pub active_handlers: AtomicUsize,

    // --- 累积计数 (Counters) ---
    /// 成功入队的事件数
    pub published: AtomicU64,

    /// 因触发器已耗尽而被丢弃的事件数
    pub dropped: AtomicU64,

    /// 被分发的事件数 (不论有没有 Handler)
    pub dispatched: AtomicU64,

    /// Handler 调用成功次数
    pub handler_success: AtomicU64,

    /// Handler 调用失败次数 (Err 或 Panic)
    pub handler_failure: AtomicU64,
}

/// 某一时刻的指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_handlers: usize,
    pub published: u64,
    pub dropped: u64,
    pub dispatched: u64,
    pub handler_success: u64,
    pub handler_failure: u64,
}

impl SchedulerMetrics {
    pub fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// 增加活跃数 (开始执行)
    pub fn inc_active(&self) {
        self.active_handlers.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次调用结束
    pub fn finish(&self, ok: bool) {
        self.active_handlers.fetch_sub(1, Ordering::Relaxed);
        if ok {
            self.handler_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.handler_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_handlers: self.active_handlers.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            handler_success: self.handler_success.load(Ordering::Relaxed),
            handler_failure: self.handler_failure.load(Ordering::Relaxed),
        }
    }
}
