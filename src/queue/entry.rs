use std::sync::Arc;

use crate::{common::Event, trigger::BoxTrigger};

/// 排序键 (FireTime, Priority, Seq)
///
/// 字段顺序即比较顺序:
/// 1. 触发时间 (微秒) 升序
/// 2. 优先级升序 (数字小的先出)
/// 3. 入队序号升序 (完全相同时 FIFO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct QueueKey {
    pub fire_at: i64,
    pub priority: i32,
    pub seq: u64,
}

/// 队列条目
///
/// 事件本身不会被修改；重复触发时新条目引用同一个 `Arc<Event>`。
#[derive(Debug)]
pub(crate) struct QueueEntry {
    pub event: Arc<Event>,
    pub trigger: BoxTrigger,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fire_at: i64, priority: i32, seq: u64) -> QueueKey {
        QueueKey {
            fire_at,
            priority,
            seq,
        }
    }

    #[test]
    fn three_level_ordering() {
        // 时间优先于优先级
        assert!(key(1, 99, 9) < key(2, 0, 0));
        // 同一时间比较优先级
        assert!(key(5, 1, 9) < key(5, 2, 0));
        // 时间与优先级都相同时按序号
        assert!(key(5, 1, 3) < key(5, 1, 4));
    }
}
