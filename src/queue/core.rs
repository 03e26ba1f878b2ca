use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, trace};

use crate::{
    common::{Event, Result, SchedulerError, TimeUtils},
    queue::entry::{QueueEntry, QueueKey},
    trigger::{self, BoxTrigger},
};

/// 出队尝试的结果
enum Peek {
    /// 队首已到期，已经取出 (并已完成重新入队)
    Ready(Arc<Event>),
    /// 队首还没到期，还需要等这么久
    Wait(Duration),
    Empty,
}

/// 事件队列 (In-Memory, Time-Ordered)
///
/// - 【等待索引】`BTreeMap<(FireTime, Priority, Seq), Entry>`，最小键即下一个要触发的事件。
/// - `Mutex` 只保护索引本身，临界区内没有 await。
/// - `Notify` 用于唤醒阻塞在 `get` 上的消费者 (新事件可能比当前队首更早)。
pub struct EventQueue {
    pending: Mutex<BTreeMap<QueueKey, QueueEntry>>,
    seq: AtomicU64,
    notify: Notify,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("next_fire_time", &self.next_fire_time())
            .finish()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            seq: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn key_for(&self, fire_at: f64, event: &Event) -> QueueKey {
        QueueKey {
            fire_at: TimeUtils::to_micros(fire_at),
            priority: event.priority,
            seq: self.next_seq(),
        }
    }

    /// 入队
    ///
    /// - `trigger = None` 等价于立即触发一次。
    /// - 触发器在入队时就已耗尽 (例如已经用过的一次性触发器)，事件被静默丢弃，返回 `false`。
    pub fn put(&self, event: Event, trigger: Option<BoxTrigger>) -> bool {
        self.put_shared(Arc::new(event), trigger)
    }

    /// 入队一个已共享的事件
    pub fn put_shared(&self, event: Arc<Event>, trigger: Option<BoxTrigger>) -> bool {
        let mut trigger = trigger.unwrap_or_else(trigger::immediately);
        let now = TimeUtils::now_f64();

        let Some(fire_at) = trigger.next_fire_time(now) else {
            debug!(
                event_type = %event.event_type,
                event_id = %event.id,
                "Trigger already exhausted, event dropped."
            );
            return false;
        };

        let key = self.key_for(fire_at, &event);
        trace!(event_type = %event.event_type, fire_at, "Event queued.");
        self.pending.lock().insert(key, QueueEntry { event, trigger });

        // 唤醒所有等待者重新计算等待时长
        self.notify.notify_waiters();
        true
    }

    /// 取出已到期的队首
    ///
    /// 触发器未耗尽时，在返回之前就把下一次触发写回索引，
    /// 所以事件在 Handler 执行期间，它的下一次触发可能已经在队列里了。
    fn pop_ready(&self, now: f64) -> Peek {
        let now_us = TimeUtils::to_micros(now);
        let mut pending = self.pending.lock();

        let Some(head) = pending.first_entry() else {
            return Peek::Empty;
        };
        let fire_at = head.key().fire_at;
        if fire_at > now_us {
            return Peek::Wait(Duration::from_micros((fire_at - now_us) as u64));
        }

        let (_, mut entry) = head.remove_entry();
        let event = entry.event.clone();

        if let Some(next) = entry.trigger.next_fire_time(now) {
            let key = self.key_for(next, &event);
            pending.insert(key, entry);
            drop(pending);
            self.notify.notify_waiters();
        }
        Peek::Ready(event)
    }

    /// 非阻塞出队
    pub fn try_get(&self) -> Option<Arc<Event>> {
        match self.pop_ready(TimeUtils::now_f64()) {
            Peek::Ready(event) => Some(event),
            Peek::Wait(_) | Peek::Empty => None,
        }
    }

    /// 阻塞出队
    ///
    /// 等到队首到期，或者 `timeout` 用尽。
    /// 超时返回 `SchedulerError::EmptyQueueTimeout`，调用方应视为“暂时没有事件”。
    pub async fn get(&self, timeout: Duration) -> Result<Arc<Event>> {
        let deadline = Instant::now() + timeout;
        loop {
            // 先注册通知再检查索引，避免检查之后、等待之前的 put 被漏掉
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = match self.pop_ready(TimeUtils::now_f64()) {
                Peek::Ready(event) => return Ok(event),
                Peek::Wait(d) => Some(d),
                Peek::Empty => None,
            };

            let now = Instant::now();
            if now >= deadline {
                // 零超时也要让出一次，调用方在循环里反复 get 时其他任务才有机会运行
                tokio::task::yield_now().await;
                return Err(SchedulerError::EmptyQueueTimeout(timeout));
            }
            let remain = deadline - now;
            let sleep_for = wait.map_or(remain, |d| d.min(remain));

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// 队首的触发时间 (Unix 秒)
    pub fn next_fire_time(&self) -> Option<f64> {
        self.pending
            .lock()
            .keys()
            .next()
            .map(|k| TimeUtils::from_micros(k.fire_at))
    }

    /// 清空队列，返回丢弃的条目数
    pub fn clear(&self) -> usize {
        let mut pending = self.pending.lock();
        let n = pending.len();
        pending.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{every, once_at};

    fn marker(ev: &Event) -> String {
        ev.get::<String>("m").unwrap_or_default()
    }

    #[test]
    fn default_trigger_is_immediate() {
        let q = EventQueue::new();
        assert!(q.put(Event::new("a"), None));
        assert_eq!(q.len(), 1);
        assert_eq!(q.try_get().unwrap().event_type, "a");
        assert!(q.is_empty());
    }

    #[test]
    fn exhausted_trigger_is_dropped() {
        let q = EventQueue::new();
        let mut spent = once_at(0.0).unwrap();
        assert!(spent.next_fire_time(0.0).is_some());
        assert!(!q.put(Event::new("late"), Some(spent)));
        assert!(q.is_empty());
    }

    #[test]
    fn future_entries_are_not_ready() {
        let q = EventQueue::new();
        let later = TimeUtils::now_f64() + 60.0;
        q.put(Event::new("later"), Some(once_at(later).unwrap()));
        assert!(q.try_get().is_none());
        assert_eq!(q.len(), 1);
        let peek = q.next_fire_time().unwrap();
        assert!((peek - later).abs() < 1e-3);
    }

    #[test]
    fn orders_by_time_then_priority_then_fifo() {
        let q = EventQueue::new();
        let t = TimeUtils::now_f64() - 10.0;
        let ev = |m: &str, p: i32| Event::new("x").with_field("m", m).with_priority(p);

        q.put(ev("late", 0), Some(once_at(t + 2.0).unwrap()));
        q.put(ev("p5-first", 5), Some(once_at(t).unwrap()));
        q.put(ev("p1", 1), Some(once_at(t).unwrap()));
        q.put(ev("p5-second", 5), Some(once_at(t).unwrap()));
        q.put(ev("earliest", 9), Some(once_at(t - 1.0).unwrap()));

        let order: Vec<_> = std::iter::from_fn(|| q.try_get())
            .map(|e| marker(&e))
            .collect();
        assert_eq!(
            order,
            vec!["earliest", "p1", "p5-first", "p5-second", "late"]
        );
    }

    #[test]
    fn recurring_entry_is_requeued_before_return() {
        let q = EventQueue::new();
        q.put(Event::new("tick"), Some(every(60.0, Some(2)).unwrap()));

        let first = q.try_get().unwrap();
        // 下一次已在队列中
        assert_eq!(q.len(), 1);
        let next = q.next_fire_time().unwrap();
        assert!(next > TimeUtils::now_f64() + 50.0);
        assert!(q.try_get().is_none());
        assert_eq!(first.event_type, "tick");
    }

    #[test]
    fn requeued_occurrence_shares_the_event() {
        let q = EventQueue::new();
        q.put(Event::new("tick"), Some(every(0.000_001, Some(2)).unwrap()));
        let a = q.try_get().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let b = q.try_get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn get_times_out_on_empty_queue() {
        let q = EventQueue::new();
        let start = Instant::now();
        let err = q.get(Duration::from_millis(100)).await.unwrap_err();
        let elapsed = start.elapsed();
        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test]
    async fn zero_timeout_yields_to_other_tasks() {
        let q = Arc::new(EventQueue::new());
        let producer = q.clone();
        // 单线程运行时: 只有 get 让出，生产者才能运行
        tokio::spawn(async move {
            producer.put(Event::new("late"), None);
        });
        let mut spins = 0;
        let ev = loop {
            match q.get(Duration::ZERO).await {
                Ok(ev) => break ev,
                Err(e) => {
                    assert!(e.is_timeout());
                    spins += 1;
                    assert!(spins < 100, "getter never yielded");
                }
            }
        };
        assert_eq!(ev.event_type, "late");
    }

    #[tokio::test]
    async fn get_waits_for_fire_time() {
        let q = EventQueue::new();
        let at = TimeUtils::now_f64() + 0.15;
        q.put(Event::new("soon"), Some(once_at(at).unwrap()));
        let ev = q.get(Duration::from_secs(2)).await.unwrap();
        assert_eq!(ev.event_type, "soon");
        assert!(TimeUtils::now_f64() >= at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn put_wakes_blocked_getter() {
        let q = Arc::new(EventQueue::new());
        let producer = q.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            producer.put(Event::new("wake"), None);
        });
        let start = Instant::now();
        let ev = q.get(Duration::from_secs(5)).await.unwrap();
        assert_eq!(ev.event_type, "wake");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn clear_drops_everything() {
        let q = EventQueue::new();
        q.put(Event::new("a"), None);
        q.put(Event::new("b"), Some(every(1.0, None).unwrap()));
        assert_eq!(q.clear(), 2);
        assert!(q.try_get().is_none());
    }
}
