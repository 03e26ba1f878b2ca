use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tokio::{
    sync::{Notify, Semaphore},
    task::JoinHandle,
};

use crate::common::{Result, SchedulerError};

/// 在途守卫 (InFlightGuard) - RAII
///
/// 无论任务正常结束还是 Panic，守卫 Drop 时都会把在途计数减一，
/// 计数归零时唤醒 `wait_idle`。
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// 有界工作池
///
/// - 提交即 `spawn`，调用方永远不会因为池满而阻塞 (Driver 主循环不会被慢 Handler 卡住)。
/// - 真正执行前需要拿到信号量许可，同时执行的任务数不超过 `max_workers`。
/// - `close()` 之后拒绝新提交，已提交的任务照常执行完。
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    accepting: AtomicBool,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        let capacity = max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            accepting: AtomicBool::new(true),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// 提交一个任务
    ///
    /// 池已关闭时返回 `SchedulerError::SchedulerShutdown`。
    pub fn submit<F>(&self, fut: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(SchedulerError::SchedulerShutdown);
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            idle: self.idle.clone(),
        };
        let semaphore = self.semaphore.clone();

        Ok(tokio::spawn(async move {
            // 所有权转移：守卫和许可都随这个 Future 结束而释放
            let _guard = guard;
            // 信号量从不 close，acquire 不会失败
            let _permit = semaphore.acquire_owned().await.ok();
            fut.await
        }))
    }

    /// 停止接收新任务
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// 重新开放 (调度器再次 start 时)
    pub fn reopen(&self) {
        self.accepting.store(true, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// 已提交但尚未结束的任务数 (包含排队等许可的)
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 等待所有在途任务结束
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_capped() {
        let pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..12 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.wait_idle().await;
        assert_eq!(pool.in_flight(), 0);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn closed_pool_rejects_but_finishes_in_flight() {
        let pool = WorkerPool::new(2);
        let handle = pool
            .submit(async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                7
            })
            .unwrap();
        pool.close();
        assert!(matches!(
            pool.submit(async {}),
            Err(SchedulerError::SchedulerShutdown)
        ));
        assert_eq!(handle.await.unwrap(), 7);

        pool.reopen();
        assert!(pool.submit(async {}).is_ok());
        pool.wait_idle().await;
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let pool = WorkerPool::new(1);
        let start = Instant::now();
        pool.wait_idle().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn panicking_task_still_releases_slot() {
        let pool = WorkerPool::new(1);
        let handle = pool
            .submit(async {
                if true {
                    panic!("boom");
                }
            })
            .unwrap();
        assert!(handle.await.is_err());
        pool.wait_idle().await;
        assert_eq!(pool.in_flight(), 0);
    }
}
