use crate::scheduler::Scheduler;

/// Handler 模块
///
/// 一组相关 Handler 的显式注册入口。应用在组合根处把模块装进调度器：
///
/// ```ignore
/// scheduler.install(&market_data::module);
/// ```
pub trait HandlerModule: Send + Sync {
    fn register(&self, scheduler: &Scheduler);
}

impl<F> HandlerModule for F
where
    F: Fn(&Scheduler) + Send + Sync,
{
    fn register(&self, scheduler: &Scheduler) {
        self(scheduler)
    }
}
