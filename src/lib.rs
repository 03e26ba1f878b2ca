// 1. 基础模块
pub mod common;

// 2. 触发器与待触发队列
pub mod queue;
pub mod trigger;

// 3. 分发执行 (工作池、插件、指标)
pub mod driver;

// 4. 调度器核心
pub mod scheduler;

pub use common::{
    Context, Event, EventData, EventHandler, HandlerRef, Result, SchedulerConfig, SchedulerError,
    handler_fn,
};
pub use driver::{DispatchHandle, HandlerResult, MetricsSnapshot, SchedulerPlugin};
pub use queue::EventQueue;
pub use scheduler::{
    HandlerModule, PublishOptions, Publisher, Scheduler, SchedulerBuilder, SchedulerState,
    Subscriber,
};
pub use trigger::{BoxTrigger, Trigger};
