pub mod dispatch;
pub mod metrics;
pub mod plugin;
pub mod plugins;
pub mod pool;

pub use dispatch::{DispatchHandle, HandlerResult};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};
pub use plugin::{NoOpPlugin, SchedulerPlugin};
pub use pool::WorkerPool;
