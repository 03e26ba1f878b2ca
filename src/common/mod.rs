pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod time;
pub mod traits;
pub(crate) mod utils;

// 导出配置
pub use config::{DriverConfig, SchedulerConfig, WorkerConfig};

// 导出错误类型
pub use error::{Result, SchedulerError};

// 导出核心模型
pub use context::Context;
pub use model::{
    DEFAULT_CHANNEL, DEFAULT_PRIORITY, Event, EventData, ON_EXIT, ON_INIT, ON_REPLY,
    ON_TASK_COMPLETE,
};

// 导出用户需实现的 Trait
pub use traits::{EventHandler, FnHandler, HandlerRef, handler_fn};

pub use time::TimeUtils;
// 内部工具的快捷访问
pub(crate) use utils::new_event_id;
