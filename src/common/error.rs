use std::time::Duration;

use thiserror::Error;

/// 调度器统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    // ==========================================
    // 1. 配置错误 (Configuration)
    // ==========================================
    /// 配置错误
    ///
    /// - 触发场景: 解析 JSON 配置失败、参数校验不通过 (例如 `max_workers = 0`)。
    /// - 处理: 检查配置文件。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 触发器配置无效
    ///
    /// - 触发场景: 间隔 <= 0、重复次数为 0、一次性触发时间不是有限数、时区无法识别。
    /// - 只会在构造 Trigger 时返回，不会在触发时返回。
    #[error("Invalid trigger configuration: {0}")]
    InvalidTrigger(String),

    /// Cron 表达式无效
    #[error("Invalid cron expression: {0}")]
    InvalidCron(#[from] cron::error::Error),

    // ==========================================
    // 2. 队列 (Queue)
    // ==========================================
    /// 等待超时，队列中没有到期的事件
    ///
    /// 这不是故障，而是控制流信号。Driver 主循环捕获后继续下一轮。
    #[error("No event became ready within {0:?}.")]
    EmptyQueueTimeout(Duration),

    // ==========================================
    // 3. 分发与执行 (Dispatch & Execution)
    // ==========================================
    /// 调度器已停机，工作池拒绝新的异步分发
    #[error("Scheduler is stopping or stopped, rejecting new dispatches.")]
    SchedulerShutdown,

    /// Handler 执行失败 (返回 Err 或 Panic)
    ///
    /// - 在分发边界被捕获并记录日志，不会传播给主循环或其他 Handler。
    /// - 不会自动重试。
    #[error("Handler '{handler}' failed on event '{event_type}': {message}")]
    HandlerExecution {
        event_type: String,
        handler: String,
        message: String,
    },

    /// 序列化/反序列化失败
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 用户代码未知错误 (Anyhow 包装)
    #[error("User handler error: {0}")]
    UserHandlerError(#[source] anyhow::Error),
}

impl SchedulerError {
    /// 是否是 `get` 超时信号
    pub fn is_timeout(&self) -> bool {
        matches!(self, SchedulerError::EmptyQueueTimeout(_))
    }

    /// 稳定的 snake_case 标签，用于日志字段与指标
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::Config(_) => "config",
            SchedulerError::InvalidTrigger(_) => "invalid_trigger",
            SchedulerError::InvalidCron(_) => "invalid_cron",
            SchedulerError::EmptyQueueTimeout(_) => "empty_queue_timeout",
            SchedulerError::SchedulerShutdown => "scheduler_shutdown",
            SchedulerError::HandlerExecution { .. } => "handler_execution",
            SchedulerError::Serialization(_) => "serialization",
            SchedulerError::UserHandlerError(_) => "user_handler",
        }
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(e: anyhow::Error) -> Self {
        SchedulerError::UserHandlerError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_control_flow() {
        let err = SchedulerError::EmptyQueueTimeout(Duration::from_millis(100));
        assert!(err.is_timeout());
        assert_eq!(err.as_label(), "empty_queue_timeout");
        assert!(!SchedulerError::SchedulerShutdown.is_timeout());
    }

    #[test]
    fn handler_error_message_names_event_and_handler() {
        let err = SchedulerError::HandlerExecution {
            event_type: "greet".into(),
            handler: "append_name".into(),
            message: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Handler 'append_name' failed on event 'greet': boom"
        );
    }
}
