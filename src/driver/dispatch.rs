use std::{panic::AssertUnwindSafe, sync::Arc, time::Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::{
    common::{Context, Event, HandlerRef, SchedulerError},
    driver::SchedulerPlugin,
};

/// 单次 Handler 调用的结果
pub type HandlerResult = std::result::Result<Value, SchedulerError>;

/// 插件链 (按添加顺序执行)
pub(crate) type PluginChain = Arc<Vec<Box<dyn SchedulerPlugin>>>;

/// 分发句柄
///
/// - 同步分发返回 `Ready`，结果已经算好。
/// - 异步分发返回 `Pending`，任务已交给工作池，`wait()` 取结果。
#[derive(Debug)]
pub enum DispatchHandle {
    Ready {
        handler: String,
        result: HandlerResult,
    },
    Pending {
        handler: String,
        join: JoinHandle<HandlerResult>,
    },
}

impl DispatchHandle {
    pub fn handler(&self) -> &str {
        match self {
            DispatchHandle::Ready { handler, .. } | DispatchHandle::Pending { handler, .. } => {
                handler
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            DispatchHandle::Ready { .. } => true,
            DispatchHandle::Pending { join, .. } => join.is_finished(),
        }
    }

    /// 取得调用结果
    pub async fn wait(self) -> HandlerResult {
        match self {
            DispatchHandle::Ready { result, .. } => result,
            DispatchHandle::Pending { handler, join } => match join.await {
                Ok(result) => result,
                // invoke 内部已经捕获了 Panic，这里只会是运行时取消
                Err(e) => Err(SchedulerError::HandlerExecution {
                    event_type: String::new(),
                    handler,
                    message: e.to_string(),
                }),
            },
        }
    }
}

/// 从 Panic 载荷里提取信息
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Panic: {}", s)
    } else {
        "Panic: Unknown error".to_string()
    }
}

// ==========================================
// Core Logic: 单个 Handler 的隔离执行
// ==========================================

/// 执行一个 Handler
///
/// Err 和 Panic 都在这里被捕获、记录，转换成 `HandlerExecution`，
/// 不会传播给主循环，也不会影响同一事件的其他 Handler。
pub(crate) async fn invoke(
    plugins: &[Box<dyn SchedulerPlugin>],
    handler: HandlerRef,
    ctx: Arc<Context>,
    event: Arc<Event>,
) -> HandlerResult {
    let name = handler.name().to_string();
    for p in plugins.iter() {
        p.before_handler(&event, &name).await;
    }

    let start = Instant::now();
    let outcome = AssertUnwindSafe(handler.handle(ctx, event.clone()))
        .catch_unwind()
        .await;
    let duration = start.elapsed().as_secs_f64();

    let result = match outcome {
        Ok(Ok(value)) => {
            trace!(event_type = %event.event_type, handler = %name, duration, "Handler finished.");
            Ok(value)
        }
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            error!(
                event_type = %event.event_type,
                event_id = %event.id,
                handler = %name,
                "Handler failed: {}", message
            );
            Err(SchedulerError::HandlerExecution {
                event_type: event.event_type.clone(),
                handler: name.clone(),
                message,
            })
        }
        Err(panic_err) => {
            let message = panic_message(panic_err.as_ref());
            error!(
                event_type = %event.event_type,
                event_id = %event.id,
                handler = %name,
                "Handler panicked: {}", message
            );
            Err(SchedulerError::HandlerExecution {
                event_type: event.event_type.clone(),
                handler: name.clone(),
                message,
            })
        }
    };

    let ok = result.is_ok();
    for p in plugins.iter() {
        p.after_handler(&event, &name, duration, ok).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::common::handler_fn;

    #[tokio::test]
    async fn error_is_captured_with_identity() {
        let h = handler_fn("fails", |_ctx, _ev| async {
            Err::<(), _>(anyhow::anyhow!("bad input"))
        });
        let res = invoke(&[], h, Arc::new(Context::new()), Arc::new(Event::new("X"))).await;
        match res {
            Err(SchedulerError::HandlerExecution {
                event_type,
                handler,
                message,
            }) => {
                assert_eq!(event_type, "X");
                assert_eq!(handler, "fails");
                assert_eq!(message, "bad input");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn panic_is_captured() {
        let h = handler_fn("explodes", |_ctx, _ev| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        let res = invoke(&[], h, Arc::new(Context::new()), Arc::new(Event::new("X"))).await;
        let err = res.unwrap_err();
        assert!(err.to_string().contains("Panic: kaboom"));
    }

    #[tokio::test]
    async fn ready_handle_yields_value() {
        let handle = DispatchHandle::Ready {
            handler: "h".into(),
            result: Ok(json!(1)),
        };
        assert!(handle.is_ready());
        assert_eq!(handle.handler(), "h");
        assert_eq!(handle.wait().await.unwrap(), json!(1));
    }
}
