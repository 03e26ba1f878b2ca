use std::{fmt, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::common::{Context, Event};

// ==========================================
// 核心 Handler 接口 (EventHandler)
// ==========================================

/// 事件处理器接口
///
/// - `ctx`: 调度器共享上下文 (分发时刻的快照)。
/// - `event`: 当前事件，只读共享。
///
/// 返回 `anyhow::Result<Value>`:
/// - `Ok(val)`: 处理成功，`val` 会出现在分发结果里。
/// - `Err(e)`: 处理失败。调度器捕获并记录日志，不影响其他 Handler，不重试。
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handler 标识，用于日志
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, ctx: Arc<Context>, event: Arc<Event>) -> anyhow::Result<Value>;
}

/// 注册表里保存的 Handler 引用
///
/// 同一性按 `Arc` 指针判断: 同一个 `HandlerRef` 重复注册是 no-op。
pub type HandlerRef = Arc<dyn EventHandler>;

// ==========================================
// 闭包包装器 (FnHandler)
// ==========================================

/// 把异步闭包包装成 `EventHandler`
///
/// 闭包返回值只要求 `Serialize`，由包装器统一转换为 `Value`。
pub struct FnHandler<F, R> {
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> R>,
}

impl<F, R> FnHandler<F, R> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, R> fmt::Debug for FnHandler<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut, R> EventHandler for FnHandler<F, R>
where
    F: Fn(Arc<Context>, Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: Arc<Context>, event: Arc<Event>) -> anyhow::Result<Value> {
        let out = (self.func)(ctx, event).await?;
        Ok(serde_json::to_value(out)?)
    }
}

/// 快捷构造: 闭包 -> `HandlerRef`
pub fn handler_fn<F, Fut, R>(name: impl Into<String>, func: F) -> HandlerRef
where
    F: Fn(Arc<Context>, Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    Arc::new(FnHandler::new(name, func))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo;

    #[async_trait]
    impl EventHandler for Echo {
        async fn handle(&self, _ctx: Arc<Context>, event: Arc<Event>) -> anyhow::Result<Value> {
            Ok(json!(event.event_type))
        }
    }

    #[tokio::test]
    async fn struct_handler_default_name() {
        let h: HandlerRef = Arc::new(Echo);
        assert!(h.name().ends_with("Echo"));
        let out = h
            .handle(Arc::new(Context::new()), Arc::new(Event::new("ping")))
            .await
            .unwrap();
        assert_eq!(out, json!("ping"));
    }

    #[tokio::test]
    async fn closure_output_is_serialized() {
        let h = handler_fn("double", |_ctx, ev: Arc<Event>| async move {
            let n: i64 = ev.get("n").unwrap_or(0);
            Ok(n * 2)
        });
        assert_eq!(h.name(), "double");
        let ev = Arc::new(Event::new("calc").with_field("n", 21));
        let out = h.handle(Arc::new(Context::new()), ev).await.unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn unit_output_becomes_null() {
        let h = handler_fn("noop", |_ctx, _ev| async { Ok(()) });
        let out = h
            .handle(Arc::new(Context::new()), Arc::new(Event::new("x")))
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
    }
}
