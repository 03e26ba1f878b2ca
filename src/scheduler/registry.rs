use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;

use crate::common::HandlerRef;

/// Handler 注册表
///
/// `event_type -> [handler...]`，列表顺序即同步分发时的执行顺序。
/// 写入 (register/unregister) 很少，读取 (每次分发) 很频繁：
/// 分发时取一份快照，迭代过程中不持有任何锁。
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<String, Vec<HandlerRef>, RandomState>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(DashMap::with_hasher(RandomState::new())),
        }
    }

    /// 追加一个 Handler
    ///
    /// 同一个 Handler (同一个 `Arc`) 对同一类型重复注册是 no-op，返回 `false`。
    pub fn register(&self, event_type: &str, handler: HandlerRef) -> bool {
        let mut list = self.handlers.entry(event_type.to_string()).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        list.push(handler);
        true
    }

    /// 移除 Handler
    ///
    /// - `Some(h)`: 只移除这一个。
    /// - `None`: 清空该类型的全部 Handler。
    ///
    /// 返回移除的数量。
    pub fn unregister(&self, event_type: &str, handler: Option<&HandlerRef>) -> usize {
        match handler {
            None => self
                .handlers
                .remove(event_type)
                .map_or(0, |(_, list)| list.len()),
            Some(target) => {
                let Some(mut list) = self.handlers.get_mut(event_type) else {
                    return 0;
                };
                let before = list.len();
                list.retain(|h| !Arc::ptr_eq(h, target));
                let removed = before - list.len();
                let now_empty = list.is_empty();
                drop(list);
                if now_empty {
                    self.handlers.remove_if(event_type, |_, l| l.is_empty());
                }
                removed
            }
        }
    }

    /// 快照 (分发用)
    pub fn handlers(&self, event_type: &str) -> Vec<HandlerRef> {
        self.handlers
            .get(event_type)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.handlers
            .get(event_type)
            .is_some_and(|list| !list.is_empty())
    }

    /// 已注册的事件类型
    pub fn event_types(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    /// Handler 总数
    pub fn len(&self) -> usize {
        self.handlers.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
