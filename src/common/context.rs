use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::common::error::Result;

// 扩展容器类型
type Extensions = DashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// 共享上下文
///
/// 调度器生命周期内所有 Handler 调用共享同一个 Context。
/// - 键值区: `DashMap`，分片锁，Handler 可以并发读写，无需外部加锁。
/// - 扩展区: 按类型注入的依赖 (数据库连接池、HTTP Client 等)。
#[derive(Default)]
pub struct Context {
    values: DashMap<String, Value>,
    extensions: Extensions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.value().clone())
    }

    /// 按类型读取，缺失或类型不符返回 None
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.value().clone()).ok())
    }

    /// 写入任意可序列化的值
    pub fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn set_value(&self, key: &str, value: Value) -> Option<Value> {
        self.values.insert(key.to_string(), value)
    }

    /// 原子地读-改-写
    ///
    /// 闭包在该键所在分片的写锁内执行，并发调用不会丢失更新。
    /// 键不存在时闭包收到 `Value::Null`。
    pub fn update<F>(&self, key: &str, f: F) -> Value
    where
        F: FnOnce(&Value) -> Value,
    {
        let mut entry = self.values.entry(key.to_string()).or_insert(Value::Null);
        let next = f(entry.value());
        *entry.value_mut() = next.clone();
        next
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.iter().map(|e| e.key().clone()).collect()
    }

    /// [依赖注入] 按类型放入扩展
    pub fn insert_extension<E: Send + Sync + 'static>(&self, val: E) {
        self.extensions.insert(TypeId::of::<E>(), Arc::new(val));
    }

    /// 按类型取出扩展
    pub fn extension<E: Send + Sync + 'static>(&self) -> Option<Arc<E>> {
        let any = self.extensions.get(&TypeId::of::<E>())?.value().clone();
        any.downcast::<E>().ok()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
