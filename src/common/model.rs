use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::common::{TimeUtils, new_event_id};

/// 事件载荷: 开放的键值映射，值为带标签的 JSON 变体
pub type EventData = HashMap<String, Value>;

/// 默认优先级 (数字越小越先执行)
pub const DEFAULT_PRIORITY: i32 = 10;

/// 默认通道
pub const DEFAULT_CHANNEL: &str = "default";

// ==========================================
// 保留事件类型 (Reserved Event Types)
// ==========================================

/// `start()` 时同步触发一次
pub const ON_INIT: &str = "__init__";
/// `stop()` 时同步触发一次
pub const ON_EXIT: &str = "__exit__";
/// 任务链约定: 上游任务完成通知 (调度器不做特殊处理)
pub const ON_TASK_COMPLETE: &str = "__task_complete__";
/// 请求/应答约定: 应答事件 (调度器不做特殊处理)
pub const ON_REPLY: &str = "__reply__";

/// 事件
///
/// - 在 Publisher, Queue, Scheduler 和 Handler 之间流转的工作单元。
/// - 入队后以 `Arc<Event>` 共享，分发过程中只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 事件 ID (NanoID)，用于日志与应答关联
    pub id: String,

    /// 事件类型，决定由哪些 Handler 处理
    #[serde(rename = "type")]
    pub event_type: String,

    /// 数据载荷
    #[serde(default)]
    pub data: EventData,

    /// 优先级
    /// 同一触发时间下，数字越小越先出队。
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// 逻辑通道 (目前仅供 Handler 参考)
    #[serde(default = "default_channel")]
    pub channel: String,

    /// 应答关联 ID (可为空)
    #[serde(default)]
    pub reply_to: String,

    /// 创建时间 (Unix Timestamp Secs)
    pub created_at: f64,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

impl Event {
    /// 创建一个默认事件
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: new_event_id(),
            event_type: event_type.into(),
            data: EventData::new(),
            priority: DEFAULT_PRIORITY,
            channel: default_channel(),
            reply_to: String::new(),
            created_at: TimeUtils::now_f64(),
        }
    }

    /// 替换整个载荷
    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    /// 添加单个字段
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }

    /// 原始字段
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// 按类型读取字段，缺失或类型不符返回 None
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// 是否是保留的生命周期/约定类型
    pub fn is_reserved(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            ON_INIT | ON_EXIT | ON_TASK_COMPLETE | ON_REPLY
        )
    }

    /// 关联目标: 优先沿用上游的 reply_to，否则指向自身
    fn correlation_id(&self) -> String {
        if self.reply_to.is_empty() {
            self.id.clone()
        } else {
            self.reply_to.clone()
        }
    }

    /// 构造应答事件 (`ON_REPLY`)
    pub fn reply(&self, data: EventData) -> Event {
        Event::new(ON_REPLY)
            .with_data(data)
            .with_channel(self.channel.clone())
            .with_reply_to(self.correlation_id())
    }

    /// 构造任务完成事件 (`ON_TASK_COMPLETE`)，用于任务链
    pub fn task_complete(&self, data: EventData) -> Event {
        Event::new(ON_TASK_COMPLETE)
            .with_data(data)
            .with_channel(self.channel.clone())
            .with_reply_to(self.correlation_id())
    }
}

impl From<&str> for Event {
    fn from(event_type: &str) -> Self {
        Event::new(event_type)
    }
}

impl From<String> for Event {
    fn from(event_type: String) -> Self {
        Event::new(event_type)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults() {
        let ev = Event::new("greet");
        assert_eq!(ev.event_type, "greet");
        assert_eq!(ev.priority, DEFAULT_PRIORITY);
        assert_eq!(ev.channel, "default");
        assert!(ev.reply_to.is_empty());
        assert!(ev.data.is_empty());
        assert!(!ev.is_reserved());
    }

    #[test]
    fn empty_type_is_allowed() {
        let ev: Event = "".into();
        assert_eq!(ev.event_type, "");
    }

    #[test]
    fn typed_field_access() {
        let ev = Event::new("order")
            .with_field("qty", 3)
            .with_field("sku", "A-1");
        assert_eq!(ev.get::<u32>("qty"), Some(3));
        assert_eq!(ev.get::<String>("sku").as_deref(), Some("A-1"));
        assert_eq!(ev.get::<u32>("sku"), None);
        assert_eq!(ev.get::<u32>("missing"), None);
    }

    #[test]
    fn reply_correlates_to_origin() {
        let req = Event::new("quote").with_channel("rpc");
        let reply = req.reply(EventData::from([("px".to_string(), json!(1.5))]));
        assert_eq!(reply.event_type, ON_REPLY);
        assert_eq!(reply.reply_to, req.id);
        assert_eq!(reply.channel, "rpc");
        assert!(reply.is_reserved());

        // 已带 reply_to 的请求沿用原关联 ID
        let forwarded = Event::new("quote").with_reply_to("corr-1");
        assert_eq!(forwarded.task_complete(EventData::new()).reply_to, "corr-1");
    }

    #[test]
    fn serde_uses_type_key() {
        let ev = Event::new("greet").with_field("name", "a");
        let raw = serde_json::to_value(&ev).unwrap();
        assert_eq!(raw["type"], "greet");
        let back: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(back, ev);
    }
}
