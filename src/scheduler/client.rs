use crate::{
    common::{Event, EventData},
    scheduler::{PublishOptions, Scheduler},
    trigger::BoxTrigger,
};

/// 发布端
///
/// 持有调度器句柄，调用方不需要直接依赖 `Scheduler`。
#[derive(Debug, Clone)]
pub struct Publisher {
    scheduler: Scheduler,
}

impl Publisher {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn publish(&self, event: impl Into<Event>, trigger: Option<BoxTrigger>) -> bool {
        self.scheduler.publish(event, trigger)
    }

    pub fn publish_with(&self, event_type: &str, data: EventData, options: PublishOptions) -> bool {
        self.scheduler.publish_with(event_type, data, options)
    }
}

/// 订阅端
///
/// 把外部回调 (行情推送、定时器等) 收到的事件转发进调度器。
#[derive(Debug, Clone)]
pub struct Subscriber {
    scheduler: Scheduler,
}

impl Subscriber {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn on_event(&self, event: impl Into<Event>, trigger: Option<BoxTrigger>) -> bool {
        self.scheduler.publish(event, trigger)
    }

    pub fn on_event_with(&self, event_type: &str, data: EventData, options: PublishOptions) -> bool {
        self.scheduler.publish_with(event_type, data, options)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn facades_forward_to_scheduler_queue() {
        let sched = Scheduler::new();
        let publisher = sched.publisher();
        let subscriber = sched.subscriber();

        assert!(publisher.publish("A", None));
        assert!(subscriber.on_event(Event::new("B").with_priority(1), None));

        let mut data = EventData::new();
        data.insert("price".into(), json!(10.5));
        assert!(subscriber.on_event_with("C", data, PublishOptions::default().with_priority(0)));

        assert_eq!(sched.queue().len(), 3);
        assert_eq!(sched.metrics().published, 3);

        let mut types: Vec<_> = std::iter::from_fn(|| sched.queue().try_get())
            .map(|e| (e.event_type.clone(), e.priority))
            .collect();
        types.sort();
        assert_eq!(
            types,
            vec![("A".to_string(), 10), ("B".to_string(), 1), ("C".to_string(), 0)]
        );
    }
}
