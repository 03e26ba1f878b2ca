pub mod builder;
pub mod client;
pub mod core;
pub mod module;
pub mod registry;

pub use builder::SchedulerBuilder;
pub use client::{Publisher, Subscriber};
pub use self::core::{PublishOptions, Scheduler, SchedulerState};
pub use module::HandlerModule;
pub use registry::HandlerRegistry;
