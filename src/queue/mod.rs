pub mod core;
pub(crate) mod entry;

pub use self::core::EventQueue;
