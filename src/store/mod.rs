pub mod engine;
pub mod tables;

pub use engine::Engine;
pub use tables::{GoalRecord, QuotaKey, SessionRecord, Tables, TaskRecord};
