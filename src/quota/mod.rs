pub mod coordinator;
pub mod retry;

pub use coordinator::QuotaCoordinator;
pub use retry::retry_transient;
