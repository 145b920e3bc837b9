use std::time::Duration;

use crate::core::types::ResourceKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub daily_goal_limit: u32,    // Goal creations per user per UTC day
    pub daily_task_limit: u32,    // Task creations per user per UTC day
    pub daily_session_limit: u32, // Session creations per user per UTC day

    pub op_timeout: Duration,   // Deadline for a single store operation
    pub tx_max_retries: u32,    // Retry bound for transient transaction failures
    pub retry_backoff: Duration, // Base backoff, multiplied by the attempt number

    pub default_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            daily_goal_limit: 10,
            daily_task_limit: 20,
            daily_session_limit: 50,

            op_timeout: Duration::from_secs(3),
            tx_max_retries: 3,
            retry_backoff: Duration::from_millis(50),

            default_page_size: 20,
        }
    }
}

impl Config {
    pub fn quota_limit(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Goal => self.daily_goal_limit,
            ResourceKind::Task => self.daily_task_limit,
            ResourceKind::Session => self.daily_session_limit,
        }
    }
}
