//! Permission-aware data-access core for a hierarchical activity tracker.
//!
//! Resources form a three-level hierarchy (goals hold tasks, tasks hold
//! sessions). Every operation runs on behalf of a user: visibility and write
//! rights come from per-resource grants that flow down the hierarchy, writes
//! use optimistic concurrency, creation is gated by per-user daily quotas,
//! and listings support weighted full-text search over mixed Han and Latin
//! text with deterministic ordering and pagination.
//!
//! [`tracker::Tracker`] is the entry point; everything else backs it.

pub mod access;
pub mod analysis;
pub mod core;
pub mod index;
pub mod quota;
pub mod search;
pub mod store;
pub mod tracker;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{ResourceId, ResourceKind, Status, UserId};
pub use crate::access::Role;
pub use crate::search::{Filters, Metadata};
pub use crate::tracker::Tracker;
