use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::role::Role;
use crate::core::types::{ResourceId, ResourceKind, Status, UserId};
use crate::index::IndexEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRecord {
    pub id: ResourceId,
    pub serial: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub status: Status,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: ResourceId,
    pub serial: i64,
    pub goal_id: ResourceId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub status: Status,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: ResourceId,
    pub serial: i64,
    pub task_id: ResourceId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub notes: String,
    pub status: Status,
    pub version: i32,
}

/// Identifies one daily creation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    pub user: UserId,
    pub kind: ResourceKind,
    pub day: NaiveDate,
}

/// All tables of the embedded store. Cloneable so a transaction can take a
/// rollback image before mutating.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub goals: HashMap<ResourceId, GoalRecord>,
    pub tasks: HashMap<ResourceId, TaskRecord>,
    pub sessions: HashMap<ResourceId, SessionRecord>,
    pub grants: HashMap<(UserId, ResourceKind, ResourceId), Role>,
    pub quotas: HashMap<QuotaKey, u32>,
    pub index: HashMap<(ResourceKind, ResourceId), IndexEntry>,
    next_serial: i64,
}

impl Tables {
    /// Monotonic serial shared across resource kinds, used as the stable
    /// pagination tie-break.
    pub fn next_serial(&mut self) -> i64 {
        self.next_serial += 1;
        self.next_serial
    }

    pub fn grant(&mut self, user: UserId, kind: ResourceKind, id: ResourceId, role: Role) {
        self.grants.insert((user, kind, id), role);
    }

    pub fn revoke(&mut self, user: UserId, kind: ResourceKind, id: ResourceId) {
        self.grants.remove(&(user, kind, id));
    }

    fn drop_resource_refs(&mut self, kind: ResourceKind, id: ResourceId) {
        self.index.remove(&(kind, id));
        self.grants.retain(|(_, k, r), _| !(*k == kind && *r == id));
    }

    /// Deletes a session row together with its grants and index entry.
    pub fn remove_session(&mut self, id: ResourceId) {
        self.sessions.remove(&id);
        self.drop_resource_refs(ResourceKind::Session, id);
    }

    /// Deletes a task and cascades to its sessions.
    pub fn remove_task(&mut self, id: ResourceId) {
        let session_ids: Vec<ResourceId> = self
            .sessions
            .values()
            .filter(|s| s.task_id == id)
            .map(|s| s.id)
            .collect();
        for session_id in session_ids {
            self.remove_session(session_id);
        }
        self.tasks.remove(&id);
        self.drop_resource_refs(ResourceKind::Task, id);
    }

    /// Deletes a goal and cascades to its tasks and their sessions.
    pub fn remove_goal(&mut self, id: ResourceId) {
        let task_ids: Vec<ResourceId> = self
            .tasks
            .values()
            .filter(|t| t.goal_id == id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            self.remove_task(task_id);
        }
        self.goals.remove(&id);
        self.drop_resource_refs(ResourceKind::Goal, id);
    }
}
