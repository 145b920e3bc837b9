use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::{self, Role};
use crate::analysis;
use crate::core::error::{Error, Result};
use crate::core::types::{ResourceId, ResourceKind, SESSION_STATUS_SAFELIST, Status, UserId};
use crate::core::validate::{Validator, permitted_value};
use crate::index::IndexEntry;
use crate::search::filters::SESSION_SORT_SAFELIST;
use crate::search::{Filters, Hit, Metadata, SortValue, order_and_page, validate_filters};
use crate::store::tables::{SessionRecord, Tables};
use crate::tracker::Tracker;
use crate::tracker::goals::match_entry;
use crate::tracker::tasks::touch_goal;

/// Input for logging a work session under a task.
#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub task_id: ResourceId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub status: Status,
}

impl Default for SessionDraft {
    fn default() -> Self {
        SessionDraft {
            task_id: ResourceId::new(),
            starts_at: Utc::now(),
            ends_at: None,
            notes: String::new(),
            status: Status::InProgress,
        }
    }
}

/// Partial update. Moving the session to another task requires owner rank
/// on both tasks.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub expected_version: i32,
    pub task_id: Option<ResourceId>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: ResourceId,
    pub serial: i64,
    pub task_id: ResourceId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListItem {
    pub id: ResourceId,
    pub serial: i64,
    pub task_id: ResourceId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub has_notes: bool,
    pub version: i32,
    pub role: Role,
}

fn view(record: &SessionRecord, role: Role) -> Session {
    Session {
        id: record.id,
        serial: record.serial,
        task_id: record.task_id,
        starts_at: record.starts_at,
        ends_at: record.ends_at,
        notes: record.notes.clone(),
        status: record.status,
        created_at: record.created_at,
        updated_at: record.updated_at,
        version: record.version,
        role,
    }
}

fn validate_times(
    v: &mut Validator,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
) {
    if let Some(ends) = ends_at {
        v.check(ends > starts_at, "ends_at", "must be after starts_at");
    }
}

fn validate_status(v: &mut Validator, status: Status) {
    v.check(
        permitted_value(&status, SESSION_STATUS_SAFELIST),
        "status",
        "must be a valid session status",
    );
}

fn validate_draft(draft: &SessionDraft) -> Result<()> {
    let mut v = Validator::new();
    validate_times(&mut v, draft.starts_at, draft.ends_at);
    validate_status(&mut v, draft.status);
    v.finish()
}

fn validate_patch(patch: &SessionPatch) -> Result<()> {
    let mut v = Validator::new();
    if let Some(status) = patch.status {
        validate_status(&mut v, status);
    }
    v.check(
        patch.expected_version >= 1,
        "version",
        "must be a positive integer",
    );
    v.finish()
}

/// Session activity counts as activity on the task and its goal.
fn touch_task(tables: &mut Tables, task_id: ResourceId, now: DateTime<Utc>) {
    let goal_id = match tables.tasks.get_mut(&task_id) {
        Some(task) => {
            task.last_active = now;
            task.goal_id
        }
        None => return,
    };
    touch_goal(tables, goal_id, now);
}

impl Tracker {
    /// Logs a session under a task. Editor rank on the task is required; the
    /// creator becomes owner of the session. Counts against the user's daily
    /// session quota.
    pub fn create_session(&self, user: UserId, draft: SessionDraft) -> Result<Session> {
        validate_draft(&draft)?;

        let kind = ResourceKind::Session;
        let limit = self.config.quota_limit(kind);
        let record = self.quota.create_under_quota(user, kind, limit, |tables| {
            if !tables.tasks.contains_key(&draft.task_id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, user, ResourceKind::Task, draft.task_id, Role::Editor) {
                return Err(Error::not_found());
            }

            let id = ResourceId::new();
            let now = Utc::now();
            let record = SessionRecord {
                id,
                serial: tables.next_serial(),
                task_id: draft.task_id,
                starts_at: draft.starts_at,
                ends_at: draft.ends_at,
                created_at: now,
                updated_at: now,
                notes: draft.notes.clone(),
                status: draft.status,
                version: 1,
            };
            tables
                .index
                .insert((kind, id), IndexEntry::notes_only(&record.notes));
            tables.sessions.insert(id, record.clone());
            tables.grant(user, kind, id, Role::Owner);
            touch_task(tables, draft.task_id, now);
            Ok(record)
        })?;

        tracing::info!(%user, session = %record.id, task = %record.task_id, "created session");
        Ok(view(&record, Role::Owner))
    }

    pub fn get_session(&self, user: UserId, id: ResourceId) -> Result<Session> {
        self.engine.snapshot(|tables| {
            let record = tables.sessions.get(&id).ok_or_else(Error::not_found)?;
            let role = access::effective_role(tables, user, ResourceKind::Session, id)
                .ok_or_else(Error::not_found)?;
            Ok(view(record, role))
        })
    }

    /// Applies a patch under optimistic concurrency. The time-order rule is
    /// checked against the patched record, so a patch may adjust either end
    /// of the interval as long as the result stays ordered.
    pub fn update_session(
        &self,
        user: UserId,
        id: ResourceId,
        patch: SessionPatch,
    ) -> Result<Session> {
        validate_patch(&patch)?;

        self.engine.with_tx(|tables| {
            let record = tables.sessions.get(&id).ok_or_else(Error::not_found)?.clone();
            let role = access::effective_role(tables, user, ResourceKind::Session, id)
                .ok_or_else(Error::not_found)?;

            if record.version != patch.expected_version || !role.covers(Role::Editor) {
                return Err(Error::edit_conflict());
            }

            let mut record = record;
            if let Some(new_task) = patch.task_id {
                if new_task != record.task_id {
                    if !tables.tasks.contains_key(&new_task) {
                        return Err(Error::not_found());
                    }
                    let owns_old =
                        access::resolve(tables, user, ResourceKind::Task, record.task_id, Role::Owner);
                    let owns_new =
                        access::resolve(tables, user, ResourceKind::Task, new_task, Role::Owner);
                    if !owns_old || !owns_new {
                        return Err(Error::edit_conflict());
                    }
                    record.task_id = new_task;
                }
            }
            if let Some(starts_at) = patch.starts_at {
                record.starts_at = starts_at;
            }
            if let Some(ends_at) = patch.ends_at {
                record.ends_at = Some(ends_at);
            }
            if let Some(notes) = &patch.notes {
                record.notes = notes.clone();
            }
            if let Some(status) = patch.status {
                record.status = status;
            }

            let mut v = Validator::new();
            validate_times(&mut v, record.starts_at, record.ends_at);
            v.finish()?;

            let now = Utc::now();
            record.updated_at = now;
            record.version += 1;

            tables.index.insert(
                (ResourceKind::Session, id),
                IndexEntry::notes_only(&record.notes),
            );
            touch_task(tables, record.task_id, now);
            tables.sessions.insert(id, record.clone());

            Ok(view(&record, role))
        })
    }

    /// Deletes a session. Owner rank required.
    pub fn delete_session(&self, user: UserId, id: ResourceId) -> Result<()> {
        self.engine.with_tx(|tables| {
            if !tables.sessions.contains_key(&id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, user, ResourceKind::Session, id, Role::Owner) {
                return Err(Error::not_found());
            }
            tables.remove_session(id);
            tracing::info!(%user, session = %id, "deleted session");
            Ok(())
        })
    }

    /// Lists visible sessions, optionally restricted to one task. Search
    /// runs over session notes, which also supply the relevance score.
    pub fn list_sessions(
        &self,
        user: UserId,
        task: Option<ResourceId>,
        filters: &Filters,
    ) -> Result<(Vec<SessionListItem>, Metadata)> {
        validate_filters(filters, SESSION_SORT_SAFELIST, SESSION_STATUS_SAFELIST)?;
        let query = analysis::split(&filters.search);

        self.engine.snapshot(|tables| {
            let mut hits = Vec::new();
            for record in tables.sessions.values() {
                if let Some(task_id) = task {
                    if record.task_id != task_id {
                        continue;
                    }
                }
                let Some(role) =
                    access::effective_role(tables, user, ResourceKind::Session, record.id)
                else {
                    continue;
                };
                if !filters.statuses.is_empty() && !filters.statuses.contains(&record.status) {
                    continue;
                }
                let Some(score) = match_entry(tables, ResourceKind::Session, record.id, &query)
                else {
                    continue;
                };

                hits.push(Hit {
                    sort: session_sort_value(record, filters.sort_field()),
                    score,
                    serial: record.serial,
                    item: SessionListItem {
                        id: record.id,
                        serial: record.serial,
                        task_id: record.task_id,
                        starts_at: record.starts_at,
                        ends_at: record.ends_at,
                        status: record.status,
                        created_at: record.created_at,
                        updated_at: record.updated_at,
                        has_notes: !record.notes.trim().is_empty(),
                        version: record.version,
                        role,
                    },
                });
            }

            Ok(order_and_page(hits, filters))
        })
    }
}

fn session_sort_value(record: &SessionRecord, field: &str) -> SortValue {
    match field {
        "starts_at" => SortValue::Time(record.starts_at),
        "created_at" => SortValue::Time(record.created_at),
        "updated_at" => SortValue::Time(record.updated_at),
        _ => SortValue::Int(record.serial),
    }
}
