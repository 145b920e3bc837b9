use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::access::{self, Role};
use crate::analysis;
use crate::core::error::{Error, Result};
use crate::core::types::{ResourceId, ResourceKind, Status, UserId};
use crate::core::validate::Validator;
use crate::index::IndexEntry;
use crate::search::filters::TASK_SORT_SAFELIST;
use crate::search::{Filters, Hit, Metadata, SortValue, order_and_page, validate_filters};
use crate::store::tables::{Tables, TaskRecord};
use crate::tracker::Tracker;
use crate::tracker::goals::{match_entry, validate_due_date, validate_title};

/// Input for creating a task under a goal.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub goal_id: ResourceId,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub due_date: Option<NaiveDate>,
    pub status: Status,
}

/// Partial update. A `goal_id` re-parents the task, which requires owner
/// rank on both the current and the destination goal.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub expected_version: i32,
    pub goal_id: Option<ResourceId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: ResourceId,
    pub serial: i64,
    pub goal_id: ResourceId,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub version: i32,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListItem {
    pub id: ResourceId,
    pub serial: i64,
    pub goal_id: ResourceId,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub has_notes: bool,
    pub session_count: usize,
    pub version: i32,
    pub role: Role,
}

fn view(record: &TaskRecord, role: Role) -> Task {
    Task {
        id: record.id,
        serial: record.serial,
        goal_id: record.goal_id,
        title: record.title.clone(),
        description: record.description.clone(),
        notes: record.notes.clone(),
        status: record.status,
        due_date: record.due_date,
        created_at: record.created_at,
        updated_at: record.updated_at,
        last_active: record.last_active,
        version: record.version,
        role,
    }
}

fn validate_draft(draft: &TaskDraft) -> Result<()> {
    let mut v = Validator::new();
    validate_title(&mut v, &draft.title);
    validate_due_date(&mut v, draft.due_date);
    v.finish()
}

fn validate_patch(patch: &TaskPatch) -> Result<()> {
    let mut v = Validator::new();
    if let Some(title) = &patch.title {
        validate_title(&mut v, title);
    }
    validate_due_date(&mut v, patch.due_date);
    v.check(
        patch.expected_version >= 1,
        "version",
        "must be a positive integer",
    );
    v.finish()
}

/// Touches a goal's activity timestamp; child writes count as goal activity.
pub(crate) fn touch_goal(tables: &mut Tables, goal_id: ResourceId, now: DateTime<Utc>) {
    if let Some(goal) = tables.goals.get_mut(&goal_id) {
        goal.last_active = now;
    }
}

impl Tracker {
    /// Creates a task under a goal. Editor rank on the goal is required; the
    /// creator becomes owner of the task itself. Counts against the user's
    /// daily task quota.
    pub fn create_task(&self, user: UserId, draft: TaskDraft) -> Result<Task> {
        validate_draft(&draft)?;

        let kind = ResourceKind::Task;
        let limit = self.config.quota_limit(kind);
        let record = self.quota.create_under_quota(user, kind, limit, |tables| {
            if !tables.goals.contains_key(&draft.goal_id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, user, ResourceKind::Goal, draft.goal_id, Role::Editor) {
                return Err(Error::not_found());
            }

            let id = ResourceId::new();
            let now = Utc::now();
            let record = TaskRecord {
                id,
                serial: tables.next_serial(),
                goal_id: draft.goal_id,
                created_at: now,
                updated_at: now,
                last_active: now,
                due_date: draft.due_date,
                title: draft.title.clone(),
                description: draft.description.clone(),
                notes: draft.notes.clone(),
                status: draft.status,
                version: 1,
            };
            tables.index.insert(
                (kind, id),
                IndexEntry::build(&record.title, &record.description, &record.notes),
            );
            tables.tasks.insert(id, record.clone());
            tables.grant(user, kind, id, Role::Owner);
            touch_goal(tables, draft.goal_id, now);
            Ok(record)
        })?;

        tracing::info!(%user, task = %record.id, goal = %record.goal_id, "created task");
        Ok(view(&record, Role::Owner))
    }

    pub fn get_task(&self, user: UserId, id: ResourceId) -> Result<Task> {
        self.engine.snapshot(|tables| {
            let record = tables.tasks.get(&id).ok_or_else(Error::not_found)?;
            let role = access::effective_role(tables, user, ResourceKind::Task, id)
                .ok_or_else(Error::not_found)?;
            Ok(view(record, role))
        })
    }

    /// Applies a patch under optimistic concurrency, as for goals. Moving
    /// the task to another goal additionally requires owner rank on both
    /// goals; lacking it is an edit conflict, a missing destination goal is
    /// not found.
    pub fn update_task(&self, user: UserId, id: ResourceId, patch: TaskPatch) -> Result<Task> {
        validate_patch(&patch)?;

        self.engine.with_tx(|tables| {
            let record = tables.tasks.get(&id).ok_or_else(Error::not_found)?.clone();
            let role = access::effective_role(tables, user, ResourceKind::Task, id)
                .ok_or_else(Error::not_found)?;

            if record.version != patch.expected_version || !role.covers(Role::Editor) {
                return Err(Error::edit_conflict());
            }

            let mut record = record;
            if let Some(new_goal) = patch.goal_id {
                if new_goal != record.goal_id {
                    if !tables.goals.contains_key(&new_goal) {
                        return Err(Error::not_found());
                    }
                    let owns_old =
                        access::resolve(tables, user, ResourceKind::Goal, record.goal_id, Role::Owner);
                    let owns_new =
                        access::resolve(tables, user, ResourceKind::Goal, new_goal, Role::Owner);
                    if !owns_old || !owns_new {
                        return Err(Error::edit_conflict());
                    }
                    record.goal_id = new_goal;
                }
            }
            if let Some(title) = &patch.title {
                record.title = title.clone();
            }
            if let Some(description) = &patch.description {
                record.description = description.clone();
            }
            if let Some(notes) = &patch.notes {
                record.notes = notes.clone();
            }
            if let Some(due_date) = patch.due_date {
                record.due_date = Some(due_date);
            }
            if let Some(status) = patch.status {
                record.status = status;
            }

            let now = Utc::now();
            record.updated_at = now;
            record.last_active = now;
            record.version += 1;

            tables.index.insert(
                (ResourceKind::Task, id),
                IndexEntry::build(&record.title, &record.description, &record.notes),
            );
            touch_goal(tables, record.goal_id, now);
            tables.tasks.insert(id, record.clone());

            Ok(view(&record, role))
        })
    }

    /// Deletes a task and its sessions. Owner rank required.
    pub fn delete_task(&self, user: UserId, id: ResourceId) -> Result<()> {
        self.engine.with_tx(|tables| {
            if !tables.tasks.contains_key(&id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, user, ResourceKind::Task, id, Role::Owner) {
                return Err(Error::not_found());
            }
            tables.remove_task(id);
            tracing::info!(%user, task = %id, "deleted task");
            Ok(())
        })
    }

    /// Lists visible tasks, optionally restricted to one goal.
    pub fn list_tasks(
        &self,
        user: UserId,
        goal: Option<ResourceId>,
        filters: &Filters,
    ) -> Result<(Vec<TaskListItem>, Metadata)> {
        validate_filters(filters, TASK_SORT_SAFELIST, crate::core::types::STATUS_SAFELIST)?;
        let query = analysis::split(&filters.search);

        self.engine.snapshot(|tables| {
            let mut hits = Vec::new();
            for record in tables.tasks.values() {
                if let Some(goal_id) = goal {
                    if record.goal_id != goal_id {
                        continue;
                    }
                }
                let Some(role) = access::effective_role(tables, user, ResourceKind::Task, record.id)
                else {
                    continue;
                };
                if !filters.statuses.is_empty() && !filters.statuses.contains(&record.status) {
                    continue;
                }
                let Some(score) = match_entry(tables, ResourceKind::Task, record.id, &query)
                else {
                    continue;
                };

                let session_count = tables
                    .sessions
                    .values()
                    .filter(|s| s.task_id == record.id)
                    .count();

                hits.push(Hit {
                    sort: task_sort_value(record, filters.sort_field()),
                    score,
                    serial: record.serial,
                    item: TaskListItem {
                        id: record.id,
                        serial: record.serial,
                        goal_id: record.goal_id,
                        title: record.title.clone(),
                        description: record.description.clone(),
                        status: record.status,
                        due_date: record.due_date,
                        created_at: record.created_at,
                        last_active: record.last_active,
                        has_notes: !record.notes.trim().is_empty(),
                        session_count,
                        version: record.version,
                        role,
                    },
                });
            }

            Ok(order_and_page(hits, filters))
        })
    }
}

fn task_sort_value(record: &TaskRecord, field: &str) -> SortValue {
    match field {
        "title" => SortValue::Text(record.title.clone()),
        "created_at" => SortValue::Time(record.created_at),
        "due_date" => SortValue::OptDate(record.due_date),
        "last_active" => SortValue::Time(record.last_active),
        _ => SortValue::Int(record.serial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::error::ErrorKind;
    use crate::tracker::GoalDraft;

    fn tracker() -> Tracker {
        Tracker::new(Config::default())
    }

    fn goal(t: &Tracker, user: UserId, title: &str) -> ResourceId {
        t.create_goal(
            user,
            GoalDraft {
                title: title.to_string(),
                ..GoalDraft::default()
            },
        )
        .unwrap()
        .id
    }

    fn draft(goal_id: ResourceId, title: &str) -> TaskDraft {
        TaskDraft {
            goal_id,
            title: title.to_string(),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn create_requires_editor_on_goal() {
        let t = tracker();
        let owner = UserId::new();
        let viewer = UserId::new();
        let goal_id = goal(&t, owner, "shared");
        t.grant_role(owner, viewer, ResourceKind::Goal, goal_id, Role::Viewer)
            .unwrap();

        let err = t.create_task(viewer, draft(goal_id, "forbidden")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let task = t.create_task(owner, draft(goal_id, "allowed")).unwrap();
        assert_eq!(task.role, Role::Owner);
        assert_eq!(task.goal_id, goal_id);
    }

    #[test]
    fn create_under_missing_goal_is_not_found() {
        let t = tracker();
        let err = t
            .create_task(UserId::new(), draft(ResourceId::new(), "orphan"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn goal_editor_inherits_task_access() {
        let t = tracker();
        let owner = UserId::new();
        let editor = UserId::new();
        let goal_id = goal(&t, owner, "team goal");
        let task = t.create_task(owner, draft(goal_id, "team task")).unwrap();
        t.grant_role(owner, editor, ResourceKind::Goal, goal_id, Role::Editor)
            .unwrap();

        let seen = t.get_task(editor, task.id).unwrap();
        assert_eq!(seen.role, Role::Editor);

        let updated = t
            .update_task(
                editor,
                task.id,
                TaskPatch {
                    expected_version: 1,
                    status: Some(Status::InProgress),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.status, Status::InProgress);
    }

    #[test]
    fn reparent_requires_owner_on_both_goals() {
        let t = tracker();
        let owner = UserId::new();
        let editor = UserId::new();
        let from = goal(&t, owner, "from");
        let to = goal(&t, owner, "to");
        let task = t.create_task(owner, draft(from, "movable")).unwrap();
        t.grant_role(owner, editor, ResourceKind::Goal, from, Role::Editor)
            .unwrap();
        t.grant_role(owner, editor, ResourceKind::Goal, to, Role::Editor)
            .unwrap();

        // An editor may modify the task but not move it.
        let err = t
            .update_task(
                editor,
                task.id,
                TaskPatch {
                    expected_version: 1,
                    goal_id: Some(to),
                    ..TaskPatch::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::EditConflict);

        let moved = t
            .update_task(
                owner,
                task.id,
                TaskPatch {
                    expected_version: 1,
                    goal_id: Some(to),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert_eq!(moved.goal_id, to);
    }

    #[test]
    fn reparent_to_missing_goal_is_not_found() {
        let t = tracker();
        let owner = UserId::new();
        let from = goal(&t, owner, "from");
        let task = t.create_task(owner, draft(from, "movable")).unwrap();

        let err = t
            .update_task(
                owner,
                task.id,
                TaskPatch {
                    expected_version: 1,
                    goal_id: Some(ResourceId::new()),
                    ..TaskPatch::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn child_activity_touches_the_goal() {
        let t = tracker();
        let user = UserId::new();
        let goal_id = goal(&t, user, "parent");
        let before = t.get_goal(user, goal_id).unwrap().last_active;

        t.create_task(user, draft(goal_id, "child")).unwrap();
        let after = t.get_goal(user, goal_id).unwrap().last_active;
        assert!(after >= before);
    }

    #[test]
    fn task_listing_scopes_to_goal() {
        let t = tracker();
        let user = UserId::new();
        let home = goal(&t, user, "home");
        let work = goal(&t, user, "work");
        t.create_task(user, draft(home, "laundry")).unwrap();
        t.create_task(user, draft(work, "report")).unwrap();
        t.create_task(user, draft(work, "standup")).unwrap();

        let (all, metadata) = t.list_tasks(user, None, &Filters::default()).unwrap();
        assert_eq!(metadata.total_records, 3);
        assert_eq!(all.len(), 3);

        let (scoped, metadata) = t.list_tasks(user, Some(work), &Filters::default()).unwrap();
        assert_eq!(metadata.total_records, 2);
        assert!(scoped.iter().all(|task| task.goal_id == work));
    }

    #[test]
    fn deleting_a_task_removes_its_sessions() {
        let t = tracker();
        let user = UserId::new();
        let goal_id = goal(&t, user, "parent");
        let task = t.create_task(user, draft(goal_id, "with session")).unwrap();
        let session = t
            .create_session(
                user,
                crate::tracker::SessionDraft {
                    task_id: task.id,
                    starts_at: Utc::now(),
                    status: Status::InProgress,
                    ..crate::tracker::SessionDraft::default()
                },
            )
            .unwrap();

        t.delete_task(user, task.id).unwrap();
        assert_eq!(
            t.get_session(user, session.id).unwrap_err().kind,
            ErrorKind::NotFound
        );
    }
}
