use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::access::{self, Role};
use crate::analysis;
use crate::core::error::{Error, Result};
use crate::core::types::{ResourceId, ResourceKind, Status, UserId};
use crate::core::validate::{Validator, clean_unicode};
use crate::index::IndexEntry;
use crate::search::filters::GOAL_SORT_SAFELIST;
use crate::search::{Filters, Hit, Metadata, SortValue, order_and_page, validate_filters};
use crate::store::tables::{GoalRecord, Tables};
use crate::tracker::Tracker;

pub(crate) const MAX_TITLE_CHARS: usize = 200;

/// Input for creating a goal.
#[derive(Debug, Clone, Default)]
pub struct GoalDraft {
    pub title: String,
    pub description: String,
    pub notes: String,
    pub due_date: Option<NaiveDate>,
    pub status: Status,
}

/// Partial update. `None` fields are left unchanged; `expected_version` must
/// match the stored version for the update to apply.
#[derive(Debug, Clone, Default)]
pub struct GoalPatch {
    pub expected_version: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<Status>,
}

/// A goal as seen by one caller, carrying that caller's effective role.
#[derive(Debug, Clone, Serialize)]
pub struct Goal {
    pub id: ResourceId,
    pub serial: i64,
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

/// Listing row: no notes body, but whether notes exist and how many tasks
/// hang under the goal.
#[derive(Debug, Clone, Serialize)]
pub struct GoalListItem {
    pub id: ResourceId,
    pub serial: i64,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub has_notes: bool,
    pub task_count: usize,
    pub version: i32,
    pub role: Role,
}

fn view(record: &GoalRecord, role: Role) -> Goal {
    Goal {
        id: record.id,
        serial: record.serial,
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

pub(crate) fn validate_title(v: &mut Validator, title: &str) {
    v.check(!title.trim().is_empty(), "title", "must be provided");
    v.check(
        title.chars().count() <= MAX_TITLE_CHARS,
        "title",
        "must not be more than 200 characters long",
    );
    v.check(
        clean_unicode(title),
        "title",
        "must not contain control or invisible characters",
    );
}

pub(crate) fn validate_due_date(v: &mut Validator, due_date: Option<NaiveDate>) {
    if let Some(date) = due_date {
        v.check(
            date >= Utc::now().date_naive(),
            "due_date",
            "must not be in the past",
        );
    }
}

fn validate_draft(draft: &GoalDraft) -> Result<()> {
    let mut v = Validator::new();
    validate_title(&mut v, &draft.title);
    validate_due_date(&mut v, draft.due_date);
    v.finish()
}

fn validate_patch(patch: &GoalPatch) -> Result<()> {
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

impl Tracker {
    /// Creates a goal for `user`, who becomes its owner. Counts against the
    /// user's daily goal quota.
    pub fn create_goal(&self, user: UserId, draft: GoalDraft) -> Result<Goal> {
        validate_draft(&draft)?;

        let kind = ResourceKind::Goal;
        let limit = self.config.quota_limit(kind);
        let record = self.quota.create_under_quota(user, kind, limit, |tables| {
            let id = ResourceId::new();
            let now = Utc::now();
            let record = GoalRecord {
                id,
                serial: tables.next_serial(),
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
            tables.goals.insert(id, record.clone());
            tables.grant(user, kind, id, Role::Owner);
            Ok(record)
        })?;

        tracing::info!(%user, goal = %record.id, "created goal");
        Ok(view(&record, Role::Owner))
    }

    /// Fetches one goal. Callers without at least viewer access get the same
    /// not-found answer as for an id that does not exist.
    pub fn get_goal(&self, user: UserId, id: ResourceId) -> Result<Goal> {
        self.engine.snapshot(|tables| {
            let record = tables.goals.get(&id).ok_or_else(Error::not_found)?;
            let role = access::effective_role(tables, user, ResourceKind::Goal, id)
                .ok_or_else(Error::not_found)?;
            Ok(view(record, role))
        })
    }

    /// Applies a patch under optimistic concurrency: the stored version must
    /// equal `expected_version` and the caller must hold editor rank, or the
    /// update fails as an edit conflict.
    pub fn update_goal(&self, user: UserId, id: ResourceId, patch: GoalPatch) -> Result<Goal> {
        validate_patch(&patch)?;

        self.engine.with_tx(|tables| {
            let record = tables.goals.get(&id).ok_or_else(Error::not_found)?.clone();
            let role = access::effective_role(tables, user, ResourceKind::Goal, id)
                .ok_or_else(Error::not_found)?;

            if record.version != patch.expected_version || !role.covers(Role::Editor) {
                return Err(Error::edit_conflict());
            }

            let mut record = record;
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
                (ResourceKind::Goal, id),
                IndexEntry::build(&record.title, &record.description, &record.notes),
            );
            tables.goals.insert(id, record.clone());

            Ok(view(&record, role))
        })
    }

    /// Deletes a goal and everything under it. Owner rank is required; any
    /// lesser access gets the not-found answer.
    pub fn delete_goal(&self, user: UserId, id: ResourceId) -> Result<()> {
        self.engine.with_tx(|tables| {
            if !tables.goals.contains_key(&id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, user, ResourceKind::Goal, id, Role::Owner) {
                return Err(Error::not_found());
            }
            tables.remove_goal(id);
            tracing::info!(%user, goal = %id, "deleted goal");
            Ok(())
        })
    }

    /// Lists the goals visible to `user`, filtered, ranked and paged.
    pub fn list_goals(
        &self,
        user: UserId,
        filters: &Filters,
    ) -> Result<(Vec<GoalListItem>, Metadata)> {
        validate_filters(filters, GOAL_SORT_SAFELIST, crate::core::types::STATUS_SAFELIST)?;
        let query = analysis::split(&filters.search);

        self.engine.snapshot(|tables| {
            let mut hits = Vec::new();
            for record in tables.goals.values() {
                let Some(role) = access::effective_role(tables, user, ResourceKind::Goal, record.id)
                else {
                    continue;
                };
                if !filters.statuses.is_empty() && !filters.statuses.contains(&record.status) {
                    continue;
                }
                let Some(score) = match_entry(tables, ResourceKind::Goal, record.id, &query)
                else {
                    continue;
                };

                let task_count = tables
                    .tasks
                    .values()
                    .filter(|t| t.goal_id == record.id)
                    .count();

                hits.push(Hit {
                    sort: goal_sort_value(record, filters.sort_field()),
                    score,
                    serial: record.serial,
                    item: GoalListItem {
                        id: record.id,
                        serial: record.serial,
                        title: record.title.clone(),
                        description: record.description.clone(),
                        status: record.status,
                        due_date: record.due_date,
                        created_at: record.created_at,
                        last_active: record.last_active,
                        has_notes: !record.notes.trim().is_empty(),
                        task_count,
                        version: record.version,
                        role,
                    },
                });
            }

            Ok(order_and_page(hits, filters))
        })
    }
}

/// Returns the relevance score when the resource's index entry matches the
/// query, `None` when it does not. Resources with no entry match only the
/// empty query.
pub(crate) fn match_entry(
    tables: &Tables,
    kind: ResourceKind,
    id: ResourceId,
    query: &analysis::ScriptStreams,
) -> Option<f32> {
    match tables.index.get(&(kind, id)) {
        Some(entry) if entry.matches(query) => Some(if kind == ResourceKind::Session {
            entry.notes_relevance(query)
        } else {
            entry.relevance(query)
        }),
        Some(_) => None,
        None if query.is_empty() => Some(0.0),
        None => None,
    }
}

fn goal_sort_value(record: &GoalRecord, field: &str) -> SortValue {
    match field {
        "title" => SortValue::Text(record.title.clone()),
        "created_at" => SortValue::Time(record.created_at),
        "due_date" => SortValue::OptDate(record.due_date),
        "last_active" => SortValue::Time(record.last_active),
        _ => SortValue::Int(record.serial),
    }
}
