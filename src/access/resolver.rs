use crate::access::role::Role;
use crate::core::types::{ResourceId, ResourceKind, UserId};
use crate::store::tables::Tables;

/// The hierarchy is at most three levels deep, so an ancestor chain never
/// holds more than the resource itself plus two ancestors.
const MAX_CHAIN: usize = 3;

/// The resource itself followed by its ancestors, root last. Unknown ids
/// yield a chain holding only the resource, which then resolves to no
/// access.
pub fn ancestor_chain(
    tables: &Tables,
    kind: ResourceKind,
    id: ResourceId,
) -> Vec<(ResourceKind, ResourceId)> {
    let mut chain = Vec::with_capacity(MAX_CHAIN);
    chain.push((kind, id));

    match kind {
        ResourceKind::Goal => {}
        ResourceKind::Task => {
            if let Some(task) = tables.tasks.get(&id) {
                chain.push((ResourceKind::Goal, task.goal_id));
            }
        }
        ResourceKind::Session => {
            if let Some(session) = tables.sessions.get(&id) {
                chain.push((ResourceKind::Task, session.task_id));
                if let Some(task) = tables.tasks.get(&session.task_id) {
                    chain.push((ResourceKind::Goal, task.goal_id));
                }
            }
        }
    }

    chain
}

/// Effective role a user holds on a resource: the minimum rank among the
/// user's grants on the resource and on every ancestor, resolved in one pass
/// over the bounded chain. `None` means no applicable grant at all.
pub fn effective_role(
    tables: &Tables,
    user: UserId,
    kind: ResourceKind,
    id: ResourceId,
) -> Option<Role> {
    ancestor_chain(tables, kind, id)
        .into_iter()
        .filter_map(|(k, r)| tables.grants.get(&(user, k, r)).copied())
        .min_by_key(|role| role.rank())
}

/// True iff the user's effective role on the resource covers `required`.
/// Absence of any grant is "no access", not an error.
pub fn resolve(
    tables: &Tables,
    user: UserId,
    kind: ResourceKind,
    id: ResourceId,
    required: Role,
) -> bool {
    effective_role(tables, user, kind, id)
        .map(|role| role.covers(required))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Status;
    use crate::store::tables::{GoalRecord, SessionRecord, TaskRecord};
    use chrono::Utc;

    struct Fixture {
        tables: Tables,
        goal: ResourceId,
        task: ResourceId,
        session: ResourceId,
    }

    fn fixture() -> Fixture {
        let mut tables = Tables::default();
        let now = Utc::now();
        let goal = ResourceId::new();
        let task = ResourceId::new();
        let session = ResourceId::new();

        let serial = tables.next_serial();
        tables.goals.insert(
            goal,
            GoalRecord {
                id: goal,
                serial,
                created_at: now,
                updated_at: now,
                last_active: now,
                due_date: None,
                title: "goal".to_string(),
                description: String::new(),
                notes: String::new(),
                status: Status::Queued,
                version: 1,
            },
        );
        let serial = tables.next_serial();
        tables.tasks.insert(
            task,
            TaskRecord {
                id: task,
                serial,
                goal_id: goal,
                created_at: now,
                updated_at: now,
                last_active: now,
                due_date: None,
                title: "task".to_string(),
                description: String::new(),
                notes: String::new(),
                status: Status::Queued,
                version: 1,
            },
        );
        let serial = tables.next_serial();
        tables.sessions.insert(
            session,
            SessionRecord {
                id: session,
                serial,
                task_id: task,
                starts_at: now,
                ends_at: None,
                created_at: now,
                updated_at: now,
                notes: String::new(),
                status: Status::InProgress,
                version: 1,
            },
        );

        Fixture {
            tables,
            goal,
            task,
            session,
        }
    }

    #[test]
    fn no_grant_resolves_to_no_access() {
        let f = fixture();
        let stranger = UserId::new();
        assert!(!resolve(&f.tables, stranger, ResourceKind::Goal, f.goal, Role::Viewer));
        assert_eq!(
            effective_role(&f.tables, stranger, ResourceKind::Session, f.session),
            None
        );
    }

    #[test]
    fn goal_grant_is_inherited_by_descendants() {
        let mut f = fixture();
        let user = UserId::new();
        f.tables.grant(user, ResourceKind::Goal, f.goal, Role::Editor);

        assert!(resolve(&f.tables, user, ResourceKind::Task, f.task, Role::Editor));
        assert!(resolve(&f.tables, user, ResourceKind::Session, f.session, Role::Viewer));
        assert!(!resolve(&f.tables, user, ResourceKind::Task, f.task, Role::Owner));
    }

    #[test]
    fn strongest_grant_along_the_chain_wins() {
        let mut f = fixture();
        let user = UserId::new();
        f.tables.grant(user, ResourceKind::Goal, f.goal, Role::Viewer);
        f.tables.grant(user, ResourceKind::Task, f.task, Role::Owner);

        assert_eq!(
            effective_role(&f.tables, user, ResourceKind::Session, f.session),
            Some(Role::Owner)
        );
        assert_eq!(
            effective_role(&f.tables, user, ResourceKind::Goal, f.goal),
            Some(Role::Viewer)
        );
    }

    #[test]
    fn direct_grant_does_not_leak_upward() {
        let mut f = fixture();
        let user = UserId::new();
        f.tables.grant(user, ResourceKind::Session, f.session, Role::Owner);

        assert!(!resolve(&f.tables, user, ResourceKind::Task, f.task, Role::Viewer));
        assert!(!resolve(&f.tables, user, ResourceKind::Goal, f.goal, Role::Viewer));
        assert!(resolve(&f.tables, user, ResourceKind::Session, f.session, Role::Owner));
    }

    #[test]
    fn chain_is_bounded_by_hierarchy_depth() {
        let f = fixture();
        assert_eq!(ancestor_chain(&f.tables, ResourceKind::Goal, f.goal).len(), 1);
        assert_eq!(ancestor_chain(&f.tables, ResourceKind::Task, f.task).len(), 2);
        assert_eq!(
            ancestor_chain(&f.tables, ResourceKind::Session, f.session).len(),
            3
        );
    }
}
