pub mod goals;
pub mod sessions;
pub mod tasks;

use std::sync::Arc;

use crate::access::{self, Role};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{ResourceId, ResourceKind, UserId};
use crate::quota::QuotaCoordinator;
use crate::store::engine::Engine;

pub use goals::{Goal, GoalDraft, GoalListItem, GoalPatch};
pub use sessions::{Session, SessionDraft, SessionListItem, SessionPatch};
pub use tasks::{Task, TaskDraft, TaskListItem, TaskPatch};

/// Facade over the data-access core. One instance owns the embedded store;
/// it is cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct Tracker {
    pub(crate) engine: Arc<Engine>,
    pub(crate) config: Config,
    pub(crate) quota: QuotaCoordinator,
}

impl Tracker {
    /// Listing defaults with the configured page size applied.
    pub fn default_filters(&self) -> crate::search::Filters {
        crate::search::Filters {
            page_size: self.config.default_page_size,
            ..crate::search::Filters::default()
        }
    }

    pub fn new(config: Config) -> Self {
        let engine = Arc::new(Engine::new(config.op_timeout));
        let quota = QuotaCoordinator::new(
            engine.clone(),
            config.tx_max_retries,
            config.retry_backoff,
        );
        Tracker {
            engine,
            config,
            quota,
        }
    }

    /// Grants `role` on a resource to `user`. The caller must hold the owner
    /// rank on the resource (directly or inherited); otherwise the resource
    /// is reported as not found, exactly as it is to callers with no access.
    pub fn grant_role(
        &self,
        caller: UserId,
        user: UserId,
        kind: ResourceKind,
        id: ResourceId,
        role: Role,
    ) -> Result<()> {
        self.engine.with_tx(|tables| {
            if !resource_exists(tables, kind, id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, caller, kind, id, Role::Owner) {
                return Err(Error::not_found());
            }
            tables.grant(user, kind, id, role);
            tracing::info!(%caller, %user, %kind, %id, role = role.as_str(), "granted role");
            Ok(())
        })
    }

    /// Removes `user`'s direct grant on a resource. Inherited grants are
    /// untouched; revoke them where they were granted.
    pub fn revoke_role(
        &self,
        caller: UserId,
        user: UserId,
        kind: ResourceKind,
        id: ResourceId,
    ) -> Result<()> {
        self.engine.with_tx(|tables| {
            if !resource_exists(tables, kind, id) {
                return Err(Error::not_found());
            }
            if !access::resolve(tables, caller, kind, id, Role::Owner) {
                return Err(Error::not_found());
            }
            tables.revoke(user, kind, id);
            tracing::info!(%caller, %user, %kind, %id, "revoked role");
            Ok(())
        })
    }
}

fn resource_exists(
    tables: &crate::store::tables::Tables,
    kind: ResourceKind,
    id: ResourceId,
) -> bool {
    match kind {
        ResourceKind::Goal => tables.goals.contains_key(&id),
        ResourceKind::Task => tables.tasks.contains_key(&id),
        ResourceKind::Session => tables.sessions.contains_key(&id),
    }
}
