use std::sync::Arc;

use keystone_core::{AppError, AppResult, DenyReason, UserIdentity};
use keystone_domain::{
    Action, ActorContext, Decision, PolicyEngine, ResourceSnapshot, RoleSet, RoleSnapshot,
    UserId, UserSnapshot,
};
use tracing::warn;

use crate::security_admin_ports::{RoleRecord, UserRecord, UserRepository};


/// Application service resolving actors and applying the policy engine.
///
/// Role membership is loaded from the store on every call; decisions are
/// never cached.
#[derive(Clone)]
pub struct AuthorizationService {
    user_repository: Arc<dyn UserRepository>,
    engine: PolicyEngine,
}

impl AuthorizationService {
    /// Creates a new authorization service from a user repository.
    #[must_use]
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self {
            user_repository,
            engine: PolicyEngine,
        }
    }

    /// Loads the actor's current role set.
    ///
    /// A session pointing at a deleted account is treated as unauthenticated.
    pub async fn actor_context(&self, identity: &UserIdentity) -> AppResult<ActorContext> {
        let user_id = UserId::new(identity.user_id());
        let record = self
            .user_repository
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("session user no longer exists".to_owned()))?;

        Ok(ActorContext::new(user_id, record.role_set()))
    }

    /// Builds a snapshot of a user target, including current Super Admin holders.
    pub async fn user_snapshot(
        &self,
        target: &UserRecord,
        proposed_roles: Option<RoleSet>,
    ) -> AppResult<ResourceSnapshot> {
        let super_admin_holders = self.user_repository.list_super_admin_holders().await?;

        Ok(ResourceSnapshot::User(UserSnapshot {
            user_id: target.user_id,
            is_bootstrap: target.is_bootstrap,
            current_roles: target.role_set(),
            proposed_roles,
            super_admin_holders,
        }))
    }

    /// Builds a snapshot of a role target.
    #[must_use]
    pub fn role_snapshot(target: &RoleRecord, proposed_name: Option<&str>) -> ResourceSnapshot {
        ResourceSnapshot::Role(RoleSnapshot {
            name: target.name.clone(),
            proposed_name: proposed_name.map(str::to_owned),
        })
    }

    /// Ensures the actor may perform the action on the resource.
    ///
    /// Actors holding neither privileged role only ever see `NOT_AUTHORIZED`.
    pub fn require(
        &self,
        actor: &ActorContext,
        action: Action,
        resource: &ResourceSnapshot,
    ) -> AppResult<()> {
        match self.engine.authorize(actor, action, resource) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                warn!(
                    actor_id = %actor.user_id(),
                    %action,
                    reason = reason.as_str(),
                    "policy denied administrative action"
                );

                let visible_reason = if actor.roles().is_privileged() {
                    reason
                } else {
                    DenyReason::NotAuthorized
                };

                Err(AppError::Forbidden(visible_reason))
            }
        }
    }

    /// Loads the actor and checks an action against a target-less collection.
    pub async fn require_collection_action(
        &self,
        identity: &UserIdentity,
        action: Action,
    ) -> AppResult<ActorContext> {
        let actor = self.actor_context(identity).await?;
        self.require(&actor, action, &ResourceSnapshot::Collection)?;
        Ok(actor)
    }
}
