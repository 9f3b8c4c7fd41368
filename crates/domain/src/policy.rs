//! Pure authorization decisions for administrative actions.
//!
//! The engine holds no state. Callers pass the actor's freshly loaded role
//! set and a snapshot of the targeted resource; the decision is a function of
//! those inputs only.

use std::collections::BTreeSet;

use keystone_core::DenyReason;
use serde::{Deserialize, Serialize};

use crate::rbac::{Action, ManagedResource, OWNER_ROLE, Operation, RoleSet, SUPER_ADMIN_ROLE};
use crate::user::UserId;

/// The authenticated principal performing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    user_id: UserId,
    roles: RoleSet,
}

impl ActorContext {
    /// Creates an actor context from a user id and their current role names.
    #[must_use]
    pub fn new(user_id: UserId, roles: RoleSet) -> Self {
        Self { user_id, roles }
    }

    /// Returns the actor's user id.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the actor's role names.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }
}

/// Authorization outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action is refused for the given reason.
    Deny(DenyReason),
}

impl Decision {
    /// Returns whether the decision allows the action.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// State of a targeted user relevant to protection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    /// Targeted user.
    pub user_id: UserId,
    /// Whether the target is the bootstrap identity.
    pub is_bootstrap: bool,
    /// Role names the target holds now.
    pub current_roles: RoleSet,
    /// Role names the target would hold after an update, if roles change.
    pub proposed_roles: Option<RoleSet>,
    /// Every user currently holding the Super Admin role.
    pub super_admin_holders: BTreeSet<UserId>,
}

impl UserSnapshot {
    fn drops_role(&self, role: &str) -> bool {
        self.current_roles.contains(role)
            && self
                .proposed_roles
                .as_ref()
                .is_some_and(|proposed| !proposed.contains(role))
    }

    fn adds_role(&self, role: &str) -> bool {
        !self.current_roles.contains(role)
            && self
                .proposed_roles
                .as_ref()
                .is_some_and(|proposed| proposed.contains(role))
    }
}

/// State of a targeted role relevant to protection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSnapshot {
    /// Current role name.
    pub name: String,
    /// Name after an update, if the update renames the role.
    pub proposed_name: Option<String>,
}

/// Resource the action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSnapshot {
    /// A listing or a create, with no existing target.
    Collection,
    /// A user about to be created with the given roles.
    NewUser(RoleSet),
    /// An existing user.
    User(UserSnapshot),
    /// An existing role.
    Role(RoleSnapshot),
    /// An existing permission.
    Permission,
}

/// Stateless evaluator of administrative authorization rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    /// Decides whether the actor may perform the action on the resource.
    ///
    /// Rule order: self-deletion, bootstrap deletion, capability, Super Admin
    /// membership, last admin, bootstrap demotion, self-demotion, Super Admin
    /// role protection.
    #[must_use]
    pub fn authorize(
        &self,
        actor: &ActorContext,
        action: Action,
        resource: &ResourceSnapshot,
    ) -> Decision {
        let operation = action.operation();

        if let ResourceSnapshot::User(target) = resource
            && operation == Operation::Delete
        {
            if target.user_id == actor.user_id {
                return Decision::Deny(DenyReason::SelfDeletion);
            }
            if target.is_bootstrap {
                return Decision::Deny(DenyReason::BootstrapProtected);
            }
        }

        if !Self::is_capable(actor.roles(), action.resource()) {
            return Decision::Deny(DenyReason::NotAuthorized);
        }

        // Only Super Admin holders may grant, revoke or remove Super Admin membership.
        if !actor.roles().has_super_admin() && Self::touches_super_admin(operation, resource) {
            return Decision::Deny(DenyReason::NotAuthorized);
        }

        match resource {
            ResourceSnapshot::User(target) => Self::check_user_target(actor, operation, target),
            ResourceSnapshot::Role(target) => Self::check_role_target(operation, target),
            ResourceSnapshot::Collection
            | ResourceSnapshot::NewUser(_)
            | ResourceSnapshot::Permission => Decision::Allow,
        }
    }

    fn touches_super_admin(operation: Operation, resource: &ResourceSnapshot) -> bool {
        match resource {
            ResourceSnapshot::NewUser(roles) => roles.has_super_admin(),
            ResourceSnapshot::User(target) => match operation {
                Operation::Delete => target.current_roles.has_super_admin(),
                Operation::Update => {
                    target.drops_role(SUPER_ADMIN_ROLE) || target.adds_role(SUPER_ADMIN_ROLE)
                }
                Operation::View | Operation::Create => false,
            },
            ResourceSnapshot::Collection
            | ResourceSnapshot::Role(_)
            | ResourceSnapshot::Permission => false,
        }
    }

    /// Super Admin may manage everything; Owner may manage users only.
    fn is_capable(roles: &RoleSet, resource: ManagedResource) -> bool {
        roles.has_super_admin() || (resource == ManagedResource::User && roles.has_owner())
    }

    fn check_user_target(
        actor: &ActorContext,
        operation: Operation,
        target: &UserSnapshot,
    ) -> Decision {
        let removes_super_admin = match operation {
            Operation::Delete => target.current_roles.has_super_admin(),
            Operation::Update => target.drops_role(SUPER_ADMIN_ROLE),
            Operation::View | Operation::Create => false,
        };

        if removes_super_admin {
            let mut remaining = target.super_admin_holders.clone();
            remaining.remove(&target.user_id);
            if remaining.is_empty() {
                return Decision::Deny(DenyReason::LastAdminProtected);
            }
        }

        if operation != Operation::Update {
            return Decision::Allow;
        }

        if target.is_bootstrap && target.drops_role(SUPER_ADMIN_ROLE) {
            return Decision::Deny(DenyReason::BootstrapProtected);
        }

        if target.user_id == actor.user_id
            && actor
                .roles()
                .iter()
                .filter(|role| is_privileged_role(role))
                .any(|role| target.drops_role(role))
        {
            return Decision::Deny(DenyReason::SelfDemotion);
        }

        Decision::Allow
    }

    fn check_role_target(operation: Operation, target: &RoleSnapshot) -> Decision {
        if target.name != SUPER_ADMIN_ROLE {
            return Decision::Allow;
        }

        let renames = target
            .proposed_name
            .as_deref()
            .is_some_and(|proposed| proposed != SUPER_ADMIN_ROLE);

        match operation {
            Operation::Delete => Decision::Deny(DenyReason::SystemRoleProtected),
            Operation::Update if renames => Decision::Deny(DenyReason::SystemRoleProtected),
            _ => Decision::Allow,
        }
    }
}

fn is_privileged_role(role: &str) -> bool {
    role == SUPER_ADMIN_ROLE || role == OWNER_ROLE
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use keystone_core::DenyReason;
    use proptest::prelude::*;

    use super::{ActorContext, Decision, PolicyEngine, ResourceSnapshot, RoleSnapshot, UserSnapshot};
    use crate::rbac::{Action, OWNER_ROLE, RoleSet, SUPER_ADMIN_ROLE};
    use crate::user::UserId;

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().copied().collect()
    }

    fn actor(id: i64, names: &[&str]) -> ActorContext {
        ActorContext::new(UserId::new(id), roles(names))
    }

    fn user_target(id: i64, current: &[&str], holders: &[i64]) -> UserSnapshot {
        UserSnapshot {
            user_id: UserId::new(id),
            is_bootstrap: false,
            current_roles: roles(current),
            proposed_roles: None,
            super_admin_holders: holders.iter().copied().map(UserId::new).collect(),
        }
    }

    fn authorize(actor: &ActorContext, action: Action, resource: &ResourceSnapshot) -> Decision {
        PolicyEngine.authorize(actor, action, resource)
    }

    #[test]
    fn super_admin_may_do_everything_on_collections() {
        let admin = actor(1, &[SUPER_ADMIN_ROLE]);
        for action in Action::all() {
            assert_eq!(
                authorize(&admin, *action, &ResourceSnapshot::Collection),
                Decision::Allow
            );
        }
    }

    #[test]
    fn owner_may_only_manage_users() {
        let owner = actor(2, &[OWNER_ROLE]);
        assert!(authorize(&owner, Action::CREATE_USER, &ResourceSnapshot::Collection).is_allowed());
        assert_eq!(
            authorize(&owner, Action::CREATE_ROLE, &ResourceSnapshot::Collection),
            Decision::Deny(DenyReason::NotAuthorized)
        );
        assert_eq!(
            authorize(&owner, Action::VIEW_PERMISSIONS, &ResourceSnapshot::Collection),
            Decision::Deny(DenyReason::NotAuthorized)
        );
    }

    #[test]
    fn super_admin_cannot_delete_self() {
        let admin = actor(1, &[SUPER_ADMIN_ROLE]);
        let target = user_target(1, &[SUPER_ADMIN_ROLE], &[1, 2]);
        assert_eq!(
            authorize(&admin, Action::DELETE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::SelfDeletion)
        );
    }

    #[test]
    fn bootstrap_identity_cannot_be_deleted() {
        let admin = actor(2, &[SUPER_ADMIN_ROLE]);
        let mut target = user_target(1, &[SUPER_ADMIN_ROLE], &[1, 2]);
        target.is_bootstrap = true;
        assert_eq!(
            authorize(&admin, Action::DELETE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::BootstrapProtected)
        );
    }

    #[test]
    fn bootstrap_identity_cannot_be_demoted() {
        let admin = actor(2, &[SUPER_ADMIN_ROLE]);
        let mut target = user_target(1, &[SUPER_ADMIN_ROLE], &[1, 2]);
        target.is_bootstrap = true;
        target.proposed_roles = Some(roles(&["Sales"]));
        assert_eq!(
            authorize(&admin, Action::UPDATE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::BootstrapProtected)
        );
    }

    #[test]
    fn sole_super_admin_revoking_own_role_hits_last_admin_rule() {
        let admin = actor(1, &[SUPER_ADMIN_ROLE]);
        let mut target = user_target(1, &[SUPER_ADMIN_ROLE], &[1]);
        target.is_bootstrap = true;
        target.proposed_roles = Some(RoleSet::new());
        assert_eq!(
            authorize(&admin, Action::UPDATE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::LastAdminProtected)
        );
    }

    #[test]
    fn deleting_last_holder_is_denied() {
        // Holder list loaded before the actor's own membership was revoked.
        let admin = actor(5, &[SUPER_ADMIN_ROLE]);
        let target = user_target(1, &[SUPER_ADMIN_ROLE], &[1]);
        assert_eq!(
            authorize(&admin, Action::DELETE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::LastAdminProtected)
        );
    }

    #[test]
    fn owner_cannot_delete_super_admin_holder() {
        let owner = actor(5, &[OWNER_ROLE]);
        let target = user_target(1, &[SUPER_ADMIN_ROLE], &[1, 2]);
        assert_eq!(
            authorize(&owner, Action::DELETE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::NotAuthorized)
        );
    }

    #[test]
    fn owner_cannot_grant_super_admin() {
        let owner = actor(3, &[OWNER_ROLE]);
        let mut own_profile = user_target(3, &[OWNER_ROLE], &[1]);
        own_profile.proposed_roles = Some(roles(&[OWNER_ROLE, SUPER_ADMIN_ROLE]));
        assert_eq!(
            authorize(&owner, Action::UPDATE_USER, &ResourceSnapshot::User(own_profile)),
            Decision::Deny(DenyReason::NotAuthorized)
        );

        let new_user = ResourceSnapshot::NewUser(roles(&[SUPER_ADMIN_ROLE]));
        assert_eq!(
            authorize(&owner, Action::CREATE_USER, &new_user),
            Decision::Deny(DenyReason::NotAuthorized)
        );

        let plain_user = ResourceSnapshot::NewUser(roles(&["Sales"]));
        assert!(authorize(&owner, Action::CREATE_USER, &plain_user).is_allowed());
    }

    #[test]
    fn owner_cannot_revoke_super_admin() {
        let owner = actor(3, &[OWNER_ROLE]);
        let mut target = user_target(1, &[SUPER_ADMIN_ROLE, "Sales"], &[1, 2]);
        target.proposed_roles = Some(roles(&["Sales"]));
        assert_eq!(
            authorize(&owner, Action::UPDATE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::NotAuthorized)
        );

        // Profile edits that keep the membership stay within Owner's reach.
        let untouched = user_target(1, &[SUPER_ADMIN_ROLE], &[1, 2]);
        assert!(
            authorize(&owner, Action::UPDATE_USER, &ResourceSnapshot::User(untouched))
                .is_allowed()
        );
    }

    #[test]
    fn self_demotion_is_denied_when_other_holders_exist() {
        let admin = actor(1, &[SUPER_ADMIN_ROLE, OWNER_ROLE]);
        let mut target = user_target(1, &[SUPER_ADMIN_ROLE, OWNER_ROLE], &[1, 2]);
        target.proposed_roles = Some(roles(&[SUPER_ADMIN_ROLE]));
        assert_eq!(
            authorize(&admin, Action::UPDATE_USER, &ResourceSnapshot::User(target)),
            Decision::Deny(DenyReason::SelfDemotion)
        );
    }

    #[test]
    fn updating_own_profile_fields_is_allowed() {
        let owner = actor(3, &[OWNER_ROLE]);
        let target = user_target(3, &[OWNER_ROLE], &[1]);
        assert_eq!(
            authorize(&owner, Action::UPDATE_USER, &ResourceSnapshot::User(target)),
            Decision::Allow
        );
    }

    #[test]
    fn adding_roles_to_self_is_allowed() {
        let owner = actor(3, &[OWNER_ROLE]);
        let mut target = user_target(3, &[OWNER_ROLE], &[1]);
        target.proposed_roles = Some(roles(&[OWNER_ROLE, "Sales"]));
        assert!(
            authorize(&owner, Action::UPDATE_USER, &ResourceSnapshot::User(target)).is_allowed()
        );
    }

    #[test]
    fn super_admin_role_cannot_be_deleted_or_renamed() {
        let admin = actor(1, &[SUPER_ADMIN_ROLE]);
        let delete = ResourceSnapshot::Role(RoleSnapshot {
            name: SUPER_ADMIN_ROLE.to_owned(),
            proposed_name: None,
        });
        assert_eq!(
            authorize(&admin, Action::DELETE_ROLE, &delete),
            Decision::Deny(DenyReason::SystemRoleProtected)
        );

        let rename = ResourceSnapshot::Role(RoleSnapshot {
            name: SUPER_ADMIN_ROLE.to_owned(),
            proposed_name: Some("Root".to_owned()),
        });
        assert_eq!(
            authorize(&admin, Action::UPDATE_ROLE, &rename),
            Decision::Deny(DenyReason::SystemRoleProtected)
        );

        let keep_name = ResourceSnapshot::Role(RoleSnapshot {
            name: SUPER_ADMIN_ROLE.to_owned(),
            proposed_name: Some(SUPER_ADMIN_ROLE.to_owned()),
        });
        assert!(authorize(&admin, Action::UPDATE_ROLE, &keep_name).is_allowed());
    }

    #[test]
    fn other_roles_can_be_deleted() {
        let admin = actor(1, &[SUPER_ADMIN_ROLE]);
        let resource = ResourceSnapshot::Role(RoleSnapshot {
            name: "Sales".to_owned(),
            proposed_name: None,
        });
        assert!(authorize(&admin, Action::DELETE_ROLE, &resource).is_allowed());
    }

    fn arb_role_names() -> impl Strategy<Value = Vec<&'static str>> {
        prop::collection::vec(
            prop_oneof![
                Just("Admin"),
                Just("Sales"),
                Just("Finance"),
                Just("NOC"),
                Just("super admin"),
                Just("owner"),
            ],
            0..5,
        )
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop::sample::select(Action::all().to_vec())
    }

    proptest! {
        #[test]
        fn unprivileged_actors_are_always_denied(
            names in arb_role_names(),
            action in arb_action(),
            target_id in 1_i64..20,
        ) {
            let unprivileged = actor(99, &names);
            let resources = [
                ResourceSnapshot::Collection,
                ResourceSnapshot::Permission,
                ResourceSnapshot::NewUser(RoleSet::new()),
                ResourceSnapshot::User(user_target(target_id, &[], &[1])),
                ResourceSnapshot::Role(RoleSnapshot { name: "Sales".to_owned(), proposed_name: None }),
            ];

            for resource in &resources {
                prop_assert!(!authorize(&unprivileged, action, resource).is_allowed());
            }
        }

        #[test]
        fn self_deletion_is_always_denied(
            names in arb_role_names(),
            privileged in prop_oneof![Just(SUPER_ADMIN_ROLE), Just(OWNER_ROLE)],
            id in 1_i64..1000,
        ) {
            let mut names = names;
            names.push(privileged);
            let current = actor(id, &names);
            let target = user_target(id, &names, &[id, id + 1]);
            prop_assert_eq!(
                authorize(&current, Action::DELETE_USER, &ResourceSnapshot::User(target)),
                Decision::Deny(DenyReason::SelfDeletion)
            );
        }

        #[test]
        fn super_admin_removal_is_denied_iff_no_holder_remains(
            holders in prop::collection::btree_set(1_i64..8, 1..5),
            pick in any::<prop::sample::Index>(),
            delete in any::<bool>(),
        ) {
            let holders: Vec<i64> = holders.into_iter().collect();
            let target_id = holders[pick.index(holders.len())];
            let admin = actor(100, &[SUPER_ADMIN_ROLE]);
            let mut target = user_target(target_id, &[SUPER_ADMIN_ROLE], &holders);
            let action = if delete {
                Action::DELETE_USER
            } else {
                target.proposed_roles = Some(RoleSet::new());
                Action::UPDATE_USER
            };

            let remaining: BTreeSet<i64> =
                holders.iter().copied().filter(|id| *id != target_id).collect();
            let decision = authorize(&admin, action, &ResourceSnapshot::User(target));

            if remaining.is_empty() {
                prop_assert_eq!(decision, Decision::Deny(DenyReason::LastAdminProtected));
            } else {
                prop_assert_eq!(decision, Decision::Allow);
            }
        }
    }
}
