use keystone_core::GuardName;
use keystone_domain::{PermissionId, RoleId};

use super::permissions::PermissionSummary;

/// Role row with its granted permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    /// Store identifier.
    pub role_id: RoleId,
    /// Unique name within the guard scope.
    pub name: String,
    /// Guard scope tag.
    pub guard_name: GuardName,
    /// Granted permissions ordered by name.
    pub permissions: Vec<PermissionSummary>,
    /// Creation timestamp in RFC3339.
    pub created_at: String,
    /// Last update timestamp in RFC3339.
    pub updated_at: String,
}

impl RoleRecord {
    /// Returns whether the role grants no permission.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.permissions.is_empty()
    }
}

/// Role reference embedded in user projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    /// Store identifier.
    pub role_id: RoleId,
    /// Role name.
    pub name: String,
}

impl From<&RoleRecord> for RoleSummary {
    fn from(value: &RoleRecord) -> Self {
        Self {
            role_id: value.role_id,
            name: value.name.clone(),
        }
    }
}

/// Validated role creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Role name.
    pub name: String,
    /// Guard scope tag.
    pub guard_name: GuardName,
    /// Permissions granted on creation.
    pub permission_ids: Vec<PermissionId>,
}

/// Validated role update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChanges {
    /// New role name.
    pub name: String,
    /// Replacement permission set; `None` keeps current grants.
    pub permission_ids: Option<Vec<PermissionId>>,
}
