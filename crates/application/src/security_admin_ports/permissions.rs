use keystone_core::GuardName;
use keystone_domain::PermissionId;

/// Permission row returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    /// Store identifier.
    pub permission_id: PermissionId,
    /// Unique name within the guard scope.
    pub name: String,
    /// Guard scope tag.
    pub guard_name: GuardName,
    /// Creation timestamp in RFC3339.
    pub created_at: String,
    /// Last update timestamp in RFC3339.
    pub updated_at: String,
}

/// Permission reference embedded in role projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSummary {
    /// Store identifier.
    pub permission_id: PermissionId,
    /// Permission name.
    pub name: String,
}

impl From<&PermissionRecord> for PermissionSummary {
    fn from(value: &PermissionRecord) -> Self {
        Self {
            permission_id: value.permission_id,
            name: value.name.clone(),
        }
    }
}

/// Validated permission update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionChanges {
    /// New permission name.
    pub name: String,
}
