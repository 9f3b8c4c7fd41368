use async_trait::async_trait;
use keystone_application::{NewRole, Page, PageRequest, RoleChanges, RoleRepository};

use super::*;

impl RbacTables {
    fn ensure_unique_role(&self, guard_name: &GuardName, name: &str, except: Option<i64>) -> AppResult<()> {
        let duplicate = self.roles.iter().any(|(role_id, role)| {
            Some(*role_id) != except && role.guard_name == *guard_name && role.name == name
        });
        if duplicate {
            return Err(taken("name"));
        }
        Ok(())
    }

    fn replace_role_permissions(&mut self, role_id: i64, permission_ids: &[PermissionId]) {
        self.role_permissions
            .retain(|(stored_role, _)| *stored_role != role_id);
        for permission_id in permission_ids {
            if self.permissions.contains_key(&permission_id.get()) {
                self.role_permissions.insert((role_id, permission_id.get()));
            }
        }
    }

    fn reload_role(&self, role_id: i64) -> AppResult<RoleRecord> {
        self.role_record(role_id)
            .ok_or_else(|| missing_role(role_id))
    }
}

fn missing_role(role_id: i64) -> AppError {
    AppError::NotFound(format!("role '{role_id}' does not exist"))
}

#[async_trait]
impl RoleRepository for InMemoryRbacRepository {
    async fn list_roles(&self, page: PageRequest) -> AppResult<Page<RoleRecord>> {
        let tables = self.tables.read().await;
        let items = tables
            .roles
            .keys()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.per_page()).unwrap_or(usize::MAX))
            .filter_map(|role_id| tables.role_record(*role_id))
            .collect();

        Ok(Page::new(page, items, tables.roles.len() as u64))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleRecord>> {
        Ok(self.tables.read().await.role_record(role_id.get()))
    }

    async fn find_role_by_name(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<RoleRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .find(|(_, role)| role.guard_name == *guard_name && role.name == name)
            .and_then(|(role_id, _)| tables.role_record(*role_id)))
    }

    async fn find_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<RoleSummary>> {
        let tables = self.tables.read().await;
        let requested: BTreeSet<i64> = role_ids.iter().map(|role_id| role_id.get()).collect();

        Ok(requested
            .into_iter()
            .filter_map(|role_id| {
                tables.roles.get(&role_id).map(|role| RoleSummary {
                    role_id: RoleId::new(role_id),
                    name: role.name.clone(),
                })
            })
            .collect())
    }

    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord> {
        let mut tables = self.tables.write().await;
        tables.ensure_unique_role(&input.guard_name, &input.name, None)?;

        tables.next_role_id += 1;
        let role_id = tables.next_role_id;
        let timestamp = now();
        tables.roles.insert(
            role_id,
            StoredNamed {
                name: input.name,
                guard_name: input.guard_name,
                created_at: timestamp.clone(),
                updated_at: timestamp,
            },
        );
        tables.replace_role_permissions(role_id, &input.permission_ids);

        tables.reload_role(role_id)
    }

    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<RoleRecord> {
        let mut tables = self.tables.write().await;
        let role_id = role_id.get();
        let guard_name = tables
            .roles
            .get(&role_id)
            .map(|role| role.guard_name.clone())
            .ok_or_else(|| missing_role(role_id))?;
        tables.ensure_unique_role(&guard_name, &changes.name, Some(role_id))?;

        if let Some(role) = tables.roles.get_mut(&role_id) {
            role.name = changes.name;
            role.updated_at = now();
        }
        if let Some(permission_ids) = changes.permission_ids.as_deref() {
            tables.replace_role_permissions(role_id, permission_ids);
        }

        tables.reload_role(role_id)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let role_id = role_id.get();

        tables.guarded_write(|tables| {
            if tables.roles.remove(&role_id).is_none() {
                return Err(missing_role(role_id));
            }
            tables
                .user_roles
                .retain(|(_, stored_role)| *stored_role != role_id);
            tables
                .role_permissions
                .retain(|(stored_role, _)| *stored_role != role_id);
            Ok(())
        })
    }

    async fn set_permissions_for_role(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<RoleRecord> {
        let mut tables = self.tables.write().await;
        let role_id = role_id.get();
        if !tables.roles.contains_key(&role_id) {
            return Err(missing_role(role_id));
        }

        tables.replace_role_permissions(role_id, permission_ids);
        tables.reload_role(role_id)
    }
}
