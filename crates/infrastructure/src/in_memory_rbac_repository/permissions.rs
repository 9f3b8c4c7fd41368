use async_trait::async_trait;
use keystone_application::{Page, PageRequest, PermissionChanges, PermissionRepository};

use super::*;

impl RbacTables {
    fn ensure_unique_permission(
        &self,
        guard_name: &GuardName,
        name: &str,
        except: Option<i64>,
    ) -> AppResult<()> {
        let duplicate = self.permissions.iter().any(|(permission_id, permission)| {
            Some(*permission_id) != except
                && permission.guard_name == *guard_name
                && permission.name == name
        });
        if duplicate {
            return Err(taken("name"));
        }
        Ok(())
    }
}

fn missing_permission(permission_id: i64) -> AppError {
    AppError::NotFound(format!("permission '{permission_id}' does not exist"))
}

#[async_trait]
impl PermissionRepository for InMemoryRbacRepository {
    async fn list_permissions(&self, page: PageRequest) -> AppResult<Page<PermissionRecord>> {
        let tables = self.tables.read().await;
        let items = tables
            .permissions
            .keys()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.per_page()).unwrap_or(usize::MAX))
            .filter_map(|permission_id| tables.permission_record(*permission_id))
            .collect();

        Ok(Page::new(page, items, tables.permissions.len() as u64))
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .permission_record(permission_id.get()))
    }

    async fn find_permission_by_name(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<PermissionRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .iter()
            .find(|(_, permission)| permission.guard_name == *guard_name && permission.name == name)
            .and_then(|(permission_id, _)| tables.permission_record(*permission_id)))
    }

    async fn find_existing_permission_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<BTreeSet<PermissionId>> {
        let tables = self.tables.read().await;
        Ok(permission_ids
            .iter()
            .copied()
            .filter(|permission_id| tables.permissions.contains_key(&permission_id.get()))
            .collect())
    }

    async fn list_all_permission_ids(
        &self,
        guard_name: &GuardName,
    ) -> AppResult<Vec<PermissionId>> {
        Ok(self
            .tables
            .read()
            .await
            .permissions
            .iter()
            .filter(|(_, permission)| permission.guard_name == *guard_name)
            .map(|(permission_id, _)| PermissionId::new(*permission_id))
            .collect())
    }

    async fn create_permission(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<PermissionRecord> {
        let mut tables = self.tables.write().await;
        tables.ensure_unique_permission(guard_name, name, None)?;

        tables.next_permission_id += 1;
        let permission_id = tables.next_permission_id;
        let timestamp = now();
        tables.permissions.insert(
            permission_id,
            StoredNamed {
                name: name.to_owned(),
                guard_name: guard_name.clone(),
                created_at: timestamp.clone(),
                updated_at: timestamp,
            },
        );

        tables
            .permission_record(permission_id)
            .ok_or_else(|| missing_permission(permission_id))
    }

    async fn update_permission(
        &self,
        permission_id: PermissionId,
        changes: PermissionChanges,
    ) -> AppResult<PermissionRecord> {
        let mut tables = self.tables.write().await;
        let permission_id = permission_id.get();
        let guard_name = tables
            .permissions
            .get(&permission_id)
            .map(|permission| permission.guard_name.clone())
            .ok_or_else(|| missing_permission(permission_id))?;
        tables.ensure_unique_permission(&guard_name, &changes.name, Some(permission_id))?;

        if let Some(permission) = tables.permissions.get_mut(&permission_id) {
            permission.name = changes.name;
            permission.updated_at = now();
        }

        tables
            .permission_record(permission_id)
            .ok_or_else(|| missing_permission(permission_id))
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let permission_id = permission_id.get();
        if tables.permissions.remove(&permission_id).is_none() {
            return Err(missing_permission(permission_id));
        }

        tables
            .role_permissions
            .retain(|(_, stored_permission)| *stored_permission != permission_id);
        Ok(())
    }
}
