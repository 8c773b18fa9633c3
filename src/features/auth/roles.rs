use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::error::Result;
use crate::features::auth::model::Role;
use crate::modules::supabase::{Auth, Query, SupabaseClient};
use crate::shared::constants::TABLE_USER_ROLES;

/// Row of the `user_roles` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleRow {
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Resolves users to one of the fixed roles
pub struct RoleService {
    client: Arc<SupabaseClient>,
}

impl RoleService {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// Look up the role row for `user_id`, if one exists
    pub async fn find_role(&self, access_token: &str, user_id: &str) -> Result<Option<Role>> {
        let row: Option<UserRoleRow> = self
            .client
            .select_optional(
                Auth::User(access_token),
                TABLE_USER_ROLES,
                &Query::new()
                    .select("user_id,role,created_at,updated_at")
                    .eq("user_id", user_id),
            )
            .await?;

        Ok(row.map(|r| r.role))
    }

    /// Resolve the caller's role, defaulting to owner
    ///
    /// When no row exists a default `owner` row is inserted best-effort.
    /// Returns the role and whether a row already existed.
    pub async fn resolve(&self, access_token: &str, user_id: &str) -> Result<(Role, bool)> {
        if let Some(role) = self.find_role(access_token, user_id).await? {
            return Ok((role, true));
        }

        tracing::info!("No role found for user {}, assigning default owner role", user_id);
        self.assign_default(access_token, user_id).await;
        Ok((Role::Owner, false))
    }

    /// Insert the default owner row; failures are logged, never returned
    pub async fn assign_default(&self, access_token: &str, user_id: &str) {
        let now = Utc::now();
        let result: Result<UserRoleRow> = self
            .client
            .insert(
                Auth::User(access_token),
                TABLE_USER_ROLES,
                &json!({
                    "user_id": user_id,
                    "role": Role::Owner,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await;

        if let Err(e) = result {
            tracing::warn!("Failed to assign default role to {}: {}", user_id, e);
        }
    }

    /// Set the role of `user_id`, creating or replacing its row
    pub async fn assign(&self, access_token: &str, user_id: &str, role: Role) -> Result<UserRoleRow> {
        let row = self
            .client
            .upsert(
                Auth::User(access_token),
                TABLE_USER_ROLES,
                &json!({
                    "user_id": user_id,
                    "role": role,
                    "updated_at": Utc::now(),
                }),
                "user_id",
            )
            .await?;

        tracing::info!("Role {} assigned to user {}", role, user_id);
        Ok(row)
    }

    pub async fn list(&self, access_token: &str) -> Result<Vec<UserRoleRow>> {
        self.client
            .select(
                Auth::User(access_token),
                TABLE_USER_ROLES,
                &Query::new()
                    .select("user_id,role,created_at,updated_at")
                    .order("created_at", false),
            )
            .await
    }
}
