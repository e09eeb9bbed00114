/// User profiles and the superadmin directory
///
/// Directory operations (`list`, `set_superadmin`) are only reached after
/// `MembershipAuthorizer::require_superadmin` has passed.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    context::RequestContext,
    error::{CoreError, CoreResult},
    models::user::{UpdateProfile, User, UserQuery},
    store::{Store, UserRepository},
};

/// One page of the user directory
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, ctx: &RequestContext, user_id: Uuid) -> CoreResult<User> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            tx.user_by_id(user_id).await?.ok_or(CoreError::NotFound("User"))
        })
        .await
    }

    /// Replaces the user's first and last name
    pub async fn update_profile(&self, ctx: &RequestContext, user_id: Uuid, profile: UpdateProfile) -> CoreResult<User> {
        ctx.run(async {
            let profile = UpdateProfile {
                first_name: profile.first_name.trim().to_string(),
                last_name: profile.last_name.trim().to_string(),
            };
            if profile.first_name.is_empty() {
                return Err(CoreError::validation("firstName", "First name is required"));
            }

            let mut tx = self.store.begin().await?;
            let user = tx
                .update_user_profile(user_id, profile)
                .await?
                .ok_or(CoreError::NotFound("User"))?;
            tx.commit().await?;

            Ok(user)
        })
        .await
    }

    pub async fn list(&self, ctx: &RequestContext, query: UserQuery) -> CoreResult<UserPage> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let (users, total) = tx.list_users(&query).await?;

            Ok(UserPage {
                users,
                total,
                page: query.page,
                per_page: query.per_page,
            })
        })
        .await
    }

    /// Grants or revokes superadmin; takes effect on the target's next request
    pub async fn set_superadmin(
        &self,
        ctx: &RequestContext,
        actor_id: Uuid,
        user_id: Uuid,
        is_superadmin: bool,
    ) -> CoreResult<User> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let user = tx
                .set_user_superadmin(user_id, is_superadmin)
                .await?
                .ok_or(CoreError::NotFound("User"))?;
            tx.commit().await?;

            info!(
                request_id = %ctx.request_id(),
                actor_id = %actor_id,
                user_id = %user_id,
                is_superadmin,
                "Superadmin flag changed"
            );
            Ok(user)
        })
        .await
    }
}
