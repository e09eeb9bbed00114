/// Own-profile endpoints
///
/// - `GET /api/users/me`
/// - `PUT /api/users/me`

use agenteur_shared::models::user::{UpdateProfile, User};
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{Ctx, JsonBody},
    middleware::auth::Principal,
    response::Envelope,
};

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superadmin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_superadmin: user.is_superadmin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: String,
}

pub async fn get_me(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
) -> ApiResult<Envelope<UserResponse>> {
    let user = state.services.users.get(&ctx, principal.user_id).await?;
    Ok(Envelope::new(user.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Envelope<UserResponse>> {
    req.validate()?;

    let user = state
        .services
        .users
        .update_profile(
            &ctx,
            principal.user_id,
            UpdateProfile {
                first_name: req.first_name,
                last_name: req.last_name,
            },
        )
        .await?;

    Ok(Envelope::new(user.into()))
}
