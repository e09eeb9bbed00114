/// Superadmin endpoints
///
/// - `GET /api/admin/users?page=&perPage=&search=` - paged user directory
/// - `PUT /api/admin/users/:id/superadmin` - grant or revoke superadmin
///
/// Both sit behind `require_superadmin`. Unparsable or out-of-range paging
/// values fall back to the defaults (page 1, 20 per page, at most 100).

use agenteur_shared::models::user::UserQuery;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{parse_id, Ctx, JsonBody},
    middleware::auth::Principal,
    response::Envelope,
    routes::users::UserResponse,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub search: Option<String>,
}

impl From<UserListParams> for UserQuery {
    fn from(params: UserListParams) -> Self {
        let number = |raw: Option<String>| raw.and_then(|v| v.trim().parse::<i64>().ok());
        UserQuery::new(number(params.page), number(params.per_page), params.search)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuperadminRequest {
    pub is_superadmin: bool,
}

pub async fn list_users(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<UserListParams>,
) -> ApiResult<Envelope<UserListResponse>> {
    let page = state.services.users.list(&ctx, params.into()).await?;

    Ok(Envelope::new(UserListResponse {
        users: page.users.into_iter().map(Into::into).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// A superadmin may revoke their own flag
pub async fn set_superadmin(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SuperadminRequest>,
) -> ApiResult<Envelope<UserResponse>> {
    let user_id = parse_id(&id, "user")?;

    let user = state
        .services
        .users
        .set_superadmin(&ctx, principal.user_id, user_id, req.is_superadmin)
        .await?;

    Ok(Envelope::new(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparsable_paging_uses_defaults() {
        let query: UserQuery = UserListParams {
            page: Some("abc".to_string()),
            per_page: Some("500".to_string()),
            search: Some("  alice ".to_string()),
        }
        .into();

        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, UserQuery::DEFAULT_PER_PAGE);
        assert_eq!(query.search.as_deref(), Some("alice"));
    }

    #[test]
    fn test_paging_values_are_parsed() {
        let query: UserQuery = UserListParams {
            page: Some("3".to_string()),
            per_page: Some("50".to_string()),
            search: None,
        }
        .into();

        assert_eq!(query.page, 3);
        assert_eq!(query.per_page, 50);
        assert_eq!(query.offset(), 100);
    }
}
