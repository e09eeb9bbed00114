/// Organization endpoints
///
/// | Method | Path | Gate |
/// |--------|------|------|
/// | POST | `/api/organizations` | authenticated |
/// | GET | `/api/organizations` | authenticated |
/// | GET | `/api/organizations/:id` | member |
/// | PUT | `/api/organizations/:id` | admin |
/// | GET | `/api/organizations/:id/members` | member |
/// | DELETE | `/api/organizations/:id/members/:user_id` | admin |
///
/// Superadmins pass every gate.

use agenteur_shared::{
    auth::authorization::{ADMIN_GATES, MEMBER_GATES},
    models::{
        membership::{MemberProfile, MembershipRole},
        organization::{Organization, OrganizationSummary},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{parse_id, Ctx, JsonBody},
    middleware::auth::Principal,
    response::{Envelope, MessageResponse},
};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct OrganizationRequest {
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            slug: org.slug,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

/// Organization with the caller's role in it
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummaryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
}

impl From<OrganizationSummary> for OrganizationSummaryResponse {
    fn from(summary: OrganizationSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            slug: summary.slug,
            role: summary.role,
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrganizationListResponse {
    pub organizations: Vec<OrganizationSummaryResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl From<MemberProfile> for MemberResponse {
    fn from(member: MemberProfile) -> Self {
        Self {
            user_id: member.user_id,
            email: member.email,
            first_name: member.first_name,
            last_name: member.last_name,
            role: member.role,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberListResponse {
    pub members: Vec<MemberResponse>,
}

/// Creates an organization with the caller as its admin
pub async fn create_organization(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    JsonBody(req): JsonBody<OrganizationRequest>,
) -> ApiResult<(StatusCode, Envelope<OrganizationResponse>)> {
    req.validate()?;

    let org = state
        .services
        .organizations
        .create(&ctx, principal.user_id, &req.name)
        .await?;

    Ok((StatusCode::CREATED, Envelope::new(org.into())))
}

/// Superadmins see every organization
pub async fn list_organizations(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
) -> ApiResult<Envelope<OrganizationListResponse>> {
    let organizations = state
        .services
        .organizations
        .list(&ctx, principal.user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Envelope::new(OrganizationListResponse { organizations }))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Envelope<OrganizationResponse>> {
    let org_id = parse_id(&id, "organization")?;
    state
        .services
        .authorizer
        .authorize(&ctx, principal.user_id, org_id, MEMBER_GATES)
        .await?;

    let org = state.services.organizations.get(&ctx, org_id).await?;
    Ok(Envelope::new(org.into()))
}

pub async fn update_organization(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<OrganizationRequest>,
) -> ApiResult<Envelope<OrganizationResponse>> {
    let org_id = parse_id(&id, "organization")?;
    state
        .services
        .authorizer
        .authorize(&ctx, principal.user_id, org_id, ADMIN_GATES)
        .await?;

    req.validate()?;
    let org = state
        .services
        .organizations
        .update(&ctx, org_id, &req.name)
        .await?;

    Ok(Envelope::new(org.into()))
}

pub async fn list_members(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Envelope<MemberListResponse>> {
    let org_id = parse_id(&id, "organization")?;
    state
        .services
        .authorizer
        .authorize(&ctx, principal.user_id, org_id, MEMBER_GATES)
        .await?;

    let members = state
        .services
        .organizations
        .list_members(&ctx, org_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Envelope::new(MemberListResponse { members }))
}

/// Refuses to remove the last admin
pub async fn remove_member(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<Envelope<MessageResponse>> {
    let org_id = parse_id(&id, "organization")?;
    let user_id = parse_id(&user_id, "user")?;
    state
        .services
        .authorizer
        .authorize(&ctx, principal.user_id, org_id, ADMIN_GATES)
        .await?;

    state
        .services
        .organizations
        .remove_member(&ctx, org_id, user_id)
        .await?;

    Ok(Envelope::new(MessageResponse::new("member removed")))
}
