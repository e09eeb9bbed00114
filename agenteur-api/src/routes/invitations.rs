/// Invitation endpoints
///
/// - `POST /api/organizations/:id/invitations` - org admin invites an email (201)
/// - `GET /api/invitations/:token` - public lookup for the accept page
/// - `POST /api/invitations/:token/accept` - signed-in invitee joins
///
/// The raw token only ever travels in the invite link; responses never
/// include it or its hash.

use std::collections::BTreeMap;

use agenteur_shared::{
    auth::authorization::ADMIN_GATES,
    models::{
        invitation::{Invitation, InvitationDetails, InvitationStatus},
        membership::{Membership, MembershipRole},
    },
    services::invitations::NewInvitation,
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
    error::{ApiError, ApiResult},
    extract::{parse_id, Ctx, JsonBody},
    middleware::auth::Principal,
    response::Envelope,
};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateInvitationRequest {
    #[validate(length(max = 254, message = "Email must be at most 254 characters"))]
    pub email: String,

    /// `admin` or `user`; empty means `user`
    pub role: String,
}

impl CreateInvitationRequest {
    fn role(&self) -> Result<MembershipRole, ApiError> {
        if self.role.is_empty() {
            return Ok(MembershipRole::User);
        }
        self.role.parse().map_err(|_| {
            ApiError::Validation(BTreeMap::from([(
                "role".to_string(),
                "Role must be 'admin' or 'user'".to_string(),
            )]))
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: Uuid,
    pub email: String,
    pub role: MembershipRole,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id,
            email: invitation.email,
            role: invitation.role,
            status: invitation.status,
            expires_at: invitation.expires_at,
            created_at: invitation.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationDetailsResponse {
    pub organization_name: String,
    pub email: String,
    pub role: MembershipRole,
    pub invited_by_name: String,
    pub expires_at: DateTime<Utc>,
}

impl From<InvitationDetails> for InvitationDetailsResponse {
    fn from(details: InvitationDetails) -> Self {
        Self {
            organization_name: details.organization_name,
            email: details.invitation.email,
            role: details.invitation.role,
            invited_by_name: details.invited_by_name,
            expires_at: details.invitation.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl From<Membership> for MembershipResponse {
    fn from(membership: Membership) -> Self {
        Self {
            user_id: membership.user_id,
            organization_id: membership.organization_id,
            role: membership.role,
            joined_at: membership.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptInvitationResponse {
    pub membership: MembershipResponse,
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CreateInvitationRequest>,
) -> ApiResult<(StatusCode, Envelope<InvitationResponse>)> {
    let org_id = parse_id(&id, "organization")?;
    state
        .services
        .authorizer
        .authorize(&ctx, principal.user_id, org_id, ADMIN_GATES)
        .await?;

    req.validate()?;
    let role = req.role()?;

    let invitation = state
        .services
        .invitations
        .create(
            &ctx,
            NewInvitation {
                organization_id: org_id,
                invited_by: principal.user_id,
                email: req.email,
                role,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Envelope::new(invitation.into())))
}

pub async fn get_invitation(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(token): Path<String>,
) -> ApiResult<Envelope<InvitationDetailsResponse>> {
    let details = state.services.invitations.get_by_token(&ctx, &token).await?;
    Ok(Envelope::new(details.into()))
}

/// The caller's email must match the invited address
pub async fn accept_invitation(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    principal: Principal,
    Path(token): Path<String>,
) -> ApiResult<Envelope<AcceptInvitationResponse>> {
    let membership = state
        .services
        .invitations
        .accept(&ctx, &token, principal.user_id, &principal.email)
        .await?;

    Ok(Envelope::new(AcceptInvitationResponse {
        membership: membership.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str) -> CreateInvitationRequest {
        CreateInvitationRequest {
            email: "bob@example.com".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_role_defaults_to_user() {
        assert_eq!(request("").role().expect("Should default"), MembershipRole::User);
        assert_eq!(request("admin").role().expect("Should parse"), MembershipRole::Admin);
    }

    #[test]
    fn test_unknown_role_is_a_field_error() {
        let err = request("owner").role().expect_err("Should reject");
        match err {
            ApiError::Validation(details) => {
                assert_eq!(details["role"], "Role must be 'admin' or 'user'");
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }
}
