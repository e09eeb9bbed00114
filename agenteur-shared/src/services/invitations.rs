/// Invitation workflow
///
/// ```text
/// create ──> pending ──accept──> accepted
///               │
///               └── past expires_at: reads as not found
/// ```
///
/// The raw token exists only in the link handed to the [`Notifier`]; storage
/// keeps its SHA-256 hash. The notifier runs inside the creating transaction,
/// so a delivery failure leaves no invitation behind.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    auth::token::{hash_token, OpaqueToken},
    context::RequestContext,
    error::{CoreError, CoreResult},
    models::{
        invitation::{CreateInvitation, Invitation, InvitationDetails, PENDING_UNIQUE_CONSTRAINT},
        membership::{CreateMembership, Membership, MembershipRole, USER_ORG_UNIQUE_CONSTRAINT},
        user::normalize_email,
    },
    notifier::{InvitationNotice, Notifier},
    services::session::looks_like_email,
    store::{InvitationRepository, MembershipRepository, OrganizationRepository, Store, UserRepository},
};

#[derive(Debug, Clone)]
pub struct InvitationSettings {
    pub ttl: Duration,

    /// Link prefix; the raw token is appended after a `/`
    pub base_url: String,
}

impl Default for InvitationSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            base_url: "http://localhost:5173/invitations".to_string(),
        }
    }
}

impl InvitationSettings {
    pub fn invite_url(&self, raw_token: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), raw_token)
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub organization_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    pub role: MembershipRole,
}

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    settings: InvitationSettings,
}

impl InvitationService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, settings: InvitationSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    /// Creates a pending invitation and notifies the invitee
    ///
    /// An expired pending invitation for the same address is replaced.
    ///
    /// # Errors
    ///
    /// - `CoreError::AlreadyMember` if the address belongs to a member
    /// - `CoreError::InvitationExists` if a live pending invitation exists
    /// - `CoreError::Notification` if delivery fails; nothing is persisted
    pub async fn create(&self, ctx: &RequestContext, input: NewInvitation) -> CoreResult<Invitation> {
        ctx.run(async {
            let email = normalize_email(&input.email);
            if !looks_like_email(&email) {
                return Err(CoreError::validation("email", "Valid email is required"));
            }

            let mut tx = self.store.begin().await?;
            let org = tx
                .organization_by_id(input.organization_id)
                .await?
                .ok_or(CoreError::NotFound("Organization"))?;
            let inviter = tx
                .user_by_id(input.invited_by)
                .await?
                .ok_or(CoreError::InvalidToken)?;

            if let Some(existing) = tx.user_by_email(&email).await? {
                if tx.membership(org.id, existing.id).await?.is_some() {
                    return Err(CoreError::AlreadyMember);
                }
            }

            let now = Utc::now();
            if let Some(pending) = tx.pending_invitation(org.id, &email).await? {
                if !pending.is_expired(now) {
                    return Err(CoreError::InvitationExists);
                }
                tx.delete_invitation(pending.id).await?;
            }

            let token = OpaqueToken::generate();
            let invitation = tx
                .insert_invitation(CreateInvitation {
                    organization_id: org.id,
                    invited_by: inviter.id,
                    email: email.clone(),
                    token_hash: token.hash.clone(),
                    role: input.role,
                    expires_at: now + self.settings.ttl,
                })
                .await
                .map_err(|e| {
                    if e.is_unique_violation(PENDING_UNIQUE_CONSTRAINT) {
                        CoreError::InvitationExists
                    } else {
                        e.into()
                    }
                })?;

            let notice = InvitationNotice {
                recipient: email,
                inviter_name: inviter.display_name(),
                organization_name: org.name.clone(),
                invite_url: self.settings.invite_url(&token.raw),
            };
            self.notifier.send_invitation(&notice).await.map_err(|e| {
                error!(
                    request_id = %ctx.request_id(),
                    organization_id = %org.id,
                    error = %e,
                    "Invitation delivery failed"
                );
                CoreError::from(e)
            })?;

            tx.commit().await?;

            info!(
                request_id = %ctx.request_id(),
                invitation_id = %invitation.id,
                organization_id = %org.id,
                role = %invitation.role,
                "Invitation created"
            );
            Ok(invitation)
        })
        .await
    }

    /// Looks up an open invitation by raw token
    pub async fn get_by_token(&self, ctx: &RequestContext, raw_token: &str) -> CoreResult<InvitationDetails> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let details = tx
                .invitation_details(&hash_token(raw_token))
                .await?
                .filter(|d| d.invitation.is_open(Utc::now()))
                .ok_or(CoreError::InvitationNotFound)?;
            Ok(details)
        })
        .await
    }

    /// Accepts an invitation on behalf of the authenticated user
    ///
    /// The invitation row is locked for the whole transaction; of two
    /// concurrent accepts the second observes `accepted` and fails
    /// `InvitationNotFound`.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvitationNotFound` if absent, accepted or expired
    /// - `CoreError::EmailMismatch` if `user_email` is not the invited address
    /// - `CoreError::AlreadyMember` if the user already belongs to the organization
    pub async fn accept(
        &self,
        ctx: &RequestContext,
        raw_token: &str,
        user_id: Uuid,
        user_email: &str,
    ) -> CoreResult<Membership> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;

            let invitation = tx
                .lock_invitation(&hash_token(raw_token))
                .await?
                .filter(|i| i.is_open(Utc::now()))
                .ok_or(CoreError::InvitationNotFound)?;

            if normalize_email(user_email) != invitation.email.to_lowercase() {
                return Err(CoreError::EmailMismatch);
            }

            if tx.membership(invitation.organization_id, user_id).await?.is_some() {
                return Err(CoreError::AlreadyMember);
            }

            let membership = tx
                .insert_membership(CreateMembership {
                    user_id,
                    organization_id: invitation.organization_id,
                    role: invitation.role,
                })
                .await
                .map_err(|e| {
                    if e.is_unique_violation(USER_ORG_UNIQUE_CONSTRAINT) {
                        CoreError::AlreadyMember
                    } else {
                        e.into()
                    }
                })?;

            tx.mark_invitation_accepted(invitation.id)
                .await?
                .ok_or(CoreError::InvitationNotFound)?;
            tx.commit().await?;

            info!(
                request_id = %ctx.request_id(),
                invitation_id = %invitation.id,
                organization_id = %membership.organization_id,
                user_id = %user_id,
                "Invitation accepted"
            );
            Ok(membership)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_url_joins_with_single_slash() {
        let mut settings = InvitationSettings::default();
        assert_eq!(settings.invite_url("abc"), "http://localhost:5173/invitations/abc");

        settings.base_url = "https://app.example.com/join/".to_string();
        assert_eq!(settings.invite_url("abc"), "https://app.example.com/join/abc");
    }
}
