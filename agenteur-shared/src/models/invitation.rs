/// Invitation model and database operations
///
/// An invitation offers a membership role to an email address. It moves from
/// `pending` to `accepted` once; past `expires_at` it reads as absent. A
/// partial unique index keeps at most one pending invitation per
/// organization and lowercased email.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE invitation_status AS ENUM ('pending', 'accepted');
///
/// CREATE TABLE invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     invited_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     email TEXT NOT NULL,
///     token_hash TEXT NOT NULL,
///     role membership_role NOT NULL DEFAULT 'user',
///     status invitation_status NOT NULL DEFAULT 'pending',
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX invitations_pending_email_org_key
///     ON invitations (organization_id, lower(email))
///     WHERE status = 'pending';
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use super::membership::MembershipRole;

pub const PENDING_UNIQUE_CONSTRAINT: &str = "invitations_pending_email_org_key";
pub const TOKEN_HASH_UNIQUE_CONSTRAINT: &str = "invitations_token_hash_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub invited_by: Uuid,

    /// Lowercased invitee email
    pub email: String,

    #[serde(skip_serializing, default)]
    pub token_hash: String,

    pub role: MembershipRole,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Pending and not yet expired
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && !self.is_expired(now)
    }
}

#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub organization_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    pub token_hash: String,
    pub role: MembershipRole,
    pub expires_at: DateTime<Utc>,
}

/// Invitation joined with what an invitee needs to see before accepting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvitationDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invitation: Invitation,

    pub organization_name: String,

    /// Inviter's "first last", or their email when the names are blank
    pub invited_by_name: String,
}

const COLUMNS: &str = "id, organization_id, invited_by, email, token_hash, role, status, \
                       expires_at, created_at, updated_at";

impl Invitation {
    /// Inserts a pending invitation
    ///
    /// # Errors
    ///
    /// Unique violation on `invitations_pending_email_org_key` when a pending
    /// invitation for the same organization and email exists.
    pub async fn create(conn: &mut PgConnection, data: CreateInvitation) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO invitations (organization_id, invited_by, email, token_hash, role, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {}",
            COLUMNS
        );

        sqlx::query_as::<_, Invitation>(&sql)
            .bind(data.organization_id)
            .bind(data.invited_by)
            .bind(data.email)
            .bind(data.token_hash)
            .bind(data.role)
            .bind(data.expires_at)
            .fetch_one(conn)
            .await
    }

    /// Pending invitation for an organization and email, expired or not
    pub async fn find_pending(
        conn: &mut PgConnection,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM invitations \
             WHERE organization_id = $1 AND lower(email) = lower($2) AND status = 'pending'",
            COLUMNS
        );

        sqlx::query_as::<_, Invitation>(&sql)
            .bind(organization_id)
            .bind(email)
            .fetch_optional(conn)
            .await
    }

    /// Reads the invitation for `token_hash` and holds its row lock
    pub async fn lock_by_token_hash(
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE token_hash = $1 FOR UPDATE",
            COLUMNS
        );

        sqlx::query_as::<_, Invitation>(&sql)
            .bind(token_hash)
            .fetch_optional(conn)
            .await
    }

    /// Invitation with organization name and inviter display name
    pub async fn find_details(
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> Result<Option<InvitationDetails>, sqlx::Error> {
        sqlx::query_as::<_, InvitationDetails>(
            r#"
            SELECT i.id, i.organization_id, i.invited_by, i.email, i.token_hash,
                   i.role, i.status, i.expires_at, i.created_at, i.updated_at,
                   o.name AS organization_name,
                   COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.email)
                       AS invited_by_name
            FROM invitations i
            JOIN organizations o ON o.id = i.organization_id
            JOIN users u ON u.id = i.invited_by
            WHERE i.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(conn)
        .await
    }

    pub async fn mark_accepted(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE invitations SET status = 'accepted', updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        );

        sqlx::query_as::<_, Invitation>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            invited_by: Uuid::new_v4(),
            email: "bob@example.com".to_string(),
            token_hash: "hash".to_string(),
            role: MembershipRole::User,
            status,
            expires_at: now + expires_in,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_open() {
        let now = Utc::now();
        assert!(invitation(InvitationStatus::Pending, Duration::days(1)).is_open(now));
        assert!(!invitation(InvitationStatus::Accepted, Duration::days(1)).is_open(now));
        assert!(!invitation(InvitationStatus::Pending, Duration::seconds(-1)).is_open(now));
    }

    #[test]
    fn test_token_hash_not_serialized() {
        let json = serde_json::to_value(invitation(InvitationStatus::Pending, Duration::days(1)))
            .expect("Should serialize");
        assert!(json.get("token_hash").is_none());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["role"], "user");
    }
}
