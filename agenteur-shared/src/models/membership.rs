/// Organization membership model and database operations
///
/// A membership is the (user, organization, role) fact that grants
/// organization-scoped access. Every organization keeps at least one
/// `admin` membership; see `services::organizations::OrganizationService::remove_member`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('admin', 'user');
///
/// CREATE TABLE org_memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     role membership_role NOT NULL DEFAULT 'user',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT org_memberships_user_org_key UNIQUE (user_id, organization_id)
/// );
/// ```

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

pub const USER_ORG_UNIQUE_CONSTRAINT: &str = "org_memberships_user_org_key";

/// Role within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    /// Manages the organization, its members and invitations
    Admin,

    /// Regular member
    User,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Admin => "admin",
            MembershipRole::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MembershipRole::Admin)
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(MembershipRole::Admin),
            "user" => Ok(MembershipRole::User),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Membership row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: MembershipRole,
}

/// Member listing joined with the user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    /// Inserts a membership
    ///
    /// Fails with a unique violation on `org_memberships_user_org_key` if the
    /// user already belongs to the organization.
    pub async fn create(conn: &mut PgConnection, data: CreateMembership) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO org_memberships (user_id, organization_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, organization_id, role, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.organization_id)
        .bind(data.role)
        .fetch_one(conn)
        .await
    }

    /// Finds the membership of a user in an organization
    pub async fn find(
        conn: &mut PgConnection,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, user_id, organization_id, role, created_at, updated_at
            FROM org_memberships
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    /// Lists members with their profiles, oldest first
    pub async fn list_members(
        conn: &mut PgConnection,
        organization_id: Uuid,
    ) -> Result<Vec<MemberProfile>, sqlx::Error> {
        sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT u.id AS user_id, u.email, u.first_name, u.last_name,
                   m.role, m.created_at AS joined_at
            FROM org_memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.created_at ASC, u.email ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(conn)
        .await
    }

    /// Counts admins of an organization
    pub async fn count_admins(conn: &mut PgConnection, organization_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM org_memberships
            WHERE organization_id = $1 AND role = 'admin'
            "#,
        )
        .bind(organization_id)
        .fetch_one(conn)
        .await
    }

    /// Deletes a membership, returning whether a row was removed
    pub async fn delete(
        conn: &mut PgConnection,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM org_memberships
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [MembershipRole::Admin, MembershipRole::User] {
            assert_eq!(role.as_str().parse::<MembershipRole>(), Ok(role));
        }
        assert!("owner".parse::<MembershipRole>().is_err());
        assert!("Admin".parse::<MembershipRole>().is_err());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(
            serde_json::to_string(&MembershipRole::Admin).expect("Should serialize"),
            "\"admin\""
        );
        assert!(MembershipRole::Admin.is_admin());
        assert!(!MembershipRole::User.is_admin());
    }
}
