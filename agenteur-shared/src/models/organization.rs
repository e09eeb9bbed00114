/// Organization model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     slug TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX organizations_slug_key ON organizations (lower(slug));
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use super::membership::MembershipRole;

pub const SLUG_UNIQUE_CONSTRAINT: &str = "organizations_slug_key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,

    /// URL-safe identifier derived from the name at creation
    pub slug: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
}

/// Organization as seen by one user, with that user's role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
}

impl OrganizationSummary {
    pub fn from_organization(org: &Organization, role: MembershipRole) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            slug: org.slug.clone(),
            role,
            created_at: org.created_at,
        }
    }
}

/// Derives a slug from an organization name
///
/// Lowercases, collapses each run of characters outside `[a-z0-9]` into one
/// `-`, and trims leading and trailing dashes. A name with no usable
/// characters becomes `org`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "org".to_string()
    } else {
        slug
    }
}

impl Organization {
    /// Inserts an organization
    ///
    /// # Errors
    ///
    /// Unique violation on `organizations_slug_key` when the slug is taken.
    pub async fn create(conn: &mut PgConnection, data: CreateOrganization) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, slug)
            VALUES ($1, $2)
            RETURNING id, name, slug, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.slug)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, slug, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Reads an organization and holds its row lock until the transaction ends
    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, slug, created_at, updated_at
            FROM organizations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn slug_exists(conn: &mut PgConnection, slug: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM organizations WHERE lower(slug) = lower($1))
            "#,
        )
        .bind(slug)
        .fetch_one(conn)
        .await
    }

    /// Changes the name; the slug is left alone
    pub async fn rename(conn: &mut PgConnection, id: Uuid, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, slug, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(conn)
        .await
    }

    /// Every organization, viewed with the admin role
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<OrganizationSummary>, sqlx::Error> {
        sqlx::query_as::<_, OrganizationSummary>(
            r#"
            SELECT id, name, slug, 'admin'::membership_role AS role, created_at
            FROM organizations
            ORDER BY name ASC, id
            "#,
        )
        .fetch_all(conn)
        .await
    }

    /// Organizations the user belongs to, with the user's role
    pub async fn list_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationSummary>, sqlx::Error> {
        sqlx::query_as::<_, OrganizationSummary>(
            r#"
            SELECT o.id, o.name, o.slug, m.role, o.created_at
            FROM organizations o
            JOIN org_memberships m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY o.name ASC, o.id
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
    }
}
