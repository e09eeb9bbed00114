/// Repository capability
///
/// Services never touch a pool directly. They open a [`StoreTx`] with
/// [`Store::begin`], run reads and writes through the repository traits, and
/// call [`StoreTx::commit`]. Dropping a transaction without committing rolls
/// it back, which is what happens when a request is cancelled mid-operation.
///
/// Two backends exist:
///
/// - [`postgres::PgStore`]: sqlx over PostgreSQL, composing the model queries
/// - [`memory::MemoryStore`]: a mutex-guarded in-process copy used by tests
///
/// Uniqueness is reported as [`StoreError::UniqueViolation`] carrying the
/// constraint name, identical across backends.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    invitation::{CreateInvitation, Invitation, InvitationDetails},
    membership::{CreateMembership, MemberProfile, Membership},
    organization::{CreateOrganization, Organization, OrganizationSummary},
    refresh_token::{CreateRefreshToken, RefreshToken},
    user::{CreateUser, UpdateProfile, User, UserQuery},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// PostgreSQL SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint or index rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// True when `constraint` rejected the write
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(name) if name == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db.constraint().unwrap_or_default().to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send {
    async fn insert_user(&mut self, data: CreateUser) -> StoreResult<User>;
    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup
    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;

    async fn update_user_profile(&mut self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>>;
    async fn set_user_superadmin(&mut self, id: Uuid, is_superadmin: bool) -> StoreResult<Option<User>>;

    /// One page, newest first, plus the total number of matches
    async fn list_users(&mut self, query: &UserQuery) -> StoreResult<(Vec<User>, i64)>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send {
    async fn insert_refresh_token(&mut self, data: CreateRefreshToken) -> StoreResult<RefreshToken>;

    /// Atomically removes and returns the token with `token_hash`
    async fn take_refresh_token(&mut self, token_hash: &str) -> StoreResult<Option<RefreshToken>>;

    async fn delete_refresh_tokens_for_user(&mut self, user_id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrganizationRepository: Send {
    async fn insert_organization(&mut self, data: CreateOrganization) -> StoreResult<Organization>;
    async fn organization_by_id(&mut self, id: Uuid) -> StoreResult<Option<Organization>>;

    /// Reads the organization and blocks other lockers until this transaction ends
    async fn lock_organization(&mut self, id: Uuid) -> StoreResult<Option<Organization>>;

    async fn slug_taken(&mut self, slug: &str) -> StoreResult<bool>;
    async fn rename_organization(&mut self, id: Uuid, name: &str) -> StoreResult<Option<Organization>>;
    async fn list_all_organizations(&mut self) -> StoreResult<Vec<OrganizationSummary>>;
    async fn list_organizations_for_user(&mut self, user_id: Uuid) -> StoreResult<Vec<OrganizationSummary>>;
}

#[async_trait]
pub trait MembershipRepository: Send {
    async fn insert_membership(&mut self, data: CreateMembership) -> StoreResult<Membership>;
    async fn membership(&mut self, organization_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>>;
    async fn list_members(&mut self, organization_id: Uuid) -> StoreResult<Vec<MemberProfile>>;
    async fn count_admins(&mut self, organization_id: Uuid) -> StoreResult<i64>;
    async fn delete_membership(&mut self, organization_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait InvitationRepository: Send {
    async fn insert_invitation(&mut self, data: CreateInvitation) -> StoreResult<Invitation>;

    /// Pending invitation for the pair, including expired ones
    async fn pending_invitation(&mut self, organization_id: Uuid, email: &str) -> StoreResult<Option<Invitation>>;

    async fn invitation_details(&mut self, token_hash: &str) -> StoreResult<Option<InvitationDetails>>;

    /// Reads the invitation under a row lock
    async fn lock_invitation(&mut self, token_hash: &str) -> StoreResult<Option<Invitation>>;

    async fn mark_invitation_accepted(&mut self, id: Uuid) -> StoreResult<Option<Invitation>>;
    async fn delete_invitation(&mut self, id: Uuid) -> StoreResult<bool>;
}

/// An open transaction over every repository
#[async_trait]
pub trait StoreTx:
    UserRepository
    + RefreshTokenRepository
    + OrganizationRepository
    + MembershipRepository
    + InvitationRepository
    + Send
{
    /// Makes every write visible; dropping instead rolls back
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unique_violation() {
        let err = StoreError::UniqueViolation("users_email_key".to_string());
        assert!(err.is_unique_violation("users_email_key"));
        assert!(!err.is_unique_violation("organizations_slug_key"));

        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_unique_violation("users_email_key"));
    }
}
