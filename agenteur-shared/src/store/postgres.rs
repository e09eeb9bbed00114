/// PostgreSQL store
///
/// Every repository call runs on the transaction's connection, so reads and
/// writes of one operation see a single snapshot and commit together.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    InvitationRepository, MembershipRepository, OrganizationRepository, RefreshTokenRepository,
    Store, StoreResult, StoreTx, UserRepository,
};
use crate::{
    db::pool::health_check,
    models::{
        invitation::{CreateInvitation, Invitation, InvitationDetails},
        membership::{CreateMembership, MemberProfile, Membership},
        organization::{CreateOrganization, Organization, OrganizationSummary},
        refresh_token::{CreateRefreshToken, RefreshToken},
        user::{CreateUser, UpdateProfile, User, UserQuery},
    },
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction; rolled back on drop unless committed
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgTx {
    async fn insert_user(&mut self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&mut *self.tx, data).await?)
    }

    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&mut *self.tx, id).await?)
    }

    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&mut *self.tx, email).await?)
    }

    async fn update_user_profile(&mut self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        Ok(User::update_profile(&mut *self.tx, id, data).await?)
    }

    async fn set_user_superadmin(&mut self, id: Uuid, is_superadmin: bool) -> StoreResult<Option<User>> {
        Ok(User::set_superadmin(&mut *self.tx, id, is_superadmin).await?)
    }

    async fn list_users(&mut self, query: &UserQuery) -> StoreResult<(Vec<User>, i64)> {
        Ok(User::list(&mut *self.tx, query).await?)
    }
}

#[async_trait]
impl RefreshTokenRepository for PgTx {
    async fn insert_refresh_token(&mut self, data: CreateRefreshToken) -> StoreResult<RefreshToken> {
        Ok(RefreshToken::create(&mut *self.tx, data).await?)
    }

    async fn take_refresh_token(&mut self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(RefreshToken::take(&mut *self.tx, token_hash).await?)
    }

    async fn delete_refresh_tokens_for_user(&mut self, user_id: Uuid) -> StoreResult<u64> {
        Ok(RefreshToken::delete_for_user(&mut *self.tx, user_id).await?)
    }
}

#[async_trait]
impl OrganizationRepository for PgTx {
    async fn insert_organization(&mut self, data: CreateOrganization) -> StoreResult<Organization> {
        Ok(Organization::create(&mut *self.tx, data).await?)
    }

    async fn organization_by_id(&mut self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(Organization::find_by_id(&mut *self.tx, id).await?)
    }

    async fn lock_organization(&mut self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(Organization::lock(&mut *self.tx, id).await?)
    }

    async fn slug_taken(&mut self, slug: &str) -> StoreResult<bool> {
        Ok(Organization::slug_exists(&mut *self.tx, slug).await?)
    }

    async fn rename_organization(&mut self, id: Uuid, name: &str) -> StoreResult<Option<Organization>> {
        Ok(Organization::rename(&mut *self.tx, id, name).await?)
    }

    async fn list_all_organizations(&mut self) -> StoreResult<Vec<OrganizationSummary>> {
        Ok(Organization::list_all(&mut *self.tx).await?)
    }

    async fn list_organizations_for_user(&mut self, user_id: Uuid) -> StoreResult<Vec<OrganizationSummary>> {
        Ok(Organization::list_for_user(&mut *self.tx, user_id).await?)
    }
}

#[async_trait]
impl MembershipRepository for PgTx {
    async fn insert_membership(&mut self, data: CreateMembership) -> StoreResult<Membership> {
        Ok(Membership::create(&mut *self.tx, data).await?)
    }

    async fn membership(&mut self, organization_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(Membership::find(&mut *self.tx, organization_id, user_id).await?)
    }

    async fn list_members(&mut self, organization_id: Uuid) -> StoreResult<Vec<MemberProfile>> {
        Ok(Membership::list_members(&mut *self.tx, organization_id).await?)
    }

    async fn count_admins(&mut self, organization_id: Uuid) -> StoreResult<i64> {
        Ok(Membership::count_admins(&mut *self.tx, organization_id).await?)
    }

    async fn delete_membership(&mut self, organization_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(Membership::delete(&mut *self.tx, organization_id, user_id).await?)
    }
}

#[async_trait]
impl InvitationRepository for PgTx {
    async fn insert_invitation(&mut self, data: CreateInvitation) -> StoreResult<Invitation> {
        Ok(Invitation::create(&mut *self.tx, data).await?)
    }

    async fn pending_invitation(&mut self, organization_id: Uuid, email: &str) -> StoreResult<Option<Invitation>> {
        Ok(Invitation::find_pending(&mut *self.tx, organization_id, email).await?)
    }

    async fn invitation_details(&mut self, token_hash: &str) -> StoreResult<Option<InvitationDetails>> {
        Ok(Invitation::find_details(&mut *self.tx, token_hash).await?)
    }

    async fn lock_invitation(&mut self, token_hash: &str) -> StoreResult<Option<Invitation>> {
        Ok(Invitation::lock_by_token_hash(&mut *self.tx, token_hash).await?)
    }

    async fn mark_invitation_accepted(&mut self, id: Uuid) -> StoreResult<Option<Invitation>> {
        Ok(Invitation::mark_accepted(&mut *self.tx, id).await?)
    }

    async fn delete_invitation(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(Invitation::delete(&mut *self.tx, id).await?)
    }
}
