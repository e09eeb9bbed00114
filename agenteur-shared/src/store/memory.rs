/// In-process store
///
/// Holds all rows behind one async mutex. [`MemoryStore::begin`] takes the
/// lock for the lifetime of the transaction and works on a private copy;
/// commit swaps the copy in, drop discards it. Transactions are therefore
/// fully serialized, which gives the same outcomes the PostgreSQL row locks
/// give for the concurrent paths (refresh rotation, accept, member removal).
///
/// A caller holding a transaction must not open a second one on the same
/// store, or it waits on itself.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    InvitationRepository, MembershipRepository, OrganizationRepository, RefreshTokenRepository,
    Store, StoreError, StoreResult, StoreTx, UserRepository,
};
use crate::models::{
    invitation::{self, CreateInvitation, Invitation, InvitationDetails, InvitationStatus},
    membership::{self, CreateMembership, MemberProfile, Membership, MembershipRole},
    organization::{self, CreateOrganization, Organization, OrganizationSummary},
    refresh_token::{self, CreateRefreshToken, RefreshToken},
    user::{self, CreateUser, UpdateProfile, User, UserQuery},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    organizations: HashMap<Uuid, Organization>,
    memberships: HashMap<Uuid, Membership>,
    invitations: HashMap<Uuid, Invitation>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation(constraint.to_string())
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryTx {
    async fn insert_user(&mut self, data: CreateUser) -> StoreResult<User> {
        let email = data.email.to_lowercase();
        if self.work.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(unique(user::EMAIL_UNIQUE_CONSTRAINT));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: data.email,
            password_hash: data.password_hash,
            first_name: data.first_name,
            last_name: data.last_name,
            is_superadmin: false,
            created_at: now,
            updated_at: now,
        };
        self.work.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .work
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn update_user_profile(&mut self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        Ok(self.work.users.get_mut(&id).map(|u| {
            u.first_name = data.first_name;
            u.last_name = data.last_name;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn set_user_superadmin(&mut self, id: Uuid, is_superadmin: bool) -> StoreResult<Option<User>> {
        Ok(self.work.users.get_mut(&id).map(|u| {
            u.is_superadmin = is_superadmin;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn list_users(&mut self, query: &UserQuery) -> StoreResult<(Vec<User>, i64)> {
        let mut matched: Vec<User> = self
            .work
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();

        Ok((page, total))
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryTx {
    async fn insert_refresh_token(&mut self, data: CreateRefreshToken) -> StoreResult<RefreshToken> {
        if self.work.refresh_tokens.values().any(|t| t.token_hash == data.token_hash) {
            return Err(unique(refresh_token::TOKEN_HASH_UNIQUE_CONSTRAINT));
        }

        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            token_hash: data.token_hash,
            expires_at: data.expires_at,
            created_at: Utc::now(),
        };
        self.work.refresh_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn take_refresh_token(&mut self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        let id = self
            .work
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .map(|t| t.id);

        Ok(id.and_then(|id| self.work.refresh_tokens.remove(&id)))
    }

    async fn delete_refresh_tokens_for_user(&mut self, user_id: Uuid) -> StoreResult<u64> {
        let before = self.work.refresh_tokens.len();
        self.work.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - self.work.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl OrganizationRepository for MemoryTx {
    async fn insert_organization(&mut self, data: CreateOrganization) -> StoreResult<Organization> {
        let slug = data.slug.to_lowercase();
        if self.work.organizations.values().any(|o| o.slug.to_lowercase() == slug) {
            return Err(unique(organization::SLUG_UNIQUE_CONSTRAINT));
        }

        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4(),
            name: data.name,
            slug: data.slug,
            created_at: now,
            updated_at: now,
        };
        self.work.organizations.insert(org.id, org.clone());
        Ok(org)
    }

    async fn organization_by_id(&mut self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(self.work.organizations.get(&id).cloned())
    }

    async fn lock_organization(&mut self, id: Uuid) -> StoreResult<Option<Organization>> {
        // The whole store is already locked by this transaction.
        Ok(self.work.organizations.get(&id).cloned())
    }

    async fn slug_taken(&mut self, slug: &str) -> StoreResult<bool> {
        let slug = slug.to_lowercase();
        Ok(self
            .work
            .organizations
            .values()
            .any(|o| o.slug.to_lowercase() == slug))
    }

    async fn rename_organization(&mut self, id: Uuid, name: &str) -> StoreResult<Option<Organization>> {
        Ok(self.work.organizations.get_mut(&id).map(|o| {
            o.name = name.to_string();
            o.updated_at = Utc::now();
            o.clone()
        }))
    }

    async fn list_all_organizations(&mut self) -> StoreResult<Vec<OrganizationSummary>> {
        let mut orgs: Vec<OrganizationSummary> = self
            .work
            .organizations
            .values()
            .map(|o| OrganizationSummary::from_organization(o, MembershipRole::Admin))
            .collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(orgs)
    }

    async fn list_organizations_for_user(&mut self, user_id: Uuid) -> StoreResult<Vec<OrganizationSummary>> {
        let mut orgs: Vec<OrganizationSummary> = self
            .work
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                self.work
                    .organizations
                    .get(&m.organization_id)
                    .map(|o| OrganizationSummary::from_organization(o, m.role))
            })
            .collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(orgs)
    }
}

#[async_trait]
impl MembershipRepository for MemoryTx {
    async fn insert_membership(&mut self, data: CreateMembership) -> StoreResult<Membership> {
        let exists = self
            .work
            .memberships
            .values()
            .any(|m| m.user_id == data.user_id && m.organization_id == data.organization_id);
        if exists {
            return Err(unique(membership::USER_ORG_UNIQUE_CONSTRAINT));
        }

        let now = Utc::now();
        let row = Membership {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            organization_id: data.organization_id,
            role: data.role,
            created_at: now,
            updated_at: now,
        };
        self.work.memberships.insert(row.id, row.clone());
        Ok(row)
    }

    async fn membership(&mut self, organization_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(self
            .work
            .memberships
            .values()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_members(&mut self, organization_id: Uuid) -> StoreResult<Vec<MemberProfile>> {
        let mut members: Vec<MemberProfile> = self
            .work
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id)
            .filter_map(|m| {
                self.work.users.get(&m.user_id).map(|u| MemberProfile {
                    user_id: u.id,
                    email: u.email.clone(),
                    first_name: u.first_name.clone(),
                    last_name: u.last_name.clone(),
                    role: m.role,
                    joined_at: m.created_at,
                })
            })
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.email.cmp(&b.email)));
        Ok(members)
    }

    async fn count_admins(&mut self, organization_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .work
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id && m.role.is_admin())
            .count() as i64)
    }

    async fn delete_membership(&mut self, organization_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let before = self.work.memberships.len();
        self.work
            .memberships
            .retain(|_, m| !(m.organization_id == organization_id && m.user_id == user_id));
        Ok(self.work.memberships.len() < before)
    }
}

#[async_trait]
impl InvitationRepository for MemoryTx {
    async fn insert_invitation(&mut self, data: CreateInvitation) -> StoreResult<Invitation> {
        let email = data.email.to_lowercase();
        let pending_exists = self.work.invitations.values().any(|i| {
            i.organization_id == data.organization_id
                && i.status == InvitationStatus::Pending
                && i.email.to_lowercase() == email
        });
        if pending_exists {
            return Err(unique(invitation::PENDING_UNIQUE_CONSTRAINT));
        }
        if self.work.invitations.values().any(|i| i.token_hash == data.token_hash) {
            return Err(unique(invitation::TOKEN_HASH_UNIQUE_CONSTRAINT));
        }

        let now = Utc::now();
        let row = Invitation {
            id: Uuid::new_v4(),
            organization_id: data.organization_id,
            invited_by: data.invited_by,
            email: data.email,
            token_hash: data.token_hash,
            role: data.role,
            status: InvitationStatus::Pending,
            expires_at: data.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.work.invitations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn pending_invitation(&mut self, organization_id: Uuid, email: &str) -> StoreResult<Option<Invitation>> {
        let email = email.to_lowercase();
        Ok(self
            .work
            .invitations
            .values()
            .find(|i| {
                i.organization_id == organization_id
                    && i.status == InvitationStatus::Pending
                    && i.email.to_lowercase() == email
            })
            .cloned())
    }

    async fn invitation_details(&mut self, token_hash: &str) -> StoreResult<Option<InvitationDetails>> {
        let Some(inv) = self.work.invitations.values().find(|i| i.token_hash == token_hash) else {
            return Ok(None);
        };
        let (Some(org), Some(inviter)) = (
            self.work.organizations.get(&inv.organization_id),
            self.work.users.get(&inv.invited_by),
        ) else {
            return Ok(None);
        };

        Ok(Some(InvitationDetails {
            invitation: inv.clone(),
            organization_name: org.name.clone(),
            invited_by_name: inviter.display_name(),
        }))
    }

    async fn lock_invitation(&mut self, token_hash: &str) -> StoreResult<Option<Invitation>> {
        Ok(self
            .work
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn mark_invitation_accepted(&mut self, id: Uuid) -> StoreResult<Option<Invitation>> {
        Ok(self.work.invitations.get_mut(&id).map(|i| {
            i.status = InvitationStatus::Accepted;
            i.updated_at = Utc::now();
            i.clone()
        }))
    }

    async fn delete_invitation(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.work.invitations.remove(&id).is_some())
    }
}
