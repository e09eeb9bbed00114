/// Organization lifecycle and membership management
///
/// Callers apply the member or admin gates before invoking these operations;
/// the service enforces the data invariants (unique slugs, at least one admin
/// per organization).

use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use tracing::info;
use uuid::Uuid;

use crate::{
    context::RequestContext,
    error::{CoreError, CoreResult},
    models::{
        membership::{CreateMembership, MemberProfile, MembershipRole},
        organization::{slugify, CreateOrganization, Organization, OrganizationSummary, SLUG_UNIQUE_CONSTRAINT},
    },
    store::{MembershipRepository, OrganizationRepository, Store, UserRepository},
};

/// Slug candidates tried before giving up
const SLUG_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn Store>,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates an organization with the creator as its first admin
    ///
    /// The slug comes from [`slugify`]; when taken, a random 8-hex-digit
    /// suffix is appended.
    pub async fn create(&self, ctx: &RequestContext, user_id: Uuid, name: &str) -> CoreResult<Organization> {
        ctx.run(async {
            let name = required_name(name)?;
            let base = slugify(&name);

            for attempt in 0..SLUG_ATTEMPTS {
                let slug = if attempt == 0 { base.clone() } else { with_suffix(&base) };

                let mut tx = self.store.begin().await?;
                tx.user_by_id(user_id).await?.ok_or(CoreError::InvalidToken)?;
                if tx.slug_taken(&slug).await? {
                    continue;
                }

                let org = match tx
                    .insert_organization(CreateOrganization { name: name.clone(), slug })
                    .await
                {
                    Ok(org) => org,
                    Err(e) if e.is_unique_violation(SLUG_UNIQUE_CONSTRAINT) => continue,
                    Err(e) => return Err(e.into()),
                };

                tx.insert_membership(CreateMembership {
                    user_id,
                    organization_id: org.id,
                    role: MembershipRole::Admin,
                })
                .await?;
                tx.commit().await?;

                info!(
                    request_id = %ctx.request_id(),
                    organization_id = %org.id,
                    slug = %org.slug,
                    created_by = %user_id,
                    "Organization created"
                );
                return Ok(org);
            }

            Err(CoreError::Internal(format!(
                "No free slug for '{}' after {} attempts",
                base, SLUG_ATTEMPTS
            )))
        })
        .await
    }

    /// Organizations visible to the user
    ///
    /// Superadmins (per storage) see every organization as `admin`.
    pub async fn list(&self, ctx: &RequestContext, user_id: Uuid) -> CoreResult<Vec<OrganizationSummary>> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let user = tx.user_by_id(user_id).await?.ok_or(CoreError::InvalidToken)?;

            let orgs = if user.is_superadmin {
                tx.list_all_organizations().await?
            } else {
                tx.list_organizations_for_user(user_id).await?
            };
            Ok(orgs)
        })
        .await
    }

    pub async fn get(&self, ctx: &RequestContext, organization_id: Uuid) -> CoreResult<Organization> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            tx.organization_by_id(organization_id)
                .await?
                .ok_or(CoreError::NotFound("Organization"))
        })
        .await
    }

    /// Renames an organization; the slug is kept
    pub async fn update(&self, ctx: &RequestContext, organization_id: Uuid, name: &str) -> CoreResult<Organization> {
        ctx.run(async {
            let name = required_name(name)?;

            let mut tx = self.store.begin().await?;
            let org = tx
                .rename_organization(organization_id, &name)
                .await?
                .ok_or(CoreError::NotFound("Organization"))?;
            tx.commit().await?;

            info!(request_id = %ctx.request_id(), organization_id = %org.id, "Organization renamed");
            Ok(org)
        })
        .await
    }

    /// Members with profiles, in join order
    pub async fn list_members(&self, ctx: &RequestContext, organization_id: Uuid) -> CoreResult<Vec<MemberProfile>> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            tx.organization_by_id(organization_id)
                .await?
                .ok_or(CoreError::NotFound("Organization"))?;
            Ok(tx.list_members(organization_id).await?)
        })
        .await
    }

    /// Removes a member, refusing to remove the last admin
    ///
    /// The organization row is locked first, so two concurrent removals of
    /// different admins cannot both observe two admins.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` if the organization does not exist
    /// - `CoreError::MemberNotFound` if the user is not a member
    /// - `CoreError::LastAdmin` if the user is the only admin
    pub async fn remove_member(&self, ctx: &RequestContext, organization_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            tx.lock_organization(organization_id)
                .await?
                .ok_or(CoreError::NotFound("Organization"))?;

            let membership = tx
                .membership(organization_id, user_id)
                .await?
                .ok_or(CoreError::MemberNotFound)?;

            if membership.role.is_admin() && tx.count_admins(organization_id).await? <= 1 {
                return Err(CoreError::LastAdmin);
            }

            if !tx.delete_membership(organization_id, user_id).await? {
                return Err(CoreError::MemberNotFound);
            }
            tx.commit().await?;

            info!(
                request_id = %ctx.request_id(),
                organization_id = %organization_id,
                user_id = %user_id,
                "Member removed"
            );
            Ok(())
        })
        .await
    }
}

fn required_name(name: &str) -> CoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("name", "Name is required"));
    }
    Ok(name.to_string())
}

fn with_suffix(base: &str) -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    format!("{}-{}", base, hex::encode(bytes))
}
