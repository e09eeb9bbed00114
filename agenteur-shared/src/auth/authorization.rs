/// Organization-scoped authorization
///
/// Access is resolved per request from storage: the user's superadmin flag
/// and their membership row in the target organization. The superadmin flag
/// carried in access tokens is never consulted here.
///
/// # Permission Model
///
/// 1. **Superadmin**: passes every gate; sees any organization as `admin`
/// 2. **Organization admin**: membership with role `admin`
/// 3. **Organization member**: any membership row
/// 4. **Denied**: no membership and not a superadmin
///
/// The resolved [`OrgAccess`] is then run through an ordered slice of
/// [`Gate`] functions. The first failing gate decides the error.
///
/// # Example
///
/// ```no_run
/// use agenteur_shared::auth::authorization::{MembershipAuthorizer, ADMIN_GATES};
/// use agenteur_shared::context::RequestContext;
/// # use std::sync::Arc;
/// # use agenteur_shared::store::MemoryStore;
/// # use uuid::Uuid;
///
/// # async fn example(user_id: Uuid, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let authorizer = MembershipAuthorizer::new(Arc::new(MemoryStore::new()));
/// let ctx = RequestContext::detached();
///
/// let access = authorizer.authorize(&ctx, user_id, org_id, ADMIN_GATES).await?;
/// assert!(access.role().is_some_and(|r| r.is_admin()));
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    context::RequestContext,
    error::{CoreError, CoreResult},
    models::{
        membership::{Membership, MembershipRole},
        user::User,
    },
    store::{MembershipRepository, Store, UserRepository},
};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of organization {0}")]
    NotMember(Uuid),

    #[error("Admin access required for organization {0}")]
    NotAdmin(Uuid),

    #[error("Superadmin access required")]
    NotSuperadmin,
}

/// Access level of a principal within one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Superadmin,
    OrgAdmin,
    OrgMember,
    Denied,
}

impl Access {
    /// Combines the stored superadmin flag with the membership row, if any
    pub fn resolve(is_superadmin: bool, membership: Option<&Membership>) -> Self {
        if is_superadmin {
            return Access::Superadmin;
        }
        match membership.map(|m| m.role) {
            Some(MembershipRole::Admin) => Access::OrgAdmin,
            Some(MembershipRole::User) => Access::OrgMember,
            None => Access::Denied,
        }
    }
}

/// Resolved access handed to gates and, once they pass, to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgAccess {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub access: Access,

    /// Stored membership; `None` for a superadmin outside the organization
    pub membership: Option<Membership>,
}

impl OrgAccess {
    /// Effective role; a superadmin without a row acts as `admin`
    pub fn role(&self) -> Option<MembershipRole> {
        match self.access {
            Access::Superadmin | Access::OrgAdmin => Some(MembershipRole::Admin),
            Access::OrgMember => Some(MembershipRole::User),
            Access::Denied => None,
        }
    }
}

/// One authorization rule
pub type Gate = fn(&OrgAccess) -> Result<(), AuthzError>;

/// Passes for superadmins and any member
pub fn member_gate(access: &OrgAccess) -> Result<(), AuthzError> {
    match access.access {
        Access::Denied => Err(AuthzError::NotMember(access.organization_id)),
        _ => Ok(()),
    }
}

/// Passes for superadmins and organization admins
pub fn admin_gate(access: &OrgAccess) -> Result<(), AuthzError> {
    match access.access {
        Access::Superadmin | Access::OrgAdmin => Ok(()),
        Access::OrgMember => Err(AuthzError::NotAdmin(access.organization_id)),
        Access::Denied => Err(AuthzError::NotMember(access.organization_id)),
    }
}

pub const MEMBER_GATES: &[Gate] = &[member_gate];
pub const ADMIN_GATES: &[Gate] = &[member_gate, admin_gate];

/// Runs gates in order, stopping at the first failure
pub fn check(access: &OrgAccess, gates: &[Gate]) -> Result<(), AuthzError> {
    gates.iter().try_for_each(|gate| gate(access))
}

/// Resolves access from storage and evaluates gates
#[derive(Clone)]
pub struct MembershipAuthorizer {
    store: Arc<dyn Store>,
}

impl MembershipAuthorizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolves the principal's access to an organization and applies `gates`
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidToken` if the user no longer exists
    /// - `CoreError::Forbidden` if a gate rejects
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        organization_id: Uuid,
        gates: &[Gate],
    ) -> CoreResult<OrgAccess> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let user = tx.user_by_id(user_id).await?.ok_or(CoreError::InvalidToken)?;
            let membership = tx.membership(organization_id, user_id).await?;
            drop(tx);

            let access = OrgAccess {
                organization_id,
                user_id,
                access: Access::resolve(user.is_superadmin, membership.as_ref()),
                membership,
            };
            check(&access, gates)?;

            Ok(access)
        })
        .await
    }

    /// Loads the user and requires the stored superadmin flag
    pub async fn require_superadmin(&self, ctx: &RequestContext, user_id: Uuid) -> CoreResult<User> {
        ctx.run(async {
            let mut tx = self.store.begin().await?;
            let user = tx.user_by_id(user_id).await?.ok_or(CoreError::InvalidToken)?;

            if !user.is_superadmin {
                return Err(AuthzError::NotSuperadmin.into());
            }
            Ok(user)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn membership(role: MembershipRole) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn access(is_superadmin: bool, role: Option<MembershipRole>) -> OrgAccess {
        let membership = role.map(membership);
        OrgAccess {
            organization_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            access: Access::resolve(is_superadmin, membership.as_ref()),
            membership,
        }
    }

    #[test]
    fn test_resolve() {
        assert_eq!(Access::resolve(true, None), Access::Superadmin);
        assert_eq!(
            Access::resolve(true, Some(&membership(MembershipRole::User))),
            Access::Superadmin
        );
        assert_eq!(Access::resolve(false, Some(&membership(MembershipRole::Admin))), Access::OrgAdmin);
        assert_eq!(Access::resolve(false, Some(&membership(MembershipRole::User))), Access::OrgMember);
        assert_eq!(Access::resolve(false, None), Access::Denied);
    }

    #[test]
    fn test_superadmin_without_row_acts_as_admin() {
        let a = access(true, None);
        assert_eq!(a.role(), Some(MembershipRole::Admin));
        assert!(check(&a, ADMIN_GATES).is_ok());
    }

    #[test]
    fn test_member_gates() {
        assert!(check(&access(false, Some(MembershipRole::User)), MEMBER_GATES).is_ok());

        let denied = access(false, None);
        assert_eq!(
            check(&denied, MEMBER_GATES),
            Err(AuthzError::NotMember(denied.organization_id))
        );
    }

    #[test]
    fn test_admin_gates() {
        assert!(check(&access(false, Some(MembershipRole::Admin)), ADMIN_GATES).is_ok());

        let member = access(false, Some(MembershipRole::User));
        assert_eq!(
            check(&member, ADMIN_GATES),
            Err(AuthzError::NotAdmin(member.organization_id))
        );

        // Member gate runs first.
        let denied = access(false, None);
        assert_eq!(
            check(&denied, ADMIN_GATES),
            Err(AuthzError::NotMember(denied.organization_id))
        );
    }

    #[test]
    fn test_empty_gate_list_passes() {
        assert!(check(&access(false, None), &[]).is_ok());
    }
}
