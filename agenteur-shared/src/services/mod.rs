/// Core operations
///
/// Every operation takes a [`RequestContext`](crate::context::RequestContext)
/// and runs its transaction inside `ctx.run`, so cancellation drops the
/// uncommitted transaction.
///
/// - `session`: signup, login, refresh rotation, logout
/// - `organizations`: organization CRUD and member removal
/// - `invitations`: invite, look up, accept
/// - `users`: profile and superadmin directory

use std::sync::Arc;

use crate::{
    auth::{authorization::MembershipAuthorizer, jwt::TokenCodec},
    notifier::Notifier,
    store::Store,
};

pub mod invitations;
pub mod organizations;
pub mod session;
pub mod users;

use invitations::{InvitationService, InvitationSettings};
use organizations::OrganizationService;
use session::{SessionManager, SessionSettings};
use users::UserService;

/// All services over one store
#[derive(Clone)]
pub struct Services {
    pub sessions: SessionManager,
    pub authorizer: MembershipAuthorizer,
    pub organizations: OrganizationService,
    pub invitations: InvitationService,
    pub users: UserService,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        codec: TokenCodec,
        session: SessionSettings,
        invitation: InvitationSettings,
    ) -> Self {
        Self {
            sessions: SessionManager::new(store.clone(), codec, session),
            authorizer: MembershipAuthorizer::new(store.clone()),
            organizations: OrganizationService::new(store.clone()),
            invitations: InvitationService::new(store.clone(), notifier, invitation),
            users: UserService::new(store),
        }
    }
}
