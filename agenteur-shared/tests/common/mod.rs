//! Shared fixtures for the in-memory flow tests

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use agenteur_shared::{
    auth::{jwt::TokenCodec, password::HashCost},
    context::RequestContext,
    notifier::{InvitationNotice, Notifier, NotifierError},
    services::{
        invitations::InvitationSettings,
        session::{IssuedSession, SessionSettings, SignupInput},
        Services,
    },
    store::{MemoryStore, Store, UserRepository},
};
use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const PASSWORD: &str = "correct horse battery";

/// Notifier that records notices and can be told to fail
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<InvitationNotice>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<InvitationNotice> {
        self.sent.lock().expect("Notifier lock poisoned").clone()
    }

    /// Raw token from the most recent invite link
    pub fn last_token(&self) -> String {
        let sent = self.sent();
        let notice = sent.last().expect("Should have sent an invitation");
        notice
            .invite_url
            .rsplit('/')
            .next()
            .expect("Invite URL should end in a token")
            .to_string()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotifierError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifierError::Delivery("smtp unavailable".to_string()));
        }
        self.sent
            .lock()
            .expect("Notifier lock poisoned")
            .push(notice.clone());
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub services: Services,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(InvitationSettings {
            ttl: Duration::days(7),
            base_url: "http://localhost:5173/invitations".to_string(),
        })
    }

    pub fn with_settings(invitation: InvitationSettings) -> Self {
        Self::build(Duration::days(7), invitation)
    }

    /// Fixture whose refresh tokens live for `refresh_ttl`
    pub fn with_refresh_ttl(refresh_ttl: Duration) -> Self {
        Self::build(
            refresh_ttl,
            InvitationSettings {
                ttl: Duration::days(7),
                base_url: "http://localhost:5173/invitations".to_string(),
            },
        )
    }

    fn build(refresh_ttl: Duration, invitation: InvitationSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services::new(
            store.clone(),
            notifier.clone(),
            TokenCodec::new(JWT_SECRET, Duration::minutes(15)),
            SessionSettings {
                refresh_ttl,
                hash_cost: HashCost::minimal(),
            },
            invitation,
        );

        Self {
            store,
            notifier,
            services,
        }
    }

    pub async fn signup(&self, email: &str, first_name: &str) -> IssuedSession {
        self.services
            .sessions
            .signup(
                &ctx(),
                SignupInput {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    first_name: first_name.to_string(),
                    last_name: "Tester".to_string(),
                },
            )
            .await
            .expect("Signup should succeed")
    }

    pub async fn make_superadmin(&self, user_id: Uuid) {
        let mut tx = self.store.begin().await.expect("Should begin");
        tx.set_user_superadmin(user_id, true)
            .await
            .expect("Should update")
            .expect("User should exist");
        tx.commit().await.expect("Should commit");
    }
}

pub fn ctx() -> RequestContext {
    RequestContext::detached()
}
