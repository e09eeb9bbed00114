//! Shared harness for the HTTP tests
//!
//! Builds the full router over an in-memory store and a recording notifier,
//! and sends requests through it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use agenteur_api::{
    app::{build_router, AppState},
    config::Config,
};
use agenteur_shared::{
    auth::password::HashCost,
    notifier::{InvitationNotice, Notifier, NotifierError},
    store::{MemoryStore, Store, UserRepository},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery";

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<InvitationNotice>>,
}

impl RecordingNotifier {
    /// Raw token from the most recent invite link
    pub fn last_token(&self) -> String {
        let sent = self.sent.lock().expect("Notifier lock poisoned");
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
        self.sent
            .lock()
            .expect("Notifier lock poisoned")
            .push(notice.clone());
        Ok(())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgresql://localhost/agenteur_test".to_string()),
        "JWT_SECRET" => Some("test-secret-key-at-least-32-bytes-long".to_string()),
        _ => None,
    })
    .expect("Test config should load");
    config.password = HashCost::minimal();
    config
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Full `Set-Cookie` value for `name`
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&prefix))
            .map(str::to_string)
    }

    /// Value part of the `Set-Cookie` for `name`
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        let cookie = self.set_cookie(name)?;
        let pair = cookie.split(';').next()?;
        pair.split_once('=').map(|(_, value)| value.to_string())
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(store.clone(), notifier.clone(), test_config());

        Self {
            router: build_router(state),
            store,
            notifier,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router should respond");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Body should be JSON")
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sends a JSON request; mutating methods always carry the JSON content type
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if method != Method::GET {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("Should build request")).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Signs up and returns `(user_id, access_token)`
    pub async fn signup(&self, email: &str, first_name: &str) -> (Uuid, String) {
        let response = self
            .post(
                "/api/auth/signup",
                None,
                serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "firstName": first_name,
                    "lastName": "Tester",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        let data = &response.body["data"];
        let user_id = data["user"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("Should return the user id");
        let token = data["accessToken"]
            .as_str()
            .expect("Should return an access token")
            .to_string();

        (user_id, token)
    }

    /// Creates an organization and returns its id
    pub async fn create_organization(&self, token: &str, name: &str) -> String {
        let response = self
            .post(
                "/api/organizations",
                Some(token),
                serde_json::json!({ "name": name }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        response.body["data"]["id"]
            .as_str()
            .expect("Should return the organization id")
            .to_string()
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
