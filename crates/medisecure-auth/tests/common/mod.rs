//! Test utilities and common setup.
#![allow(clippy::field_reassign_with_default, dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
    routing::{get, post},
};
use chrono::{DateTime, TimeZone, Utc};
use medisecure_auth::auth::{FixedClock, bearer_token_from_header};
use medisecure_auth::user::{InMemoryCredentialStore, StoreResult};
use medisecure_auth::{
    Account, AccountRole, AuthConfig, AuthError, AuthService, Claims, CredentialStore,
    LoginResponse, StoreError,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";
pub const NURSE_EMAIL: &str = "nurse@example.com";
pub const NURSE_SECRET: &str = "Secret123!";

/// Fast bcrypt cost for tests.
pub const TEST_COST: u32 = 4;

/// Create a test AuthConfig with a JWT secret and a cheap bcrypt cost.
pub fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.jwt_secret = Some(JWT_SECRET.to_string());
    config.bcrypt_cost = TEST_COST;
    config
}

/// Fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub fn make_account(id: &str, email: &str, secret: &str, role: AccountRole, active: bool) -> Account {
    let created = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
    Account {
        id: id.to_string(),
        email: email.to_string(),
        password_hash: bcrypt::hash(secret, TEST_COST).expect("Failed to hash password"),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        role,
        is_active: active,
        created_at: created,
        updated_at: created,
    }
}

pub fn nurse() -> Account {
    make_account("acc_nurse", NURSE_EMAIL, NURSE_SECRET, AccountRole::Nurse, true)
}

/// Store holding the active nurse plus an inactive doctor.
pub fn seeded_store() -> Arc<InMemoryCredentialStore> {
    let store = InMemoryCredentialStore::new();
    store.insert(nurse());
    store.insert(make_account(
        "acc_inactive",
        "inactive@example.com",
        NURSE_SECRET,
        AccountRole::Doctor,
        false,
    ));
    Arc::new(store)
}

/// Service over the seeded store with a clock fixed at [`t0`].
pub fn test_service(config: AuthConfig) -> (AuthService, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(t0()));
    let service = AuthService::new(config, seeded_store())
        .expect("test config must be valid")
        .with_clock(clock.clone());
    (service, clock)
}

/// Store that always fails.
pub struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn lookup_by_identifier(&self, _identifier: &str) -> StoreResult<Option<Account>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Store that answers only after a delay.
pub struct SlowStore {
    pub delay: Duration,
    pub inner: Arc<InMemoryCredentialStore>,
}

#[async_trait]
impl CredentialStore for SlowStore {
    async fn lookup_by_identifier(&self, identifier: &str) -> StoreResult<Option<Account>> {
        tokio::time::sleep(self.delay).await;
        self.inner.lookup_by_identifier(identifier).await
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(service): State<AuthService>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    service
        .login(&request.email, &request.password)
        .await
        .map(Json)
}

async fn me(State(service): State<AuthService>, headers: HeaderMap) -> Result<Json<Claims>, AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token_from_header)
        .ok_or(AuthError::InvalidSignature)?;
    service.verify_token(token).map(Json)
}

/// Minimal router exercising the error-to-response mapping.
pub fn test_app(service: AuthService) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/me", get(me))
        .with_state(service)
}
