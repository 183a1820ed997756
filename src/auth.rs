//! Bearer-token session service.
//!
//! One injected service owns both tokens: the short-lived access token lives
//! only in memory (zeroized on drop), the refresh token sits in a
//! [`TokenVault`] (the OS keyring in production). Every outgoing staff
//! request asks `get_valid_access_token()`, which transparently refreshes an
//! absent or expired access token and logs the terminal out when the backend
//! rejects the refresh. Components never read token storage directly.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::events::{EventBus, UiEvent};

/// Timeout for the token-refresh call.
const REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// An access token this close to its `exp` claim is treated as already
/// expired, so a request never leaves with a token that dies in flight.
const EXPIRY_LEEWAY_SECS: i64 = 30;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("token refresh failed: {0}")]
    Network(String),
    #[error("token refresh failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Refresh-token persistence seam
// ---------------------------------------------------------------------------

/// Where the long-lived refresh token is kept between runs. Production uses
/// the OS keyring ([`crate::storage::KeyringVault`]); tests use [`MemoryVault`].
pub trait TokenVault: Send + Sync {
    fn load_refresh_token(&self) -> Option<String>;
    fn store_refresh_token(&self, token: &str) -> Result<(), String>;
    fn clear_refresh_token(&self) -> Result<(), String>;
}

/// Process-local vault with no persistence. Suitable for tests and for
/// customer-facing flows that never authenticate.
#[derive(Default)]
pub struct MemoryVault {
    token: Mutex<Option<String>>,
}

impl TokenVault for MemoryVault {
    fn load_refresh_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|g| g.clone())
    }

    fn store_refresh_token(&self, token: &str) -> Result<(), String> {
        *self.token.lock().map_err(|e| e.to_string())? = Some(token.to_string());
        Ok(())
    }

    fn clear_refresh_token(&self) -> Result<(), String> {
        *self.token.lock().map_err(|e| e.to_string())? = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JWT expiry inspection
// ---------------------------------------------------------------------------

/// Extract the `exp` claim from a JWT without verifying the signature.
/// Verification is the backend's job; we only need the timestamp to decide
/// whether a refresh is worth attempting before the request.
fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let claims: Value = serde_json::from_slice(&payload).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

/// A token without a parseable `exp` claim is treated as non-expiring; the
/// backend will still answer 401 if it disagrees.
fn token_is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match token_expiry(token) {
        Some(expiry) => expiry <= now + Duration::seconds(EXPIRY_LEEWAY_SECS),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Auth service
// ---------------------------------------------------------------------------

pub struct AuthService {
    access: Mutex<Option<Zeroizing<String>>>,
    vault: Box<dyn TokenVault>,
    refresh_url: String,
    http: reqwest::Client,
    events: EventBus,
    /// Serializes concurrent refresh attempts so overlapping requests share
    /// one refresh call instead of racing the backend.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AuthService {
    pub fn new(base_url: &str, vault: Box<dyn TokenVault>, events: EventBus) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            access: Mutex::new(None),
            vault,
            refresh_url: format!("{}/auth/token/refresh/", base_url.trim_end_matches('/')),
            http,
            events,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Install a fresh session after login.
    pub fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<(), String> {
        self.vault.store_refresh_token(refresh_token)?;
        if let Ok(mut guard) = self.access.lock() {
            *guard = Some(Zeroizing::new(access_token.to_string()));
        }
        info!("session installed");
        Ok(())
    }

    /// Drop both tokens and tell the UI to show the login screen.
    pub fn clear_session(&self) {
        if let Ok(mut guard) = self.access.lock() {
            *guard = None;
        }
        if let Err(e) = self.vault.clear_refresh_token() {
            warn!(error = %e, "failed to clear refresh token");
        }
        self.events.emit(UiEvent::SessionExpired);
    }

    pub fn is_logged_in(&self) -> bool {
        let has_access = self
            .access
            .lock()
            .map(|g| g.is_some())
            .unwrap_or(false);
        has_access || self.vault.load_refresh_token().is_some()
    }

    /// Return an access token that is valid right now, refreshing first when
    /// the cached one is missing or about to expire.
    ///
    /// A refresh the backend *rejects* clears both tokens (logged-out state);
    /// a refresh that merely fails on the network keeps them, since going
    /// offline should not log the terminal out.
    pub async fn get_valid_access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cached_access_token(Utc::now()) {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while we waited on the gate.
        if let Some(token) = self.cached_access_token(Utc::now()) {
            return Ok(token);
        }

        let refresh_token = self
            .vault
            .load_refresh_token()
            .ok_or(AuthError::NotLoggedIn)?;

        debug!("access token missing or expiring, refreshing");
        let resp = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        self.apply_refresh_outcome(status, &body)
    }

    fn cached_access_token(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.access.lock().ok()?;
        let token = guard.as_ref()?;
        if token_is_expired(token, now) {
            return None;
        }
        Some(token.to_string())
    }

    /// Apply the backend's answer to a refresh call. Split out so the
    /// rejection path is testable without a live backend.
    fn apply_refresh_outcome(&self, status: u16, body: &Value) -> Result<String, AuthError> {
        if (200..300).contains(&status) {
            let access = body
                .get("access")
                .and_then(Value::as_str)
                .ok_or_else(|| AuthError::Backend("refresh response missing access token".into()))?
                .to_string();
            if let Ok(mut guard) = self.access.lock() {
                *guard = Some(Zeroizing::new(access.clone()));
            }
            // Some backends rotate the refresh token on use.
            if let Some(rotated) = body.get("refresh").and_then(Value::as_str) {
                if let Err(e) = self.vault.store_refresh_token(rotated) {
                    warn!(error = %e, "failed to store rotated refresh token");
                }
            }
            debug!("access token refreshed");
            return Ok(access);
        }

        if (400..500).contains(&status) {
            warn!(status, "refresh token rejected, clearing session");
            self.clear_session();
            return Err(AuthError::SessionExpired);
        }

        Err(AuthError::Backend(format!(
            "token refresh failed (HTTP {status})"
        )))
    }
}
