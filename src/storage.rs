//! Secure terminal config storage using the OS credential store.
//!
//! On Windows this uses DPAPI (via the `keyring` crate), on macOS Keychain,
//! and on Linux the Secret Service API. Holds the long-lived refresh token
//! and the backend base URL; the short-lived access token never touches disk.

use keyring::Entry;
use tracing::{info, warn};

use crate::auth::TokenVault;

const SERVICE_NAME: &str = "smartdine-terminal";

// Credential keys
const KEY_BASE_URL: &str = "backend_base_url";
const KEY_REFRESH_TOKEN: &str = "refresh_token";
const KEY_DEVICE_ID: &str = "device_id";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[KEY_BASE_URL, KEY_REFRESH_TOKEN, KEY_DEVICE_ID];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

pub fn has_credential(key: &str) -> bool {
    get_credential(key).is_some()
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

/// The terminal is considered configured once a backend base URL is stored.
pub fn is_configured() -> bool {
    has_credential(KEY_BASE_URL)
}

pub fn get_base_url() -> Option<String> {
    get_credential(KEY_BASE_URL)
}

pub fn set_base_url(url: &str) -> Result<(), String> {
    set_credential(KEY_BASE_URL, url)
}

/// Stable per-install identifier, generated on first use. Sent as a request
/// header so the backend can tell terminals apart in its logs.
pub fn device_id() -> String {
    if let Some(existing) = get_credential(KEY_DEVICE_ID) {
        return existing;
    }
    let generated = uuid::Uuid::new_v4().to_string();
    if let Err(e) = set_credential(KEY_DEVICE_ID, &generated) {
        warn!(error = %e, "keyring: failed to persist device id, using ephemeral one");
    }
    generated
}

/// Delete every stored credential (factory reset / full logout).
pub fn factory_reset() -> Result<(), String> {
    info!("performing factory reset - deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Refresh-token vault
// ---------------------------------------------------------------------------

/// [`TokenVault`] backed by the OS keyring. This is the production vault; the
/// auth service itself stays storage-agnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringVault;

impl TokenVault for KeyringVault {
    fn load_refresh_token(&self) -> Option<String> {
        get_credential(KEY_REFRESH_TOKEN)
    }

    fn store_refresh_token(&self, token: &str) -> Result<(), String> {
        set_credential(KEY_REFRESH_TOKEN, token)
    }

    fn clear_refresh_token(&self) -> Result<(), String> {
        delete_credential(KEY_REFRESH_TOKEN)
    }
}
