//! Credential storage for remote providers.
//!
//! API keys are held in a [`SecretValue`] that zeroizes its memory on drop
//! and never appears in `Debug` output. A [`Credential`] is the
//! provider-owned slot for one key: it is captured at construction and only
//! changes through an explicit [`Credential::replace`].

use std::fmt;
use std::sync::{PoisonError, RwLock};

use zeroize::Zeroize;

/// A secret string with automatic zeroization.
#[derive(Clone)]
pub struct SecretValue {
    inner: String,
}

impl SecretValue {
    /// Wrap a secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the secret value as a string slice.
    ///
    /// Only call this when building an outbound request.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True for an empty secret.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("inner", &"[REDACTED]")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

/// A provider's current credential, possibly absent.
///
/// Presence is what makes a remote provider `enabled()`, so it is read on
/// every call rather than cached by the router.
#[derive(Debug, Default)]
pub struct Credential {
    value: RwLock<Option<SecretValue>>,
}

impl Credential {
    /// Capture a credential. Blank keys count as absent.
    pub fn new(key: Option<&str>) -> Self {
        Self {
            value: RwLock::new(normalize(key)),
        }
    }

    /// Whether a non-empty key is present.
    pub fn is_set(&self) -> bool {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Clone out the current secret for one request.
    pub fn get(&self) -> Option<SecretValue> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new credential (or clear it). Returns whether one is now set.
    pub fn replace(&self, key: Option<&str>) -> bool {
        let mut slot = self.value.write().unwrap_or_else(PoisonError::into_inner);
        *slot = normalize(key);
        slot.is_some()
    }
}

fn normalize(key: Option<&str>) -> Option<SecretValue> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(SecretValue::new)
}
