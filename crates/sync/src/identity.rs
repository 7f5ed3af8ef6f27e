//! Identity resolution for sync requests.
//!
//! Exactly one identity is active at a time: a server-minted guest token for
//! anonymous visitors, or a bearer session credential for signed-in shoppers.
//! The credential always takes precedence and suppresses the guest header.
//!
//! The guest token is persisted to a configured file so an anonymous cart
//! survives restarts; if that storage is unavailable the resolver degrades to
//! an in-memory token for the session, which is non-fatal.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Opaque identifier for an anonymous visitor's cart/wishlist ownership.
///
/// Minted by the persistence service and mirrored by a server-set cookie;
/// this engine only stores and replays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestToken(String);

impl GuestToken {
    /// Wrap a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the underlying token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GuestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity to attach to one outbound request.
pub enum RequestIdentity {
    /// Signed-in shopper; send the bearer credential, no guest header.
    User(SecretString),
    /// Anonymous visitor with a known guest token.
    Guest(GuestToken),
    /// First contact; send nothing and let the server mint a token.
    Anonymous,
}

/// Process-scoped identity handle passed into the sync components.
///
/// Cheaply cloneable via `Arc`. Token writes are idempotent and
/// last-value-wins; they happen from bootstrap and from every response
/// interceptor, so no coordination beyond the `RwLock` is needed.
#[derive(Clone)]
pub struct IdentityProvider {
    inner: Arc<IdentityInner>,
}

struct IdentityInner {
    guest_token: RwLock<Option<GuestToken>>,
    credential: RwLock<Option<SecretString>>,
    /// `None` when durable storage is unavailable (in-memory degrade).
    token_file: Option<PathBuf>,
}

impl IdentityProvider {
    /// Create a provider, loading any durable guest token from `token_file`.
    ///
    /// A missing file simply means no token yet; an unreadable one degrades
    /// the provider to in-memory-only for this session.
    #[must_use]
    pub fn new(token_file: Option<PathBuf>) -> Self {
        let (guest_token, token_file) = match token_file {
            Some(path) => match load_token(&path) {
                Ok(token) => (token, Some(path)),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "guest token storage unavailable, using in-memory token for this session"
                    );
                    (None, None)
                }
            },
            None => (None, None),
        };

        Self {
            inner: Arc::new(IdentityInner {
                guest_token: RwLock::new(guest_token),
                credential: RwLock::new(None),
                token_file,
            }),
        }
    }

    /// The identity to attach to the next outbound request.
    #[must_use]
    pub fn current(&self) -> RequestIdentity {
        if let Some(credential) = self.credential() {
            return RequestIdentity::User(credential);
        }
        match self.guest_token() {
            Some(token) => RequestIdentity::Guest(token),
            None => RequestIdentity::Anonymous,
        }
    }

    /// The currently held guest token, if any.
    #[must_use]
    pub fn guest_token(&self) -> Option<GuestToken> {
        self.inner
            .guest_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a bearer session credential is active.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// Adopt a guest token returned by the server and persist it.
    ///
    /// Called for every response, success or error. Blank and unchanged
    /// tokens are ignored.
    pub fn adopt_guest_token(&self, token: &str) {
        let token = token.trim();
        if token.is_empty() {
            return;
        }

        {
            let mut held = self
                .inner
                .guest_token
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if held.as_ref().is_some_and(|t| t.as_str() == token) {
                return;
            }
            *held = Some(GuestToken::new(token));
        }

        self.persist(token);
    }

    /// Activate a bearer session credential (sign-in hand-off).
    pub fn set_credential(&self, credential: SecretString) {
        *self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Drop the bearer session credential (sign-out).
    pub fn clear_credential(&self) {
        *self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn credential(&self) -> Option<SecretString> {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| SecretString::from(c.expose_secret().to_string()))
    }

    /// Best-effort durable write; failures degrade to memory-only behavior.
    fn persist(&self, token: &str) {
        let Some(path) = &self.inner.token_file else {
            return;
        };

        if let Err(e) = write_token(path, token) {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to persist guest token, it will live in memory only"
            );
        }
    }
}

/// Read a previously persisted token. Missing file is not an error.
fn load_token(path: &Path) -> io::Result<Option<GuestToken>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let token = contents.trim();
            if token.is_empty() {
                Ok(None)
            } else {
                Ok(Some(GuestToken::new(token)))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_token(path: &Path, token: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("driftwood-identity-tests")
            .join(format!("{name}-{}", std::process::id()))
    }

    #[test]
    fn test_adopted_token_is_persisted_and_reloaded() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);

        let provider = IdentityProvider::new(Some(path.clone()));
        assert!(provider.guest_token().is_none());

        provider.adopt_guest_token("guest-abc123");
        assert_eq!(provider.guest_token().unwrap().as_str(), "guest-abc123");

        // A fresh provider over the same file picks the token back up.
        let reloaded = IdentityProvider::new(Some(path.clone()));
        assert_eq!(reloaded.guest_token().unwrap().as_str(), "guest-abc123");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_blank_and_unchanged_tokens_are_ignored() {
        let provider = IdentityProvider::new(None);
        provider.adopt_guest_token("   ");
        assert!(provider.guest_token().is_none());

        provider.adopt_guest_token("guest-1");
        provider.adopt_guest_token("  guest-1  ");
        assert_eq!(provider.guest_token().unwrap().as_str(), "guest-1");
    }

    #[test]
    fn test_credential_takes_precedence_over_guest_token() {
        let provider = IdentityProvider::new(None);
        provider.adopt_guest_token("guest-1");
        provider.set_credential(SecretString::from("session-token"));

        assert!(matches!(provider.current(), RequestIdentity::User(_)));

        provider.clear_credential();
        assert!(matches!(provider.current(), RequestIdentity::Guest(_)));
    }

    #[test]
    fn test_unreadable_storage_degrades_to_memory() {
        // A directory in place of the token file makes the read fail with
        // something other than NotFound.
        let dir = temp_path("degrade-dir");
        std::fs::create_dir_all(&dir).unwrap();

        let provider = IdentityProvider::new(Some(dir.clone()));
        provider.adopt_guest_token("guest-mem");
        assert_eq!(provider.guest_token().unwrap().as_str(), "guest-mem");

        // Nothing was written into the directory.
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());

        let _ = std::fs::remove_dir(&dir);
    }
}
