//! Integration tests for Driftwood.
//!
//! Each test drives the real sync engine against an in-process stub of the
//! persistence service (see [`stub`]), bound to an ephemeral port.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p driftwood-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - Debounced cart writes, merging, canonical replacement
//! - `wishlist_sync` - Direct wishlist writes, dedup, snapshot tagging
//! - `identity` - Guest token capture/persistence, bearer hand-off

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod stub;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

use driftwood_sync::{ShopSession, SyncConfig};

pub use stub::{RecordedRequest, StubState, stub_router};

/// Debounce quiet window used by test sessions.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(40);

/// A running stub service plus the configuration to reach it.
pub struct TestContext {
    pub state: Arc<StubState>,
    pub base_url: Url,
    token_dir: PathBuf,
}

impl TestContext {
    /// Start a stub service on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the stub service cannot be started.
    pub async fn new() -> Self {
        init_tracing();

        let state = Arc::new(StubState::default());
        let router = stub_router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve stub");
        });

        let base_url = Url::parse(&format!("http://{addr}")).expect("stub base url");
        let token_dir = std::env::temp_dir().join(format!("driftwood-it-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&token_dir).expect("create token dir");

        Self {
            state,
            base_url,
            token_dir,
        }
    }

    /// Where this context persists the guest token.
    #[must_use]
    pub fn token_file(&self) -> PathBuf {
        self.token_dir.join("guest-token")
    }

    /// Engine configuration pointed at the stub, with a short debounce.
    #[must_use]
    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(self.base_url.clone())
            .with_debounce(TEST_DEBOUNCE)
            .with_guest_token_file(Some(self.token_file()))
    }

    /// A fresh session over this context's stub and token file.
    #[must_use]
    pub fn session(&self) -> ShopSession {
        ShopSession::new(&self.config())
    }

    /// Pre-write a durable guest token, as a previous visit would have.
    ///
    /// # Panics
    ///
    /// Panics if the token file cannot be written.
    pub fn seed_guest_token(&self, token: &str) {
        std::fs::write(self.token_file(), token).expect("seed guest token");
    }

    /// The persisted guest token, if any.
    #[must_use]
    pub fn persisted_token(&self) -> Option<String> {
        std::fs::read_to_string(self.token_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Wait out the debounce window plus in-flight writes.
    pub async fn settle(&self) {
        tokio::time::sleep(TEST_DEBOUNCE * 6).await;
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "driftwood_sync=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
