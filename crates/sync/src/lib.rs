//! Driftwood Sync - the client-side cart & wishlist synchronization engine.
//!
//! Maintains a local authoritative view of a shopper's cart and wishlist and
//! reconciles it with the remote persistence service, across two identity
//! regimes: an anonymous visitor tracked by a server-minted guest token, and
//! a signed-in shopper tracked by a bearer session credential.
//!
//! # Architecture
//!
//! - UI mutations land in the local stores synchronously (optimistic)
//! - The [`scheduler`] debounces cart mutations into one full-list write per
//!   quiet window; wishlist writes go out directly, per action
//! - The [`api`] client normalizes the server's heterogeneous payload shapes
//!   into the flat local shapes and captures refreshed guest tokens on every
//!   response
//! - On success the server's canonical state replaces the local store;
//!   on failure local optimistic state is kept and converges later
//!   (at-least-once, last-write-wins)
//!
//! # Example
//!
//! ```rust,ignore
//! use driftwood_sync::{CartItemDraft, ShopSession, SyncConfig};
//!
//! let config = SyncConfig::from_env()?;
//! let session = ShopSession::new(&config);
//! session.hydrate().await;
//!
//! session.add_to_cart(draft, 1);          // debounced sync
//! session.flush_cart().await?;            // guaranteed flush before checkout
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod identity;
pub mod scheduler;
pub mod session;
pub mod wishlist;

pub use api::{GUEST_TOKEN_HEADER, StoreApiClient, StoreApiError};
pub use cart::{CartItemDraft, CartLineItem, CartStore, merge_lines};
pub use config::{ConfigError, SyncConfig};
pub use identity::{GuestToken, IdentityProvider, RequestIdentity};
pub use scheduler::{CartBackend, SyncScheduler};
pub use session::ShopSession;
pub use wishlist::{WishlistEntry, WishlistSnapshot, WishlistStore};
