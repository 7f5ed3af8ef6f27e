//! Debounced cart synchronization.
//!
//! The scheduler watches the local cart store and coalesces rapid mutations
//! into one outbound write per quiet window. Writes always carry the entire
//! line list - full-list replacement, never a diff, because diff application
//! is unsafe when network calls can complete out of order.
//!
//! The sync lifecycle is an explicit state machine: `Idle`,
//! `Pending` (an armed, abortable timer), and `InFlight`. Cancellation is a
//! transition back to `Idle` without firing; in-flight requests are
//! fire-and-forget and never aborted. Cross-client concurrency is not
//! coordinated - the last completed sync wins.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::StoreApiError;
use crate::cart::{CartLineItem, CartStore};

/// The write half of the reconciliation client, as the scheduler sees it.
///
/// A seam so tests can count and fail outbound writes without a server.
pub trait CartBackend: Send + Sync + 'static {
    /// Push the full line list; returns the server's canonical state.
    fn push_cart(
        &self,
        items: Vec<CartLineItem>,
    ) -> impl Future<Output = Result<Vec<CartLineItem>, StoreApiError>> + Send;
}

/// Where the cart sync lifecycle currently stands.
enum SyncState {
    /// Nothing scheduled or outstanding.
    Idle,
    /// A debounce timer is armed and can still be aborted.
    Pending(JoinHandle<()>),
    /// A write is on the wire.
    InFlight,
}

/// Debounces local cart mutations into full-list server writes.
///
/// Cheaply cloneable; clones share the same state machine.
pub struct SyncScheduler<B: CartBackend> {
    inner: Arc<SchedulerInner<B>>,
}

impl<B: CartBackend> Clone for SyncScheduler<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SchedulerInner<B> {
    backend: B,
    cart: Arc<Mutex<CartStore>>,
    window: Duration,
    state: Mutex<SyncState>,
    /// Serialized snapshot of the last state the server confirmed; used to
    /// detect no-op mutations.
    last_synced: Mutex<Option<String>>,
}

impl<B: CartBackend> SyncScheduler<B> {
    /// Create a scheduler over the given store with a fixed quiet window.
    #[must_use]
    pub fn new(backend: B, cart: Arc<Mutex<CartStore>>, window: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                backend,
                cart,
                window,
                state: Mutex::new(SyncState::Idle),
                last_synced: Mutex::new(None),
            }),
        }
    }

    /// Note that the cart changed; (re)arm the debounce timer.
    ///
    /// Mutations that leave the cart identical to the last-synced state are
    /// ignored. A mutation arriving while a write is in flight arms a timer
    /// for a subsequent write; the in-flight request is left alone.
    ///
    /// Must be called within a tokio runtime.
    pub fn schedule(&self) {
        let snapshot = snapshot_of(&self.inner.cart);
        {
            let last = self
                .inner
                .last_synced
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(snapshot.as_str()) {
                debug!("cart unchanged since last sync, not scheduling");
                return;
            }
        }

        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            run_sync(&inner).await;
        });

        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Always clear the previous handle before arming a new one.
        if let SyncState::Pending(previous) = &*state {
            previous.abort();
        }
        *state = SyncState::Pending(timer);
    }

    /// Record the current store contents as the synced baseline.
    ///
    /// Used after hydration and server-side clears, where canonical state
    /// arrived outside the debounce path.
    pub fn record_synced(&self) {
        let snapshot = snapshot_of(&self.inner.cart);
        *self
            .inner
            .last_synced
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Push the current cart immediately, bypassing the quiet window.
    ///
    /// The explicit path for callers that need a guaranteed flush before
    /// e.g. checkout; unlike the debounced path, failures propagate.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; local optimistic state is kept.
    pub async fn flush(&self) -> Result<(), StoreApiError> {
        self.transition_to_in_flight();
        let result = push_once(&self.inner).await;
        self.settle_in_flight();
        result
    }

    /// Drop any pending timer without a final flush.
    pub fn shutdown(&self) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let SyncState::Pending(timer) = &*state {
            timer.abort();
        }
        *state = SyncState::Idle;
    }

    fn transition_to_in_flight(&self) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let SyncState::Pending(timer) = &*state {
            timer.abort();
        }
        *state = SyncState::InFlight;
    }

    fn settle_in_flight(&self) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A mutation during the flight may have armed a new timer; only a
        // still-in-flight machine settles back to idle.
        if matches!(*state, SyncState::InFlight) {
            *state = SyncState::Idle;
        }
    }
}

/// The debounce timer fired: transition to in-flight and push.
async fn run_sync<B: CartBackend>(inner: &Arc<SchedulerInner<B>>) {
    {
        let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = SyncState::InFlight;
    }

    if let Err(e) = push_once(inner).await {
        // Passive write failure: keep optimistic local state, no rollback;
        // the next debounce cycle retries with fresh data.
        warn!("debounced cart sync failed, keeping local state: {e}");
    }

    let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
    if matches!(*state, SyncState::InFlight) {
        *state = SyncState::Idle;
    }
}

/// One full-list push; on success the canonical response replaces local
/// state and becomes the synced baseline.
async fn push_once<B: CartBackend>(inner: &Arc<SchedulerInner<B>>) -> Result<(), StoreApiError> {
    let items = {
        let cart = inner.cart.lock().unwrap_or_else(PoisonError::into_inner);
        cart.items().to_vec()
    };

    let canonical = inner.backend.push_cart(items).await?;

    let snapshot = {
        let mut cart = inner.cart.lock().unwrap_or_else(PoisonError::into_inner);
        cart.replace_all(canonical);
        serialize_items(cart.items())
    };
    *inner
        .last_synced
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);

    debug!("cart synced");
    Ok(())
}

fn snapshot_of(cart: &Arc<Mutex<CartStore>>) -> String {
    let cart = cart.lock().unwrap_or_else(PoisonError::into_inner);
    serialize_items(cart.items())
}

fn serialize_items(items: &[CartLineItem]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}
