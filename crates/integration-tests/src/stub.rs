//! In-process stub of the cart/wishlist persistence service.
//!
//! Implements the wire contract the sync engine consumes: owner-scoped
//! carts and wishlists keyed by bearer credential or guest token, token
//! minting for first contact, and the camelCase JSON envelopes. Knobs allow
//! failure injection and switching the token refresh channel between the
//! response header and the body field.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::{Value, json};
use uuid::Uuid;

/// Header carrying the guest token in both directions.
const GUEST_TOKEN_HEADER: &str = "x-guest-token";

/// One request as the stub saw it, for identity-scoping assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub guest_token: Option<String>,
    pub bearer: Option<String>,
}

/// Shared state of the stub service.
#[derive(Default)]
pub struct StubState {
    carts: Mutex<HashMap<String, Vec<Value>>>,
    wishlists: Mutex<HashMap<String, Vec<Value>>>,
    cart_posts: AtomicUsize,
    last_cart_post: Mutex<Option<Value>>,
    requests: Mutex<Vec<RecordedRequest>>,
    /// All reads return 500 when set.
    pub fail_reads: AtomicBool,
    /// Cart writes return 422 when set.
    pub fail_cart_writes: AtomicBool,
    /// Deliver minted tokens via the `guestToken` body field instead of the
    /// response header.
    pub mint_in_body_only: AtomicBool,
}

impl StubState {
    /// Number of `POST /cart` requests received.
    pub fn cart_posts(&self) -> usize {
        self.cart_posts.load(Ordering::SeqCst)
    }

    /// Body of the most recent `POST /cart`.
    pub fn last_cart_post(&self) -> Option<Value> {
        self.last_cart_post
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The stored cart for an owner key (`user:<credential>` or a guest
    /// token).
    pub fn server_cart(&self, owner: &str) -> Vec<Value> {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// The stored wishlist for an owner key.
    pub fn server_wishlist(&self, owner: &str) -> Vec<Value> {
        self.wishlists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Pre-populate an owner's cart with wire-shaped items.
    pub fn seed_cart(&self, owner: &str, items: Vec<Value>) {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner.to_string(), items);
    }

    /// Pre-populate an owner's wishlist with wire-shaped entries.
    pub fn seed_wishlist(&self, owner: &str, entries: Vec<Value>) {
        self.wishlists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner.to_string(), entries);
    }
}

/// How one request resolved to an owner, plus the token to echo back.
struct Scope {
    owner: String,
    token: Option<String>,
}

/// Build the stub router over the given state.
pub fn stub_router(state: Arc<StubState>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(post_cart).delete(delete_cart))
        .route(
            "/wishlist",
            get(get_wishlist).post(post_wishlist).delete(clear_wishlist),
        )
        .route("/wishlist/{product_id}", delete(remove_wishlist_item))
        .with_state(state)
}

fn resolve_scope(state: &StubState, method: &str, path: &str, headers: &HeaderMap) -> Scope {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(ToString::to_string);
    let guest_token = headers
        .get(GUEST_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            guest_token: guest_token.clone(),
            bearer: bearer.clone(),
        });

    if let Some(credential) = bearer {
        return Scope {
            owner: format!("user:{credential}"),
            token: None,
        };
    }
    if let Some(token) = guest_token {
        return Scope {
            owner: token.clone(),
            token: Some(token),
        };
    }
    // First contact: mint a token, like the real service would.
    let minted = format!("guest-{}", Uuid::new_v4());
    Scope {
        owner: minted.clone(),
        token: Some(minted),
    }
}

/// Wrap items in the response envelope, delivering any token refresh via the
/// configured channel.
fn envelope(state: &StubState, scope: &Scope, items: Vec<Value>) -> Response {
    let mut body = json!({ "items": items });
    let mut headers = HeaderMap::new();

    if let Some(token) = &scope.token {
        if state.mint_in_body_only.load(Ordering::SeqCst) {
            body["guestToken"] = json!(token);
        } else if let Ok(value) = HeaderValue::from_str(token) {
            headers.insert(GUEST_TOKEN_HEADER, value);
        }
    }

    (headers, Json(body)).into_response()
}

/// A 500 that still refreshes the guest token, on both channels - the engine
/// must capture tokens from error responses too.
fn failure(scope: &Scope, message: &str) -> Response {
    let mut body = json!({ "message": message });
    let mut headers = HeaderMap::new();
    if let Some(token) = &scope.token {
        body["guestToken"] = json!(token);
        if let Ok(value) = HeaderValue::from_str(token) {
            headers.insert(GUEST_TOKEN_HEADER, value);
        }
    }
    (StatusCode::INTERNAL_SERVER_ERROR, headers, Json(body)).into_response()
}

// =============================================================================
// Cart Routes
// =============================================================================

async fn get_cart(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    let scope = resolve_scope(&state, "GET", "/cart", &headers);
    if state.fail_reads.load(Ordering::SeqCst) {
        return failure(&scope, "cart read unavailable");
    }
    let items = state.server_cart(&scope.owner);
    envelope(&state, &scope, items)
}

async fn post_cart(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let scope = resolve_scope(&state, "POST", "/cart", &headers);
    state.cart_posts.fetch_add(1, Ordering::SeqCst);
    *state
        .last_cart_post
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(body.clone());

    if state.fail_cart_writes.load(Ordering::SeqCst) {
        let mut response = json!({ "message": "invalid lines" });
        if let Some(token) = &scope.token {
            response["guestToken"] = json!(token);
        }
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(response)).into_response();
    }

    let items: Vec<Value> = body["items"]
        .as_array()
        .map(|items| items.iter().map(wire_item_from_posted).collect())
        .unwrap_or_default();
    state.seed_cart(&scope.owner, items.clone());
    envelope(&state, &scope, items)
}

async fn delete_cart(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    let scope = resolve_scope(&state, "DELETE", "/cart", &headers);
    state.seed_cart(&scope.owner, Vec::new());
    envelope(&state, &scope, Vec::new())
}

/// Store a posted flat line the way the service persists it: a populated
/// product object plus line-level fields.
fn wire_item_from_posted(item: &Value) -> Value {
    let product = strip_nulls(json!({
        "id": item["productId"],
        "name": item["name"],
        "price": item["price"]["amount"],
        "currencyCode": item["price"]["currencyCode"],
        "image": item["image"],
    }));
    strip_nulls(json!({
        "product": product,
        "quantity": item["quantity"],
        "price": item["price"]["amount"],
        "currencyCode": item["price"]["currencyCode"],
        "name": item["name"],
        "image": item["image"],
        "size": item["selection"]["size"],
        "color": item["selection"]["color"],
        "dimensions": item["selection"]["dimensions"],
    }))
}

// =============================================================================
// Wishlist Routes
// =============================================================================

async fn get_wishlist(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    let scope = resolve_scope(&state, "GET", "/wishlist", &headers);
    if state.fail_reads.load(Ordering::SeqCst) {
        return failure(&scope, "wishlist read unavailable");
    }
    let entries = state.server_wishlist(&scope.owner);
    envelope(&state, &scope, entries)
}

async fn post_wishlist(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let scope = resolve_scope(&state, "POST", "/wishlist", &headers);

    let entry = strip_nulls(json!({
        "product": body["productId"],
        "variantId": body["snapshot"]["variantId"],
        "snapshot": body["snapshot"],
    }));

    let mut wishlists = state
        .wishlists
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let entries = wishlists.entry(scope.owner.clone()).or_default();
    entries.push(entry);
    let entries = entries.clone();
    drop(wishlists);

    envelope(&state, &scope, entries)
}

async fn remove_wishlist_item(
    State(state): State<Arc<StubState>>,
    Path(product_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let scope = resolve_scope(
        &state,
        "DELETE",
        &format!("/wishlist/{product_id}"),
        &headers,
    );
    let variant_id = params.get("variantId").map(String::as_str);

    let mut wishlists = state
        .wishlists
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let entries = wishlists.entry(scope.owner.clone()).or_default();
    entries.retain(|entry| {
        let entry_product = entry["product"].as_str().unwrap_or_default();
        if entry_product != product_id {
            return true;
        }
        match variant_id {
            Some(variant_id) => entry["variantId"].as_str() != Some(variant_id),
            None => false,
        }
    });
    let entries = entries.clone();
    drop(wishlists);

    envelope(&state, &scope, entries)
}

async fn clear_wishlist(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    let scope = resolve_scope(&state, "DELETE", "/wishlist", &headers);
    state.seed_wishlist(&scope.owner, Vec::new());
    envelope(&state, &scope, Vec::new())
}

/// Drop null-valued keys so optional fields read as absent, not `null`.
fn strip_nulls(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.retain(|_, v| !v.is_null());
    }
    value
}
