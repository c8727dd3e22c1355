//! Stand-in for the third-party demo store.
//!
//! Serves a fixed product catalog, form-based login with bearer sessions,
//! and a cart whose writes land after a settle delay, like the real store's
//! asynchronous backend. A few extra routes inject faults for retry and
//! timing tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "shopper@example.com";
pub const DEMO_PASSWORD: &str = "secret123";
pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub price_cents: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: u32,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_cents: u64,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct AddToCartForm {
    pub product_id: u32,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct FlakyQuery {
    #[serde(default)]
    pub fail: u32,
}

#[derive(Deserialize)]
pub struct SlowQuery {
    #[serde(default)]
    pub ms: u64,
}

/// Runtime knobs for the mock store.
#[derive(Clone, Debug)]
pub struct Settings {
    /// How long a cart write takes to become visible.
    pub cart_settle: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cart_settle: Duration::from_millis(50),
        }
    }
}

#[derive(Default)]
struct Store {
    products: Vec<Product>,
    users: HashMap<String, String>,
    sessions: HashMap<String, String>,
    carts: HashMap<String, Vec<CartItem>>,
    flaky_hits: HashMap<String, u32>,
}

impl Store {
    fn seeded() -> Self {
        let products = [
            (1, "Samsung galaxy s6", "phones", 36_000),
            (2, "Nokia lumia 1520", "phones", 82_000),
            (3, "Sony vaio i5", "laptops", 79_000),
            (4, "MacBook air", "laptops", 70_000),
            (5, "Apple monitor 24", "monitors", 40_000),
        ]
        .into_iter()
        .map(|(id, name, category, price_cents)| Product {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price_cents,
        })
        .collect();

        Self {
            products,
            users: HashMap::from([(DEMO_EMAIL.to_string(), DEMO_PASSWORD.to_string())]),
            ..Self::default()
        }
    }

    fn session_owner(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.sessions.get(token).cloned()
    }
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    settings: Settings,
}

pub fn app() -> Router {
    app_with(Settings::default())
}

pub fn app_with(settings: Settings) -> Router {
    let state = AppState {
        store: Arc::new(RwLock::new(Store::seeded())),
        settings,
    };
    Router::new()
        .route("/health", get(health))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/products/{id}/page", get(product_page))
        .route("/search", get(search))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/cart", get(view_cart).delete(clear_cart))
        .route("/cart/add", post(add_to_cart))
        .route("/flaky/{key}", get(flaky))
        .route("/slow", get(slow))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Settings::default()).await
}

pub async fn run_with(listener: TcpListener, settings: Settings) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, settle_ms = settings.cart_settle.as_millis() as u64, "mock store listening");
    }
    axum::serve(listener, app_with(settings)).await
}

async fn health() -> &'static str {
    "ok"
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Json<Vec<Product>> {
    let store = state.store.read().await;
    let products = store
        .products
        .iter()
        .filter(|p| query.category.as_deref().is_none_or(|c| p.category == c))
        .cloned()
        .collect();
    Json(products)
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Product>, StatusCode> {
    let store = state.store.read().await;
    store
        .products
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn product_page(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    let store = state.store.read().await;
    match store.products.iter().find(|p| p.id == id) {
        Some(product) => Html(format!(
            "<html><head><title>{name}</title></head><body><h2 class=\"name\">{name}</h2>\
             <h3 class=\"price-container\">${dollars}</h3></body></html>",
            name = product.name,
            dollars = product.price_cents / 100,
        ))
        .into_response(),
        None => (StatusCode::NOT_FOUND, Html("<html><body>Not found</body></html>")).into_response(),
    }
}

/// An empty query answers 200 with an HTML error page, as the real store does.
async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    let needle = query.q.trim().to_lowercase();
    if needle.is_empty() {
        return Html("<html><body><div class=\"error\">Please enter a search term</div></body></html>")
            .into_response();
    }
    let store = state.store.read().await;
    let hits: Vec<Product> = store
        .products
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    Json(hits).into_response()
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let mut store = state.store.write().await;
    if store.users.get(&form.email) != Some(&form.password) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Wrong password." })),
        )
            .into_response();
    }
    let token = Uuid::new_v4().to_string();
    store.sessions.insert(token.clone(), form.email);
    debug!("session opened");
    (
        [(SESSION_HEADER, token.clone())],
        Json(json!({ "token": token })),
    )
        .into_response()
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let mut store = state.store.write().await;
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    match token.and_then(|t| store.sessions.remove(&t)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::UNAUTHORIZED,
    }
}

async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let (owner, product) = {
        let store = state.store.read().await;
        let Some(owner) = store.session_owner(&headers) else {
            return StatusCode::UNAUTHORIZED.into_response();
        };
        let Some(product) = store.products.iter().find(|p| p.id == form.product_id).cloned() else {
            return StatusCode::NOT_FOUND.into_response();
        };
        (owner, product)
    };
    if form.quantity == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "quantity must be positive" })),
        )
            .into_response();
    }

    let store = state.store.clone();
    let settle = state.settings.cart_settle;
    let quantity = form.quantity;
    tokio::spawn(async move {
        tokio::time::sleep(settle).await;
        let mut store = store.write().await;
        let cart = store.carts.entry(owner).or_default();
        match cart.iter_mut().find(|item| item.product_id == product.id) {
            Some(item) => item.quantity += quantity,
            None => cart.push(CartItem {
                product_id: product.id,
                name: product.name,
                quantity,
                unit_price_cents: product.price_cents,
            }),
        }
    });

    (StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))).into_response()
}

async fn view_cart(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Cart>, StatusCode> {
    let store = state.store.read().await;
    let owner = store.session_owner(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let items = store.carts.get(&owner).cloned().unwrap_or_default();
    let total_cents = items
        .iter()
        .map(|item| item.unit_price_cents * u64::from(item.quantity))
        .sum();
    Ok(Json(Cart { items, total_cents }))
}

async fn clear_cart(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let mut store = state.store.write().await;
    match store.session_owner(&headers) {
        Some(owner) => {
            store.carts.remove(&owner);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::UNAUTHORIZED,
    }
}

/// Fails with 503 for the first `fail` hits on `key`, then succeeds.
async fn flaky(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<FlakyQuery>,
) -> Response {
    let mut store = state.store.write().await;
    let hits = store.flaky_hits.entry(key.clone()).or_insert(0);
    *hits += 1;
    if *hits <= query.fail {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "0")],
            "try again",
        )
            .into_response();
    }
    Json(json!({ "key": key, "attempts": *hits })).into_response()
}

async fn slow(Query(query): Query<SlowQuery>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(query.ms)).await;
    "done"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_serializes_to_json() {
        let product = Product {
            id: 1,
            name: "Test".to_string(),
            category: "phones".to_string(),
            price_cents: 100,
        };
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Test");
        assert_eq!(json["price_cents"], 100);
    }

    #[test]
    fn seeded_store_has_demo_user_and_catalog() {
        let store = Store::seeded();
        assert_eq!(store.users.get(DEMO_EMAIL).map(String::as_str), Some(DEMO_PASSWORD));
        assert_eq!(store.products.len(), 5);
        assert!(store.sessions.is_empty());
    }

    #[test]
    fn add_to_cart_form_defaults_quantity_to_one() {
        let form: AddToCartForm = serde_json::from_str(r#"{"product_id":3}"#).unwrap();
        assert_eq!(form.product_id, 3);
        assert_eq!(form.quantity, 1);
    }

    #[test]
    fn session_owner_requires_bearer_prefix() {
        let mut store = Store::seeded();
        store.sessions.insert("tok".to_string(), DEMO_EMAIL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "tok".parse().unwrap());
        assert_eq!(store.session_owner(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer tok".parse().unwrap());
        assert_eq!(store.session_owner(&headers).as_deref(), Some(DEMO_EMAIL));
    }

    #[test]
    fn empty_cart_serializes_with_zero_total() {
        let json = serde_json::to_value(Cart::default()).unwrap();
        assert_eq!(json, json!({ "items": [], "total_cents": 0 }));
    }
}
