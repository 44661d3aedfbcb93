//! End-to-end test support for the Miracle storefront client.
//!
//! [`FakeBackend`] is an in-process axum server that speaks the backend's
//! REST dialect: bearer-token carts addressed by row id, cookie-session
//! carts addressed by product id, JWT-style access/refresh tokens, and the
//! admin CRUD endpoints. Tests drive a real [`Storefront`] against it and
//! inspect the recorded requests and server-side state.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p miracle-integration-tests
//! ```
//!
//! # Seed data
//!
//! - Users `alice` / `alice-pass` and `admin` / `admin-pass`
//! - Products 1 (Moringa Powder, Powders), 2 (Moringa Tea, Teas) and
//!   3 (Moringa Capsules, Powders, out of stock)
//! - One recipe, two About videos, one site image

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Multipart, Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use miracle_storefront::Storefront;
use miracle_storefront::config::StorefrontConfig;
use miracle_storefront::storage::{KeyValueStore, MemoryStore};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password accepted for the seeded `alice` account.
pub const ALICE_PASSWORD: &str = "alice-pass";
/// Password accepted for the seeded `admin` account.
pub const ADMIN_PASSWORD: &str = "admin-pass";
/// The only code `/verify-otp/` accepts.
pub const VALID_OTP: &str = "123456";

/// One request as the backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Whether an `Authorization` header was sent.
    pub bearer: bool,
}

impl RecordedRequest {
    #[must_use]
    pub fn is(&self, method: &str, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

// =============================================================================
// Backend state
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    password: String,
    name: String,
    email: String,
}

#[derive(Debug, Clone, Copy)]
struct Row {
    id: i64,
    product: i64,
    quantity: u64,
}

#[derive(Debug, Default)]
struct Backend {
    accounts: HashMap<String, Account>,
    access: HashMap<String, String>,
    refresh: HashMap<String, String>,
    user_carts: HashMap<String, Vec<Row>>,
    session_carts: HashMap<String, Vec<(i64, u64)>>,
    products: Vec<Value>,
    categories: Vec<Value>,
    coupons: Vec<Value>,
    recipes: Vec<Value>,
    next_id: i64,
    failing_products: HashSet<i64>,
    failing_cart_writes: bool,
    reject_refresh: bool,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<Backend>>;

fn lock(state: &Shared) -> MutexGuard<'_, Backend> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Backend {
    fn seeded() -> Self {
        let mut backend = Self {
            next_id: 100,
            ..Self::default()
        };

        backend.accounts.insert(
            "alice".to_string(),
            Account {
                password: ALICE_PASSWORD.to_string(),
                name: "Alice Doe".to_string(),
                email: "alice@example.com".to_string(),
            },
        );
        backend.accounts.insert(
            "admin".to_string(),
            Account {
                password: ADMIN_PASSWORD.to_string(),
                name: "Shop Admin".to_string(),
                email: "admin@example.com".to_string(),
            },
        );

        backend.categories = vec![
            json!({"id": 1, "name": "Powders", "description": "Ground leaf"}),
            json!({"id": 2, "name": "Teas", "description": null}),
        ];
        let powders = backend.categories.first().cloned();
        let teas = backend.categories.get(1).cloned();
        backend.products = vec![
            product_json(
                1,
                "Moringa Powder",
                "Pure leaf powder",
                "12.50",
                10,
                Some("/media/products/powder.png"),
                true,
                powders.clone(),
            ),
            product_json(2, "Moringa Tea", "Loose leaf tea", "8.00", 25, None, true, teas),
            product_json(
                3,
                "Moringa Capsules",
                "",
                "20.00",
                0,
                Some("https://cdn.example.com/capsules.png"),
                true,
                powders,
            ),
        ];
        backend.recipes = vec![json!({
            "id": 1,
            "title": "Moringa Smoothie",
            "image": "/media/recipes/smoothie.jpg",
            "ingredients": ["1 tsp moringa powder", "1 banana"],
            "instructions": ["Blend", "Serve cold"],
            "benefits": "Iron and vitamin C",
        })];
        backend
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product(&self, id: i64) -> Option<&Value> {
        self.products.iter().find(|p| p["id"] == id)
    }

    fn issue_tokens(&mut self, username: &str) -> (String, String) {
        let access = Uuid::new_v4().to_string();
        let refresh = Uuid::new_v4().to_string();
        self.access.insert(access.clone(), username.to_string());
        self.refresh.insert(refresh.clone(), username.to_string());
        (access, refresh)
    }

    fn user_json(&self, username: &str) -> Value {
        self.accounts.get(username).map_or(Value::Null, |account| {
            json!({"name": account.name, "email": account.email, "username": username})
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn product_json(
    id: i64,
    name: &str,
    description: &str,
    price: &str,
    stock: i64,
    image: Option<&str>,
    is_active: bool,
    category: Option<Value>,
) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": description,
        "price": price,
        "stock": stock,
        "image": image,
        "is_active": is_active,
        "created_at": "2025-01-15T10:00:00Z",
        "category": category,
    })
}

// =============================================================================
// FakeBackend
// =============================================================================

/// A running fake backend bound to an ephemeral local port.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
}

impl FakeBackend {
    /// Start the server on `127.0.0.1:0`.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(Backend::seeded()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Listener has an address");

        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, state }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A storefront over a fresh in-memory store.
    #[must_use]
    pub fn storefront(&self) -> (Storefront, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let storefront = self.storefront_with_store(Arc::clone(&store) as Arc<dyn KeyValueStore>);
        (storefront, store)
    }

    /// A storefront over the given store.
    #[must_use]
    pub fn storefront_with_store(&self, store: Arc<dyn KeyValueStore>) -> Storefront {
        let base_url = self.base_url();
        let config = StorefrontConfig::from_lookup(|key| {
            (key == "MIRACLE_API_BASE_URL").then(|| base_url.clone())
        })
        .expect("Valid test configuration");
        Storefront::new(config, store).expect("Storefront builds")
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn clear_requests(&self) {
        lock(&self.state).requests.clear();
    }

    /// Make every `POST /cart/` for this product fail with a 500.
    pub fn fail_adds_for(&self, product: i64) {
        lock(&self.state).failing_products.insert(product);
    }

    /// Make every `PUT` and `DELETE` on `/cart/{id}/` fail with a 503.
    pub fn fail_cart_writes(&self) {
        lock(&self.state).failing_cart_writes = true;
    }

    /// Make `/token/refresh/` reject every refresh token.
    pub fn reject_refresh(&self) {
        lock(&self.state).reject_refresh = true;
    }

    /// Invalidate every issued access token, as if they had all expired.
    pub fn expire_access_tokens(&self) {
        lock(&self.state).access.clear();
    }

    /// Issue a token pair for a seeded user without going through `/login/`.
    #[must_use]
    pub fn issue_tokens(&self, username: &str) -> (String, String) {
        lock(&self.state).issue_tokens(username)
    }

    /// Replace a user's server cart with `(product, quantity)` rows.
    pub fn seed_user_cart(&self, username: &str, items: &[(i64, u64)]) {
        let mut backend = lock(&self.state);
        let rows = items
            .iter()
            .map(|&(product, quantity)| Row {
                id: backend.next_id(),
                product,
                quantity,
            })
            .collect();
        backend.user_carts.insert(username.to_string(), rows);
    }

    /// A user's server cart as `(product, quantity)` rows, in row order.
    #[must_use]
    pub fn user_cart(&self, username: &str) -> Vec<(i64, u64)> {
        lock(&self.state)
            .user_carts
            .get(username)
            .map(|rows| rows.iter().map(|r| (r.product, r.quantity)).collect())
            .unwrap_or_default()
    }

    /// Row ids of a user's server cart.
    #[must_use]
    pub fn user_cart_rows(&self, username: &str) -> Vec<i64> {
        lock(&self.state)
            .user_carts
            .get(username)
            .map(|rows| rows.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn product(&self, id: i64) -> Option<Value> {
        lock(&self.state).product(id).cloned()
    }

    #[must_use]
    pub fn recipe(&self, id: i64) -> Option<Value> {
        lock(&self.state)
            .recipes
            .iter()
            .find(|r| r["id"] == id)
            .cloned()
    }

    #[must_use]
    pub fn coupons(&self) -> Vec<Value> {
        lock(&self.state).coupons.clone()
    }
}

// =============================================================================
// Routing
// =============================================================================

fn router(state: Shared) -> Router {
    Router::new()
        .route("/products/", get(list_products).post(create_product))
        .route(
            "/products/{id}/",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products-by-category/{name}/", get(products_by_category))
        .route("/categories/", get(list_categories).post(create_category))
        .route(
            "/categories/{id}/",
            put(update_category).delete(delete_category),
        )
        .route("/coupons/", get(list_coupons).post(create_coupon))
        .route("/coupons/{id}/", put(update_coupon).delete(delete_coupon))
        .route("/recipes/", get(list_recipes).post(create_recipe))
        .route("/recipes/{id}/", put(update_recipe).delete(delete_recipe))
        .route("/about-videos/", get(about_videos))
        .route("/get-all-images/", get(site_images))
        .route("/login/", post(login))
        .route("/register/", post(register))
        .route("/token/refresh/", post(refresh))
        .route("/logout/", post(logout))
        .route("/send-otp/", post(send_otp))
        .route("/verify-otp/", post(verify_otp))
        .route("/user/", get(current_user))
        .route("/user-count/", get(user_count))
        .route("/users/", get(list_users))
        .route("/cart/", get(get_cart).post(add_to_cart))
        .route(
            "/cart/{id}/",
            put(update_cart).patch(update_cart).delete(remove_from_cart),
        )
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
        .with_state(state)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let entry = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        bearer: request.headers().contains_key(header::AUTHORIZATION),
    };
    lock(&state).requests.push(entry);
    next.run(request).await
}

type Reply = Result<Response, Response>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn ok(body: Value) -> Reply {
    Ok(Json(body).into_response())
}

// =============================================================================
// Caller identity
// =============================================================================

enum Caller {
    User(String),
    Session(Option<String>),
}

fn caller(backend: &Backend, headers: &HeaderMap) -> Result<Caller, Response> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Caller::Session(session_id(headers)));
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| backend.access.get(token))
        .map(|user| Caller::User(user.clone()))
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Token is invalid or expired"))
}

fn require_user(backend: &Backend, headers: &HeaderMap) -> Result<String, Response> {
    match caller(backend, headers)? {
        Caller::User(user) => Ok(user),
        Caller::Session(_) => Err(error(StatusCode::UNAUTHORIZED, "Authentication required")),
    }
}

fn require_admin(backend: &Backend, headers: &HeaderMap) -> Result<(), Response> {
    if require_user(backend, headers)? == "admin" {
        Ok(())
    } else {
        Err(error(StatusCode::FORBIDDEN, "Admin only"))
    }
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("sessionid=").map(str::to_string))
}

fn with_session_cookie(issued: Option<&str>, body: Value) -> Response {
    match issued {
        Some(id) => (
            [(header::SET_COOKIE, format!("sessionid={id}; Path=/"))],
            Json(body),
        )
            .into_response(),
        None => Json(body).into_response(),
    }
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(State(state): State<Shared>) -> Reply {
    ok(Value::Array(lock(&state).products.clone()))
}

async fn get_product(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    lock(&state)
        .product(id)
        .cloned()
        .map(|p| Json(p).into_response())
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Product not found"))
}

async fn products_by_category(State(state): State<Shared>, Path(name): Path<String>) -> Reply {
    let products = lock(&state)
        .products
        .iter()
        .filter(|p| p["category"]["name"] == name.as_str())
        .cloned()
        .collect();
    ok(Value::Array(products))
}

async fn list_categories(State(state): State<Shared>) -> Reply {
    ok(Value::Array(lock(&state).categories.clone()))
}

async fn list_recipes(State(state): State<Shared>) -> Reply {
    ok(Value::Array(lock(&state).recipes.clone()))
}

async fn about_videos() -> Reply {
    ok(json!([
        {"id": 1, "title": "Our farm", "description": "Where it grows", "video": null, "youtube_id": "dQw4w9WgXcQ"},
        {"id": 2, "title": "Harvest", "description": null, "video": "/media/videos/harvest.mp4", "youtube_id": null},
        {"title": "broken entry without id"},
    ]))
}

async fn site_images() -> Reply {
    ok(json!({"results": [
        {"id": 1, "image": "/media/site/hero.jpg", "uploaded_at": "2025-02-01T08:00:00Z"},
    ]}))
}

// =============================================================================
// Auth
// =============================================================================

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut backend = lock(&state);
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let matched = backend
        .accounts
        .iter()
        .find(|(name, account)| (*name == username || account.email == username) && account.password == password)
        .map(|(name, _)| name.clone());
    let Some(username) = matched else {
        return Err(error(StatusCode::BAD_REQUEST, "Invalid credentials"));
    };

    let (access, refresh) = backend.issue_tokens(&username);
    ok(json!({"access": access, "refresh": refresh}))
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut backend = lock(&state);
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    if email.is_empty() || password.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Email and password are required"));
    }
    if backend.accounts.values().any(|a| a.email == email) {
        return Err(error(StatusCode::BAD_REQUEST, "Email already registered"));
    }

    backend.accounts.insert(
        email.clone(),
        Account {
            password,
            name,
            email: email.clone(),
        },
    );
    let (access, refresh) = backend.issue_tokens(&email);
    ok(json!({"message": "User registered", "access": access, "refresh": refresh}))
}

async fn refresh(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut backend = lock(&state);
    let token = body["refresh"].as_str().unwrap_or_default();

    let user = match backend.refresh.get(token) {
        Some(user) if !backend.reject_refresh => user.clone(),
        _ => return Err(error(StatusCode::UNAUTHORIZED, "Token is invalid or expired")),
    };

    let access = Uuid::new_v4().to_string();
    backend.access.insert(access.clone(), user);
    ok(json!({"access": access}))
}

async fn logout(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut backend = lock(&state);
    if let Some(token) = body["refresh"].as_str() {
        backend.refresh.remove(token);
    }
    ok(json!({"message": "Logged out"}))
}

async fn send_otp(Json(body): Json<Value>) -> Reply {
    if body["email"].as_str().is_none_or(|e| !e.contains('@')) {
        return Err(error(StatusCode::BAD_REQUEST, "Invalid email"));
    }
    ok(json!({"message": "OTP sent to your email"}))
}

async fn verify_otp(Json(body): Json<Value>) -> Reply {
    if body["otp"] == VALID_OTP {
        ok(json!({"message": "Email verified"}))
    } else {
        Err(error(StatusCode::BAD_REQUEST, "Invalid or expired OTP"))
    }
}

async fn current_user(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let backend = lock(&state);
    let user = require_user(&backend, &headers)?;
    ok(backend.user_json(&user))
}

async fn user_count(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let backend = lock(&state);
    require_admin(&backend, &headers)?;
    let total = backend.accounts.len();
    ok(json!({"total_users": total, "active_users": total}))
}

async fn list_users(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let backend = lock(&state);
    require_admin(&backend, &headers)?;
    let mut names: Vec<&String> = backend.accounts.keys().collect();
    names.sort();
    ok(Value::Array(
        names.into_iter().map(|name| backend.user_json(name)).collect(),
    ))
}

// =============================================================================
// Cart
// =============================================================================

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let backend = lock(&state);
    match caller(&backend, &headers)? {
        Caller::User(user) => {
            let rows = backend.user_carts.get(&user).cloned().unwrap_or_default();
            let body = rows
                .iter()
                .map(|row| {
                    json!({
                        "id": row.id,
                        "product": row.product,
                        "product_details": backend.product(row.product),
                        "quantity": row.quantity,
                    })
                })
                .collect();
            ok(Value::Array(body))
        }
        Caller::Session(session) => {
            let issued = session.is_none().then(|| Uuid::new_v4().to_string());
            let items = session
                .and_then(|id| backend.session_carts.get(&id).cloned())
                .unwrap_or_default();
            let body = items
                .iter()
                .map(|&(product_id, quantity)| {
                    let product = backend.product(product_id).cloned().unwrap_or(Value::Null);
                    json!({
                        "id": product_id.to_string(),
                        "product_id": product_id,
                        "product_name": product["name"],
                        "price": product["price"],
                        "image": product["image"],
                        "description": product["description"],
                        "quantity": quantity,
                    })
                })
                .collect();
            Ok(with_session_cookie(issued.as_deref(), Value::Array(body)))
        }
    }
}

async fn add_to_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut backend = lock(&state);
    let product = body["product"].as_i64().unwrap_or_default();
    let quantity = body["quantity"].as_u64().unwrap_or(1);

    if backend.failing_products.contains(&product) {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"));
    }
    if backend.product(product).is_none() {
        return Err(error(StatusCode::NOT_FOUND, "Product not found"));
    }

    match caller(&backend, &headers)? {
        Caller::User(user) => {
            let existing = backend
                .user_carts
                .get_mut(&user)
                .and_then(|rows| rows.iter_mut().find(|r| r.product == product));
            if let Some(row) = existing {
                row.quantity += quantity;
            } else {
                let id = backend.next_id();
                backend.user_carts.entry(user).or_default().push(Row {
                    id,
                    product,
                    quantity,
                });
            }
            Ok((StatusCode::CREATED, Json(json!({"message": "Added to cart"}))).into_response())
        }
        Caller::Session(session) => {
            let issued = session.is_none().then(|| Uuid::new_v4().to_string());
            let key = session.or_else(|| issued.clone()).unwrap_or_default();
            let items = backend.session_carts.entry(key).or_default();
            match items.iter_mut().find(|(p, _)| *p == product) {
                Some((_, q)) => *q += quantity,
                None => items.push((product, quantity)),
            }
            Ok(with_session_cookie(
                issued.as_deref(),
                json!({"message": "Added to cart"}),
            ))
        }
    }
}

async fn update_cart(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut backend = lock(&state);
    if backend.failing_cart_writes {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "Cart unavailable"));
    }
    let quantity = body["quantity"].as_u64().unwrap_or_default();
    let not_found = || error(StatusCode::NOT_FOUND, "Cart item not found");

    match caller(&backend, &headers)? {
        Caller::User(user) => {
            let row = backend
                .user_carts
                .get_mut(&user)
                .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
                .ok_or_else(not_found)?;
            row.quantity = quantity;
        }
        Caller::Session(session) => {
            let items = match session {
                Some(s) => backend.session_carts.get_mut(&s),
                None => None,
            };
            let item = items
                .and_then(|items| items.iter_mut().find(|(p, _)| *p == id))
                .ok_or_else(not_found)?;
            item.1 = quantity;
        }
    }
    ok(json!({"message": "Cart updated"}))
}

async fn remove_from_cart(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Reply {
    let mut backend = lock(&state);
    if backend.failing_cart_writes {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "Cart unavailable"));
    }

    let removed = match caller(&backend, &headers)? {
        Caller::User(user) => backend.user_carts.get_mut(&user).is_some_and(|rows| {
            let before = rows.len();
            rows.retain(|r| r.id != id);
            rows.len() < before
        }),
        Caller::Session(Some(session)) => {
            backend.session_carts.get_mut(&session).is_some_and(|items| {
                let before = items.len();
                items.retain(|(p, _)| *p != id);
                items.len() < before
            })
        }
        Caller::Session(None) => false,
    };

    if removed {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(error(StatusCode::NOT_FOUND, "Cart item not found"))
    }
}

// =============================================================================
// Admin CRUD
// =============================================================================

async fn read_form(mut multipart: Multipart) -> Result<HashMap<String, String>, Response> {
    let bad = |e: axum::extract::multipart::MultipartError| {
        error(StatusCode::BAD_REQUEST, &e.to_string())
    };
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await.map_err(bad)?;
                if bytes.is_empty() {
                    return Err(error(StatusCode::BAD_REQUEST, "Empty upload"));
                }
                format!("/media/uploads/{file_name}")
            }
            None => field.text().await.map_err(bad)?,
        };
        fields.insert(name, value);
    }
    Ok(fields)
}

fn product_from_form(
    backend: &Backend,
    id: i64,
    form: &HashMap<String, String>,
    existing: Option<&Value>,
) -> Result<Value, Response> {
    let field = |key: &str| form.get(key).map(String::as_str);
    let name = field("name").ok_or_else(|| error(StatusCode::BAD_REQUEST, "name is required"))?;
    let price = field("price").ok_or_else(|| error(StatusCode::BAD_REQUEST, "price is required"))?;
    let stock = field("stock")
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "stock must be a number"))?;
    let category = field("category_id")
        .and_then(|c| c.parse::<i64>().ok())
        .and_then(|c| backend.categories.iter().find(|cat| cat["id"] == c).cloned());
    let image = field("image")
        .map(str::to_string)
        .or_else(|| existing.and_then(|p| p["image"].as_str().map(str::to_string)));

    Ok(product_json(
        id,
        name,
        field("description").unwrap_or_default(),
        price,
        stock,
        image.as_deref(),
        field("is_active") != Some("false"),
        category,
    ))
}

async fn create_product(State(state): State<Shared>, headers: HeaderMap, multipart: Multipart) -> Reply {
    require_admin(&lock(&state), &headers)?;
    let form = read_form(multipart).await?;

    let mut backend = lock(&state);
    let id = backend.next_id();
    let product = product_from_form(&backend, id, &form, None)?;
    backend.products.push(product.clone());
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

async fn update_product(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    require_admin(&lock(&state), &headers)?;
    let form = read_form(multipart).await?;

    let mut backend = lock(&state);
    let index = backend
        .products
        .iter()
        .position(|p| p["id"] == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Product not found"))?;
    let product = product_from_form(&backend, id, &form, backend.products.get(index))?;
    if let Some(slot) = backend.products.get_mut(index) {
        *slot = product.clone();
    }
    ok(product)
}

async fn delete_product(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    delete_by_id(&mut backend.products, id)
}

async fn create_category(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    body["id"] = json!(backend.next_id());
    backend.categories.push(body.clone());
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn update_category(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    replace_by_id(&mut backend.categories, id, body)
}

async fn delete_category(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    delete_by_id(&mut backend.categories, id)
}

async fn list_coupons(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let backend = lock(&state);
    require_admin(&backend, &headers)?;
    ok(Value::Array(backend.coupons.clone()))
}

async fn create_coupon(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    if backend.coupons.iter().any(|c| c["code"] == body["code"]) {
        return Err(error(StatusCode::BAD_REQUEST, "Coupon code already exists"));
    }
    body["id"] = json!(backend.next_id());
    backend.coupons.push(body.clone());
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn update_coupon(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    replace_by_id(&mut backend.coupons, id, body)
}

async fn delete_coupon(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    delete_by_id(&mut backend.coupons, id)
}

fn recipe_from_form(id: i64, form: &HashMap<String, String>, existing: Option<&Value>) -> Result<Value, Response> {
    let list = |key: &str| -> Result<Vec<String>, Response> {
        form.get(key).map_or_else(
            || Ok(Vec::new()),
            |raw| {
                serde_json::from_str(raw).map_err(|_| {
                    error(StatusCode::BAD_REQUEST, &format!("{key} must be a JSON list"))
                })
            },
        )
    };
    let title = form
        .get("title")
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "title is required"))?;
    let image = form
        .get("image")
        .cloned()
        .or_else(|| existing.and_then(|r| r["image"].as_str().map(str::to_string)));

    Ok(json!({
        "id": id,
        "title": title,
        "image": image,
        "ingredients": list("ingredients")?,
        "instructions": list("instructions")?,
        "benefits": form.get("benefits").cloned().unwrap_or_default(),
    }))
}

async fn create_recipe(State(state): State<Shared>, headers: HeaderMap, multipart: Multipart) -> Reply {
    require_admin(&lock(&state), &headers)?;
    let form = read_form(multipart).await?;

    let mut backend = lock(&state);
    let id = backend.next_id();
    let recipe = recipe_from_form(id, &form, None)?;
    backend.recipes.push(recipe.clone());
    Ok((StatusCode::CREATED, Json(recipe)).into_response())
}

async fn update_recipe(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    require_admin(&lock(&state), &headers)?;
    let form = read_form(multipart).await?;

    let mut backend = lock(&state);
    let existing = backend.recipes.iter().find(|r| r["id"] == id).cloned();
    let Some(existing) = existing else {
        return Err(error(StatusCode::NOT_FOUND, "Recipe not found"));
    };
    let recipe = recipe_from_form(id, &form, Some(&existing))?;
    replace_by_id(&mut backend.recipes, id, recipe)
}

async fn delete_recipe(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Reply {
    let mut backend = lock(&state);
    require_admin(&backend, &headers)?;
    delete_by_id(&mut backend.recipes, id)
}

fn replace_by_id(items: &mut [Value], id: i64, mut body: Value) -> Reply {
    let slot = items
        .iter_mut()
        .find(|item| item["id"] == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not found"))?;
    body["id"] = json!(id);
    *slot = body.clone();
    ok(body)
}

fn delete_by_id(items: &mut Vec<Value>, id: i64) -> Reply {
    let before = items.len();
    items.retain(|item| item["id"] != id);
    if items.len() < before {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(error(StatusCode::NOT_FOUND, "Not found"))
    }
}
