//! Wiring of the storefront components.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::cart::{CartService, CartTransport, GuestCartStore, Reconciler};
use crate::catalog::CatalogClient;
use crate::config::StorefrontConfig;
use crate::session::{SessionController, TokenStore};
use crate::storage::KeyValueStore;

/// Every storefront component, sharing one HTTP client and one store.
///
/// This struct is cheaply cloneable via `Arc`. The shared HTTP client
/// matters: its cookie jar is the identity of the anonymous session cart.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    catalog: CatalogClient,
    session: SessionController,
    cart: CartService,
    guest: GuestCartStore,
}

impl Storefront {
    /// Build the storefront over a key-value store.
    ///
    /// The session starts anonymous; call `session().init()` to restore a
    /// persisted one.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: StorefrontConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;
        let catalog = CatalogClient::new(api.clone(), config.catalog_cache_ttl);
        let guest = GuestCartStore::new(Arc::clone(&store), api.base_url().clone());
        let transport = CartTransport::new(api.clone());
        let session = SessionController::new(
            api.clone(),
            TokenStore::new(store),
            Reconciler::new(transport.clone(), guest.clone()),
        );
        let cart = CartService::new(session.clone(), transport, guest.clone(), catalog.clone());

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                catalog,
                session,
                cart,
                guest,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The shared REST client, for callers that add their own endpoints.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    #[must_use]
    pub fn session(&self) -> &SessionController {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Direct access to the persisted guest cart.
    #[must_use]
    pub fn guest_cart(&self) -> &GuestCartStore {
        &self.inner.guest
    }
}
