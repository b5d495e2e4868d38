//! Application state shared by every command.

use std::sync::Arc;

use crate::backend::{Backend, RestBackend, Session};
use crate::cart_store::CartStore;
use crate::checkout::CheckoutService;
use crate::config::ClientConfig;
use crate::session::SessionStore;
use crate::storage::{FileStorage, KeyValueStorage};
use crate::vendor_orders::VendorOrders;

/// Application state.
///
/// Cheaply cloneable via `Arc`. Owns the cart store, the session store and
/// the backend client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cart: CartStore,
    sessions: SessionStore,
    backend: Arc<dyn Backend>,
}

impl AppState {
    /// Create state backed by files in the data directory and the REST
    /// backend.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(&config.data_dir));
        let backend = Arc::new(RestBackend::new(
            &config.backend,
            config.menu_cache_ttl,
            config.poll_interval,
        ));
        Self::with_parts(storage, backend)
    }

    /// Create state from explicit storage and backend.
    #[must_use]
    pub fn with_parts(storage: Arc<dyn KeyValueStorage>, backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cart: CartStore::new(storage.clone()),
                sessions: SessionStore::new(storage),
                backend,
            }),
        }
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    /// The signed-in session, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.sessions.current()
    }

    /// Checkout service over this state's cart and backend.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.inner.cart, self.backend())
    }

    /// Incoming order handling for the vendor signed in as `session`.
    #[must_use]
    pub fn vendor_orders<'a>(&'a self, session: &'a Session) -> VendorOrders<'a> {
        VendorOrders::new(self.backend(), session)
    }
}
