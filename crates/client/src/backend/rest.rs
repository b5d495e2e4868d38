//! REST implementation of [`Backend`] for a PostgREST record API.
//!
//! Records live under `{base}/rest/v1/{collection}` and are filtered with
//! PostgREST query syntax (`?id=eq.7`). Sign-in goes to
//! `{base}/auth/v1/token?grant_type=password`. Vendors and menus are cached
//! using `moka` (configurable TTL).

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_eats_core::{Email, MenuItemId, OrderId, OrderStatus, UserId, VendorId};
use chrono::{TimeDelta, Utc};
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;

use super::cache::{CacheKey, CacheValue};
use super::types::{
    IncomingOrder, MenuItem, NewOrder, NewOrderItem, OrderRecord, OrderStatusUpdate,
    OrderSummary, Session, SessionUser, Vendor,
};
use super::{Backend, BackendError, OrderStatusStream};
use crate::config::BackendConfig;

/// Columns selected for the order history, with vendor and item names joined.
const ORDER_SUMMARY_SELECT: &str = "id,total_amount,status,created_at,\
vendor:vendors(name,image_url),\
order_items(quantity,price_at_time,menu_item:menu_items(name))";

/// Columns of a vendor's order listing, with the customer profile joined.
const INCOMING_ORDER_SELECT: &str = "id,total_amount,status,created_at,\
customer:profiles!user_id(full_name,email),\
order_items(quantity,price_at_time,menu_item:menu_items(name))";

/// Buffered status updates per subscription.
const STATUS_CHANNEL_CAPACITY: usize = 16;

/// Error body shapes returned by the record API and the identity service.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<&str> {
        self.code.as_ref().and_then(serde_json::Value::as_str)
    }

    fn message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Successful password grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    user: SessionUser,
}

#[derive(serde::Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(serde::Serialize)]
struct StatusPatch {
    status: OrderStatus,
}

/// Client for the hosted backend's REST and identity endpoints.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    cache: Cache<CacheKey, CacheValue>,
    poll_interval: Duration,
}

impl RestBackend {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig, menu_cache_ttl: Duration, poll_interval: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(menu_cache_ttl)
            .build();

        Self {
            inner: Arc::new(RestBackendInner {
                client: reqwest::Client::new(),
                base: config.url.clone(),
                anon_key: config.anon_key.clone(),
                cache,
                poll_interval,
            }),
        }
    }

    /// `{base}/rest/v1/{collection}?{filters}`.
    fn collection_url(&self, collection: &str, query: &[(&str, String)]) -> Result<Url, BackendError> {
        let mut url = self.inner.base.join("rest/v1/")?.join(collection)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Attach the API key and bearer token. Without a session the anonymous
    /// key doubles as the bearer token.
    fn request(&self, method: Method, url: Url, session: Option<&Session>) -> RequestBuilder {
        let anon_key = self.inner.anon_key.expose_secret();
        let bearer = session.map_or(anon_key, |s| s.access_token.expose_secret());
        self.inner
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .bearer_auth(bearer)
    }

    /// Send a request and return the body text of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let error: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let code = error.code().map(str::to_string);
        let message = error
            .message()
            .unwrap_or_else(|| format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()));

        warn!(
            status = %status,
            code = code.as_deref().unwrap_or(""),
            message = %message,
            "Backend returned non-success status"
        );

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            _ => BackendError::Api {
                status: status.as_u16(),
                code,
                message,
            },
        })
    }

    /// Send a request and decode the JSON body.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to decode backend response"
            );
            BackendError::Decode(e)
        })
    }

    /// Fetch rows expected to contain exactly one record.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: impl FnOnce() -> String,
    ) -> Result<T, BackendError> {
        let rows: Vec<T> = self.fetch(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(what()))
    }

    /// Poll an order until it is terminal or the subscriber goes away,
    /// forwarding only status changes.
    async fn poll_status(
        self,
        session: Session,
        order_id: OrderId,
        mut last: OrderStatus,
        tx: mpsc::Sender<OrderStatusUpdate>,
    ) {
        let mut ticker = tokio::time::interval(self.inner.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        while !last.is_terminal() {
            tokio::select! {
                _ = ticker.tick() => {}
                () = tx.closed() => break,
            }

            match self.order(&session, order_id).await {
                Ok(order) if order.status != last => {
                    last = order.status;
                    let update = OrderStatusUpdate {
                        order_id,
                        status: order.status,
                        observed_at: Utc::now(),
                    };
                    if tx.send(update).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(%order_id, error = %e, "Order status poll failed"),
            }
        }

        debug!(%order_id, status = %last, "Order status subscription ended");
    }
}

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl Backend for RestBackend {
    #[instrument(skip(self))]
    async fn list_vendors(&self) -> Result<Vec<Vendor>, BackendError> {
        if let Some(CacheValue::Vendors(vendors)) = self.inner.cache.get(&CacheKey::Vendors).await {
            debug!("Cache hit for vendors");
            return Ok(vendors);
        }

        let url = self.collection_url(
            "vendors",
            &[("select", "*".to_string()), ("order", "name.asc".to_string())],
        )?;
        let vendors: Vec<Vendor> = self.fetch(self.request(Method::GET, url, None)).await?;

        self.inner
            .cache
            .insert(CacheKey::Vendors, CacheValue::Vendors(vendors.clone()))
            .await;
        Ok(vendors)
    }

    #[instrument(skip(self))]
    async fn vendor(&self, id: VendorId) -> Result<Vendor, BackendError> {
        let key = CacheKey::Vendor(id);
        if let Some(CacheValue::Vendor(vendor)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for vendor");
            return Ok(*vendor);
        }

        let url = self.collection_url("vendors", &[("select", "*".to_string()), ("id", eq(id))])?;
        let vendor: Vendor = self
            .fetch_one(self.request(Method::GET, url, None), || {
                format!("Vendor not found: {id}")
            })
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::Vendor(Box::new(vendor.clone())))
            .await;
        Ok(vendor)
    }

    #[instrument(skip(self))]
    async fn list_menu(&self, vendor_id: VendorId) -> Result<Vec<MenuItem>, BackendError> {
        let key = CacheKey::Menu(vendor_id);
        if let Some(CacheValue::Menu(items)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for menu");
            return Ok(items);
        }

        let url = self.collection_url(
            "menu_items",
            &[
                ("select", "*".to_string()),
                ("vendor_id", eq(vendor_id)),
                ("order", "id.asc".to_string()),
            ],
        )?;
        let items: Vec<MenuItem> = self.fetch(self.request(Method::GET, url, None)).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Menu(items.clone()))
            .await;
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn menu_item(&self, id: MenuItemId) -> Result<MenuItem, BackendError> {
        let key = CacheKey::MenuItem(id);
        if let Some(CacheValue::MenuItem(item)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for menu item");
            return Ok(*item);
        }

        let url =
            self.collection_url("menu_items", &[("select", "*".to_string()), ("id", eq(id))])?;
        let item: MenuItem = self
            .fetch_one(self.request(Method::GET, url, None), || {
                format!("Menu item not found: {id}")
            })
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::MenuItem(Box::new(item.clone())))
            .await;
        Ok(item)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let mut url = self.inner.base.join("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let grant = PasswordGrant {
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let result: Result<TokenResponse, BackendError> = self
            .fetch(self.request(Method::POST, url, None).json(&grant))
            .await;

        let token = match result {
            Ok(token) => token,
            // Wrong credentials come back as 400 invalid_grant
            Err(BackendError::Api {
                status: 400,
                message,
                ..
            }) => return Err(BackendError::Unauthorized(message)),
            Err(e) => return Err(e),
        };

        let lifetime = TimeDelta::try_seconds(token.expires_in).unwrap_or_default();
        debug!(user_id = %token.user.id, "Signed in");
        Ok(Session {
            access_token: SecretString::from(token.access_token),
            refresh_token: token.refresh_token.map(SecretString::from),
            expires_at: Utc::now() + lifetime,
            user: token.user,
        })
    }

    #[instrument(skip(self, session, order), fields(vendor_id = %order.vendor_id, total = %order.total_amount))]
    async fn create_order(
        &self,
        session: &Session,
        order: &NewOrder,
    ) -> Result<OrderRecord, BackendError> {
        let url = self.collection_url("orders", &[("select", "*".to_string())])?;
        let request = self
            .request(Method::POST, url, Some(session))
            .header("Prefer", "return=representation")
            .json(order);
        self.fetch_one(request, || "Created order was not returned".to_string())
            .await
    }

    #[instrument(skip(self, session, items), fields(count = items.len()))]
    async fn insert_order_items(
        &self,
        session: &Session,
        items: &[NewOrderItem],
    ) -> Result<(), BackendError> {
        let url = self.collection_url("order_items", &[])?;
        let request = self
            .request(Method::POST, url, Some(session))
            .header("Prefer", "return=minimal")
            .json(items);
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self, session))]
    async fn update_order_status(
        &self,
        session: &Session,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord, BackendError> {
        let url = self.collection_url("orders", &[("select", "*".to_string()), ("id", eq(order_id))])?;
        let request = self
            .request(Method::PATCH, url, Some(session))
            .header("Prefer", "return=representation")
            .json(&StatusPatch { status });
        self.fetch_one(request, || format!("Order not found: {order_id}"))
            .await
    }

    #[instrument(skip(self, session))]
    async fn order(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<OrderRecord, BackendError> {
        let url = self.collection_url("orders", &[("select", "*".to_string()), ("id", eq(order_id))])?;
        self.fetch_one(self.request(Method::GET, url, Some(session)), || {
            format!("Order not found: {order_id}")
        })
        .await
    }

    #[instrument(skip(self, session))]
    async fn list_orders(
        &self,
        session: &Session,
        user_id: UserId,
    ) -> Result<Vec<OrderSummary>, BackendError> {
        let url = self.collection_url(
            "orders",
            &[
                ("select", ORDER_SUMMARY_SELECT.to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )?;
        self.fetch(self.request(Method::GET, url, Some(session)))
            .await
    }

    #[instrument(skip(self, session))]
    async fn list_vendor_orders(
        &self,
        session: &Session,
        vendor_id: VendorId,
    ) -> Result<Vec<IncomingOrder>, BackendError> {
        let url = self.collection_url(
            "orders",
            &[
                ("select", INCOMING_ORDER_SELECT.to_string()),
                ("vendor_id", eq(vendor_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )?;
        self.fetch(self.request(Method::GET, url, Some(session)))
            .await
    }

    #[instrument(skip(self, session))]
    async fn subscribe_order_status(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<OrderStatusStream, BackendError> {
        let current = self.order(session, order_id).await?;
        let (tx, rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);

        // The current status is always the first update.
        let initial = OrderStatusUpdate {
            order_id,
            status: current.status,
            observed_at: Utc::now(),
        };
        if tx.send(initial).await.is_err() {
            return Ok(rx);
        }

        tokio::spawn(
            self.clone()
                .poll_status(session.clone(), order_id, current.status, tx),
        );
        Ok(rx)
    }
}
