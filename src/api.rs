//! SmartDine backend API client.
//!
//! The single HTTP abstraction every view goes through: base-URL
//! normalisation, bearer-token attachment via the injected
//! [`AuthService`], and uniform status-code classification. Staff endpoints
//! are authenticated; customer order tracking is not. Nothing else in the
//! crate builds raw requests, so 401/403 handling is never bypassed.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{AuthError, AuthService};
use crate::model::{Order, OrderStatus};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Classified failure of a backend call. Views decide how each variant is
/// surfaced; notably `Forbidden` on a transition means another staff member
/// got there first and is not rendered as an error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Network(String),
    #[error("not authorized (HTTP 401)")]
    Unauthorized,
    #[error("forbidden (HTTP 403)")]
    Forbidden,
    #[error("{message} (HTTP {status})")]
    Validation { status: u16, message: String },
    #[error("backend server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("invalid response from backend: {0}")]
    Decode(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach SmartDine backend at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid backend URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Pull the most useful message out of an error body. The backend emits
/// `{"error": ...}`, `{"message": ...}` or DRF-style `{"detail": ...}`
/// depending on the endpoint.
fn error_message_from_body(body_text: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body_text).ok()?;
    json.get("error")
        .or_else(|| json.get("message"))
        .or_else(|| json.get("detail"))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract the order list from a poll response. Accepts a bare array or a
/// `{ "orders": [...] }` / `{ "results": [...] }` / `{ "data": [...] }`
/// wrapper. Malformed rows are skipped with a warning instead of failing the
/// whole snapshot.
pub fn orders_from_response(resp: Value) -> Result<Vec<Order>, ApiError> {
    let rows = match resp {
        Value::Array(rows) => rows,
        Value::Object(ref obj) => obj
            .get("orders")
            .or_else(|| obj.get("results"))
            .or_else(|| obj.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| ApiError::Decode("order list missing from response".into()))?,
        other => {
            return Err(ApiError::Decode(format!(
                "expected an order list, got {other}"
            )))
        }
    };

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<Order>(row) {
            Ok(order) => orders.push(order),
            Err(e) => warn!("skipping malformed order row: {e}"),
        }
    }
    Ok(orders)
}

// ---------------------------------------------------------------------------
// Filtered order queries
// ---------------------------------------------------------------------------

/// Query parameters for `GET /orders/filter/`.
#[derive(Debug, Clone, Default)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
    pub today: bool,
    pub all: bool,
    pub sales: Option<String>,
}

impl OrdersQuery {
    /// The waiter board's filter: today's ready orders.
    pub fn ready_today() -> Self {
        Self {
            status: Some(OrderStatus::Ready),
            today: true,
            ..Self::default()
        }
    }

    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(status) = self.status {
            parts.push(format!("status={status}"));
        }
        if self.today {
            parts.push("today=true".to_string());
        }
        if self.all {
            parts.push("all=true".to_string());
        }
        if let Some(ref sales) = self.sales {
            parts.push(format!("sales={sales}"));
        }
        parts.join("&")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiClient {
    base: String,
    http: Client,
    auth: Arc<AuthService>,
    device_id: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: Arc<AuthService>) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            base: normalize_base_url(base_url),
            http,
            auth,
            device_id: None,
        })
    }

    /// Attach a stable per-terminal identifier header to every request.
    pub fn with_device_id(mut self, device_id: String) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    // -- plumbing ----------------------------------------------------------

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        authed: bool,
    ) -> Result<Value, ApiError> {
        let mut req = req.header("Content-Type", "application/json");
        if let Some(ref device_id) = self.device_id {
            req = req.header("x-terminal-device", device_id);
        }
        if authed {
            let token = self.auth.get_valid_access_token().await?;
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(friendly_error(&self.base, &e)))?;
        let status = resp.status();

        if status.is_success() {
            let body_text = resp
                .text()
                .await
                .map_err(|e| ApiError::Network(friendly_error(&self.base, &e)))?;
            if body_text.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body_text).map_err(|e| ApiError::Decode(e.to_string()));
        }

        let body_text = resp.text().await.unwrap_or_default();
        let message = error_message_from_body(&body_text)
            .unwrap_or_else(|| default_status_message(status).to_string());
        debug!(status = status.as_u16(), %message, "backend call failed");

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                if authed {
                    // The backend no longer accepts our session; drop it once
                    // here instead of in every view.
                    self.auth.clear_session();
                }
                ApiError::Unauthorized
            }
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            s if s.is_server_error() => ApiError::Server {
                status: s.as_u16(),
                message,
            },
            s => ApiError::Validation {
                status: s.as_u16(),
                message,
            },
        })
    }

    async fn get_authed(&self, path: &str) -> Result<Value, ApiError> {
        self.send(self.http.get(format!("{}{path}", self.base)), true)
            .await
    }

    async fn get_public(&self, path: &str) -> Result<Value, ApiError> {
        self.send(self.http.get(format!("{}{path}", self.base)), false)
            .await
    }

    async fn patch_authed(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.send(
            self.http.patch(format!("{}{path}", self.base)).json(&body),
            true,
        )
        .await
    }

    // -- endpoints ---------------------------------------------------------

    /// `GET /kitchen/orders/` - the kitchen board's active orders.
    pub async fn list_kitchen_orders(&self) -> Result<Vec<Order>, ApiError> {
        orders_from_response(self.get_authed("/kitchen/orders/").await?)
    }

    /// `GET /orders/filter/?...` - status/role-filtered order lists.
    pub async fn list_orders(&self, query: &OrdersQuery) -> Result<Vec<Order>, ApiError> {
        let qs = query.to_query_string();
        let path = if qs.is_empty() {
            "/orders/filter/".to_string()
        } else {
            format!("/orders/filter/?{qs}")
        };
        orders_from_response(self.get_authed(&path).await?)
    }

    /// `GET /orders/filter/?status=ready&today=true` - the waiter board.
    pub async fn list_waiter_ready_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.list_orders(&OrdersQuery::ready_today()).await
    }

    /// `PATCH /kitchen/orders/{id}/update-status/` - kitchen transition.
    pub async fn update_kitchen_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<(), ApiError> {
        self.patch_authed(
            &format!("/kitchen/orders/{order_id}/update-status/"),
            serde_json::json!({ "status": status.as_str() }),
        )
        .await?;
        Ok(())
    }

    /// `PATCH /waiter/orders/{id}/mark-served/` - waiter transition.
    pub async fn mark_served(&self, order_id: &str) -> Result<(), ApiError> {
        self.patch_authed(
            &format!("/waiter/orders/{order_id}/mark-served/"),
            serde_json::json!({ "status": OrderStatus::Served.as_str() }),
        )
        .await?;
        Ok(())
    }

    /// `GET /order/{id}/` - customer-facing tracking, no auth.
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ApiError> {
        let resp = self.get_public(&format!("/order/{order_id}/")).await?;
        // Tolerate both a bare order object and an { "order": ... } wrapper.
        let raw = match resp {
            Value::Object(ref obj) if obj.contains_key("order") => obj["order"].clone(),
            other => other,
        };
        serde_json::from_value(raw).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn default_status_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => "Session is invalid or expired",
        403 => "Not allowed for this account",
        404 => "Backend endpoint not found",
        s if s >= 500 => "Backend server error",
        _ => "Unexpected response from backend",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_segments() {
        assert_eq!(
            normalize_base_url("api.smartdine.app/"),
            "https://api.smartdine.app"
        );
        assert_eq!(
            normalize_base_url("localhost:8000/api/"),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_base_url("https://smartdine.app/api"),
            "https://smartdine.app"
        );
        assert_eq!(
            normalize_base_url("  https://smartdine.app///  "),
            "https://smartdine.app"
        );
    }

    #[test]
    fn query_string_includes_only_set_filters() {
        assert_eq!(OrdersQuery::default().to_query_string(), "");
        assert_eq!(
            OrdersQuery::ready_today().to_query_string(),
            "status=ready&today=true"
        );
        let q = OrdersQuery {
            all: true,
            sales: Some("daily".into()),
            ..OrdersQuery::default()
        };
        assert_eq!(q.to_query_string(), "all=true&sales=daily");
    }

    #[test]
    fn order_list_is_found_in_bare_and_wrapped_responses() {
        let order = serde_json::json!({
            "id": "1",
            "table_number": 2,
            "status": "pending",
            "created_at": "2026-08-30T10:00:00Z"
        });

        let bare = orders_from_response(Value::Array(vec![order.clone()])).expect("bare array");
        assert_eq!(bare.len(), 1);

        let wrapped = orders_from_response(serde_json::json!({ "orders": [order] }))
            .expect("wrapped array");
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].table_number, 2);
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let resp = serde_json::json!([
            { "id": "ok", "table_number": 1, "status": "ready", "created_at": "2026-08-30T10:00:00Z" },
            { "id": "broken", "status": "nonsense" }
        ]);
        let orders = orders_from_response(resp).expect("snapshot should survive bad rows");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "ok");
    }

    #[test]
    fn error_message_prefers_backend_detail() {
        assert_eq!(
            error_message_from_body("{\"detail\":\"order already claimed\"}").as_deref(),
            Some("order already claimed")
        );
        assert_eq!(
            error_message_from_body("{\"error\":\"bad status\"}").as_deref(),
            Some("bad status")
        );
        assert_eq!(error_message_from_body("not json"), None);
    }
}
