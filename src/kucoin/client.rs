// =============================================================================
// KuCoin REST API Client — symbol metadata, feed token, HF order entry
// =============================================================================
//
// Public endpoints (symbols, bullet-public) are unsigned. The order endpoint
// is signed per request; see `signing.rs`. Every method maps its failures to
// the `BotError` variant the caller acts on, and never puts credentials into
// an error message.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::Credentials;
use crate::error::BotError;
use crate::kucoin::signing::AuthHeaders;
use crate::types::{FeedConnection, OrderRequest, SymbolIncrements};

pub const SYMBOLS_PATH: &str = "/api/v1/symbols";
pub const BULLET_PUBLIC_PATH: &str = "/api/v1/bullet-public";
pub const HF_ORDERS_PATH: &str = "/api/v1/hf/orders";

/// KuCoin's success code in the JSON envelope.
pub const SUCCESS_CODE: &str = "200000";

/// Used when the bullet response omits `pingInterval` or sends 0.
const DEFAULT_PING_INTERVAL_MS: u64 = 18_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolEntry {
    price_increment: Option<Decimal>,
    base_increment: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulletData {
    token: String,
    #[serde(default)]
    instance_servers: Vec<InstanceServer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceServer {
    endpoint: String,
    ping_interval: Option<u64>,
}

/// Status and body of an order POST, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// KuCoin REST client bound to one host and one set of credentials.
#[derive(Clone)]
pub struct KucoinClient {
    base_url: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl KucoinClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, "KucoinClient initialised");

        Ok(Self {
            base_url,
            credentials,
            client,
        })
    }

    /// GET /api/v1/symbols and pick the entry whose `symbol` equals `pair`
    /// exactly (case-sensitive).
    #[instrument(skip(self), name = "kucoin::fetch_increments")]
    pub async fn fetch_increments(&self, pair: &str) -> Result<SymbolIncrements, BotError> {
        let not_found = |reason: String| BotError::MetadataNotFound {
            pair: pair.to_string(),
            reason,
        };

        let url = format!("{}{}", self.base_url, SYMBOLS_PATH);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| not_found(format!("GET {SYMBOLS_PATH} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(not_found(format!("GET {SYMBOLS_PATH} returned {status}")));
        }

        // Entries stay untyped until the match so one odd listing cannot fail
        // the whole lookup.
        let envelope: Envelope<Vec<serde_json::Value>> = resp
            .json()
            .await
            .map_err(|e| not_found(format!("unreadable symbols response: {e}")))?;

        if let Some(code) = envelope.code.as_deref().filter(|c| *c != SUCCESS_CODE) {
            return Err(not_found(format!(
                "symbols call returned code {code} ({})",
                envelope.msg.unwrap_or_default()
            )));
        }

        let entries = envelope.data.unwrap_or_default();
        debug!(count = entries.len(), "symbol list retrieved");

        let raw = entries
            .into_iter()
            .find(|s| s.get("symbol").and_then(|v| v.as_str()) == Some(pair))
            .ok_or_else(|| not_found("pair is not listed".to_string()))?;

        let entry: SymbolEntry = serde_json::from_value(raw)
            .map_err(|e| not_found(format!("unreadable listing: {e}")))?;

        let (Some(price_inc), Some(base_inc)) = (entry.price_increment, entry.base_increment)
        else {
            return Err(not_found("listing has no price/base increment".to_string()));
        };

        let increments = SymbolIncrements::new(price_inc, base_inc).ok_or_else(|| {
            not_found(format!(
                "non-positive increments (price={price_inc}, base={base_inc})"
            ))
        })?;

        debug!(
            pair,
            price_increment = %increments.price_increment,
            base_increment = %increments.base_increment,
            "increments resolved"
        );
        Ok(increments)
    }

    /// POST /api/v1/bullet-public for a public WebSocket endpoint and token.
    #[instrument(skip(self), name = "kucoin::fetch_feed_connection")]
    pub async fn fetch_feed_connection(&self) -> Result<FeedConnection, BotError> {
        let url = format!("{}{}", self.base_url, BULLET_PUBLIC_PATH);
        let resp = self.client.post(&url).send().await.map_err(|e| {
            BotError::FeedConnectFailed(format!("POST {BULLET_PUBLIC_PATH} failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BotError::FeedConnectFailed(format!(
                "POST {BULLET_PUBLIC_PATH} returned {status}"
            )));
        }

        let envelope: Envelope<BulletData> = resp.json().await.map_err(|e| {
            BotError::FeedConnectFailed(format!("unreadable bullet-public response: {e}"))
        })?;

        let data = envelope.data.ok_or_else(|| {
            BotError::FeedConnectFailed(format!(
                "bullet-public returned no data (code {})",
                envelope.code.unwrap_or_default()
            ))
        })?;

        let server = data.instance_servers.into_iter().next().ok_or_else(|| {
            BotError::FeedConnectFailed("bullet-public listed no instance servers".to_string())
        })?;

        let ping_ms = server.ping_interval.filter(|ms| *ms > 0).unwrap_or_else(|| {
            warn!("pingInterval missing or zero, using {DEFAULT_PING_INTERVAL_MS} ms");
            DEFAULT_PING_INTERVAL_MS
        });

        debug!(endpoint = %server.endpoint, ping_ms, "feed connection info retrieved");
        Ok(FeedConnection {
            endpoint: server.endpoint,
            token: data.token,
            ping_interval: Duration::from_millis(ping_ms),
        })
    }

    /// POST /api/v1/hf/orders (signed). Returns the raw answer; deciding
    /// whether it is an acceptance is left to the caller.
    #[instrument(skip(self, order), fields(symbol = %order.symbol), name = "kucoin::post_hf_order")]
    pub async fn post_hf_order(&self, order: &OrderRequest) -> Result<RawResponse, BotError> {
        let body = serde_json::to_string(order)
            .map_err(|e| BotError::InvalidOrder(format!("order does not serialise: {e}")))?;

        let timestamp = Utc::now().timestamp_millis().to_string();
        let auth = AuthHeaders::new(&self.credentials, &timestamp, "POST", HF_ORDERS_PATH, &body);
        let headers = auth.to_header_map().map_err(|_| {
            BotError::OrderTransportError(
                "credentials contain invalid header characters".to_string(),
            )
        })?;

        let url = format!("{}{}", self.base_url, HF_ORDERS_PATH);
        debug!(price = %order.price, size = %order.size, "sending HF order");

        let resp = self
            .client
            .post(&url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                BotError::OrderTransportError(format!("POST {HF_ORDERS_PATH} failed: {e}"))
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            BotError::OrderTransportError(format!("failed to read order response: {e}"))
        })?;

        Ok(RawResponse { status, body })
    }
}

impl std::fmt::Debug for KucoinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KucoinClient")
            .field("base_url", &self.base_url)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::kucoin::signing;
    use crate::types::{OrderSide, OrderType};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn symbols_body() -> serde_json::Value {
        json!({
            "code": "200000",
            "data": [
                { "symbol": "ETH-USDT", "priceIncrement": "0.01", "baseIncrement": "0.0001" },
                { "symbol": "BTC-USDT", "priceIncrement": "0.1", "baseIncrement": "0.00000001",
                  "enableTrading": true },
                { "symbol": "BAD-USDT", "priceIncrement": "0", "baseIncrement": "0.1" }
            ]
        })
    }

    async fn client_for(server: &MockServer) -> KucoinClient {
        KucoinClient::new(server.uri(), Credentials::default()).unwrap()
    }

    #[tokio::test]
    async fn fetch_increments_finds_exact_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(symbols_body()))
            .mount(&server)
            .await;

        let inc = client_for(&server).await.fetch_increments("BTC-USDT").await.unwrap();
        assert_eq!(inc.price_increment, dec!(0.1));
        assert_eq!(inc.base_increment, dec!(0.00000001));
    }

    #[tokio::test]
    async fn fetch_increments_is_case_sensitive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(symbols_body()))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_increments("btc-usdt").await.unwrap_err();
        assert!(matches!(err, BotError::MetadataNotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn fetch_increments_rejects_non_positive_steps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(symbols_body()))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_increments("BAD-USDT").await.unwrap_err();
        assert!(matches!(err, BotError::MetadataNotFound { .. }));
    }

    #[tokio::test]
    async fn fetch_increments_accepts_body_without_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "symbol": "BTC-USDT", "priceIncrement": "0.01", "baseIncrement": "0.00001" }
                ]
            })))
            .mount(&server)
            .await;

        let inc = client_for(&server).await.fetch_increments("BTC-USDT").await.unwrap();
        assert_eq!(inc.price_increment, dec!(0.01));
        assert_eq!(inc.base_increment, dec!(0.00001));
    }

    #[tokio::test]
    async fn fetch_increments_skips_malformed_unrelated_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "200000",
                "data": [
                    { "name": "X" },
                    { "symbol": "ETH-USDT", "priceIncrement": "n/a" },
                    { "symbol": "BTC-USDT", "priceIncrement": "0.01", "baseIncrement": "0.00001" }
                ]
            })))
            .mount(&server)
            .await;

        let inc = client_for(&server).await.fetch_increments("BTC-USDT").await.unwrap();
        assert_eq!(inc.price_increment, dec!(0.01));
    }

    #[tokio::test]
    async fn fetch_increments_fails_on_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "400100",
                "msg": "bad request"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_increments("BTC-USDT").await.unwrap_err();
        assert!(matches!(err, BotError::MetadataNotFound { .. }));
        assert!(err.to_string().contains("400100"), "{err}");
    }

    #[tokio::test]
    async fn fetch_increments_maps_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SYMBOLS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_increments("BTC-USDT").await.unwrap_err();
        assert!(matches!(err, BotError::MetadataNotFound { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fetch_feed_connection_reads_first_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BULLET_PUBLIC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "200000",
                "data": {
                    "token": "tok-1",
                    "instanceServers": [
                        { "endpoint": "wss://ws-api-spot.kucoin.com/", "encrypt": true,
                          "protocol": "websocket", "pingInterval": 18000, "pingTimeout": 10000 },
                        { "endpoint": "wss://other/", "pingInterval": 5000 }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let conn = client_for(&server).await.fetch_feed_connection().await.unwrap();
        assert_eq!(conn.endpoint, "wss://ws-api-spot.kucoin.com/");
        assert_eq!(conn.token, "tok-1");
        assert_eq!(conn.ping_interval, Duration::from_millis(18_000));
    }

    #[tokio::test]
    async fn zero_ping_interval_falls_back_to_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BULLET_PUBLIC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "200000",
                "data": {
                    "token": "tok-1",
                    "instanceServers": [ { "endpoint": "wss://x/", "pingInterval": 0 } ]
                }
            })))
            .mount(&server)
            .await;

        let conn = client_for(&server).await.fetch_feed_connection().await.unwrap();
        assert_eq!(conn.ping_interval, Duration::from_millis(DEFAULT_PING_INTERVAL_MS));
    }

    #[tokio::test]
    async fn fetch_feed_connection_without_servers_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BULLET_PUBLIC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "200000",
                "data": { "token": "tok-1", "instanceServers": [] }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_feed_connection().await.unwrap_err();
        assert!(matches!(err, BotError::FeedConnectFailed(_)));
    }

    #[tokio::test]
    async fn post_hf_order_sends_signed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HF_ORDERS_PATH))
            .and(header("KC-API-KEY", "demo_key"))
            .and(header("KC-API-KEY-VERSION", "2"))
            .and(header(
                "KC-API-PASSPHRASE",
                signing::sign_passphrase("demo_pass", "demo_secret").as_str(),
            ))
            .and(header_exists("KC-API-SIGN"))
            .and(header_exists("KC-API-TIMESTAMP"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "200000",
                "data": { "orderId": "6711", "clientOid": "cid-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = OrderRequest {
            client_oid: "cid-1".into(),
            symbol: "BTC-USDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            price: "50050.0".into(),
            size: "0.00039960".into(),
        };
        let raw = client_for(&server).await.post_hf_order(&order).await.unwrap();
        assert_eq!(raw.status, StatusCode::OK);
        assert!(raw.body.contains("6711"));

        let received = server.received_requests().await.unwrap();
        let req = &received[0];
        let sent: OrderRequest = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(sent, order);

        let ts = req.headers["KC-API-TIMESTAMP"].to_str().unwrap();
        let expected = signing::sign(
            ts,
            "POST",
            HF_ORDERS_PATH,
            std::str::from_utf8(&req.body).unwrap(),
            "demo_secret",
        );
        assert_eq!(req.headers["KC-API-SIGN"].to_str().unwrap(), expected);
    }

    #[tokio::test]
    async fn post_hf_order_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is not served by the mock.
        let client = KucoinClient::new("http://127.0.0.1:9", Credentials::default()).unwrap();
        let order = OrderRequest {
            client_oid: "cid".into(),
            symbol: "BTC-USDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            price: "1".into(),
            size: "1".into(),
        };
        let err = client.post_hf_order(&order).await.unwrap_err();
        assert!(matches!(err, BotError::OrderTransportError(_)));
    }
}
