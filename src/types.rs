// =============================================================================
// Shared types used across the buy pipeline
// =============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price and size step sizes for one trading pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolIncrements {
    pub price_increment: Decimal,
    pub base_increment: Decimal,
}

impl SymbolIncrements {
    /// Returns `None` unless both increments are strictly positive.
    pub fn new(price_increment: Decimal, base_increment: Decimal) -> Option<Self> {
        if price_increment > Decimal::ZERO && base_increment > Decimal::ZERO {
            Some(Self {
                price_increment,
                base_increment,
            })
        } else {
            None
        }
    }
}

/// The first ticker price seen on the feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub price: Decimal,
    pub received_at: DateTime<Utc>,
}

impl PriceObservation {
    pub fn now(price: Decimal) -> Self {
        Self {
            price,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
}

/// JSON body of `POST /api/v1/hf/orders`.
///
/// `price` and `size` are already increment-aligned strings; nothing
/// downstream re-rounds them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub client_oid: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: String,
    pub size: String,
}

/// Where and how to open the public market-data WebSocket.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedConnection {
    pub endpoint: String,
    pub token: String,
    /// Client ping cadence the server expects while the socket is idle.
    pub ping_interval: Duration,
}

impl FeedConnection {
    /// Full connect URL: `{endpoint}?token={token}`.
    pub fn url(&self) -> String {
        format!("{}?token={}", self.endpoint, self.token)
    }
}

impl std::fmt::Debug for FeedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConnection")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("ping_interval", &self.ping_interval)
            .finish()
    }
}

/// Whether an order is only built for inspection or actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradingMode {
    #[default]
    Preview,
    Live,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preview => write!(f, "Preview"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Successful result of one submission attempt.
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    /// Built but not sent.
    Previewed(OrderRequest),
    /// Exchange answered HTTP 200 with code "200000".
    Accepted {
        order: OrderRequest,
        order_id: Option<String>,
        elapsed: Duration,
    },
}

impl OrderOutcome {
    pub fn order(&self) -> &OrderRequest {
        match self {
            Self::Previewed(order) => order,
            Self::Accepted { order, .. } => order,
        }
    }
}

impl std::fmt::Display for OrderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Previewed(o) => write!(f, "Previewed({} {} @ {})", o.symbol, o.size, o.price),
            Self::Accepted {
                order,
                order_id,
                elapsed,
            } => write!(
                f,
                "Accepted({} {} @ {}, order_id={}, {} ms)",
                order.symbol,
                order.size,
                order.price,
                order_id.as_deref().unwrap_or("?"),
                elapsed.as_millis()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn increments_require_positive_steps() {
        assert!(SymbolIncrements::new(dec!(0.01), dec!(0.00001)).is_some());
        assert!(SymbolIncrements::new(Decimal::ZERO, dec!(0.00001)).is_none());
        assert!(SymbolIncrements::new(dec!(0.01), dec!(-1)).is_none());
    }

    #[test]
    fn order_request_serialises_exchange_field_names() {
        let order = OrderRequest {
            client_oid: "abc".into(),
            symbol: "BTC-USDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            price: "50050.00".into(),
            size: "0.00040".into(),
        };
        let v = serde_json::to_value(&order).unwrap();
        assert_eq!(v["clientOid"], "abc");
        assert_eq!(v["symbol"], "BTC-USDT");
        assert_eq!(v["side"], "buy");
        assert_eq!(v["type"], "limit");
        assert_eq!(v["price"], "50050.00");
        assert_eq!(v["size"], "0.00040");
    }

    #[test]
    fn accepted_outcome_reports_order_id_and_latency() {
        let order = OrderRequest {
            client_oid: "abc".into(),
            symbol: "BTC-USDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            price: "50050.00".into(),
            size: "0.00040".into(),
        };
        let outcome = OrderOutcome::Accepted {
            order,
            order_id: Some("6711".into()),
            elapsed: Duration::from_millis(42),
        };
        assert_eq!(
            outcome.to_string(),
            "Accepted(BTC-USDT 0.00040 @ 50050.00, order_id=6711, 42 ms)"
        );
    }

    #[test]
    fn feed_url_appends_token() {
        let conn = FeedConnection {
            endpoint: "wss://ws-api-spot.kucoin.com/".into(),
            token: "tok123".into(),
            ping_interval: Duration::from_millis(18_000),
        };
        assert_eq!(conn.url(), "wss://ws-api-spot.kucoin.com/?token=tok123");
        assert!(!format!("{conn:?}").contains("tok123"));
    }

    #[test]
    fn trading_mode_defaults_to_preview() {
        assert_eq!(TradingMode::default(), TradingMode::Preview);
        assert_eq!(TradingMode::Live.to_string(), "Live");
    }
}
