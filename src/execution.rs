// =============================================================================
// Order Submitter — prices, sizes, and (optionally) sends one HF limit buy
// =============================================================================
//
// Preview mode builds the order and stops; nothing reaches KuCoin. Live mode
// sends exactly one signed POST and classifies the answer. A rejected or
// failed order is reported, never resubmitted.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BotError;
use crate::kucoin::client::{RawResponse, SUCCESS_CODE};
use crate::kucoin::KucoinClient;
use crate::rounding::{format_to_increment, round_down};
use crate::types::{OrderOutcome, OrderRequest, OrderSide, OrderType, SymbolIncrements, TradingMode};

/// Builds and submits the single buy order of a run.
pub struct OrderSubmitter {
    pub client: Arc<KucoinClient>,
    pub pair: String,
    /// Multiplier applied to the observed price before rounding.
    pub price_offset: Decimal,
}

impl OrderSubmitter {
    pub fn new(client: Arc<KucoinClient>, pair: impl Into<String>, price_offset: Decimal) -> Self {
        Self {
            client,
            pair: pair.into(),
            price_offset,
        }
    }

    /// Compute the increment-aligned limit order for `price` and a quote
    /// budget.
    ///
    /// * limit price = `round_down(price * price_offset, priceIncrement)`
    /// * size        = `round_down(budget_quote / price, baseIncrement)`
    pub fn build_order(
        &self,
        price: Decimal,
        budget_quote: Decimal,
        increments: &SymbolIncrements,
    ) -> Result<OrderRequest, BotError> {
        if price <= Decimal::ZERO {
            return Err(BotError::InvalidOrder(format!("non-positive price {price}")));
        }

        let raw_price = price
            .checked_mul(self.price_offset)
            .ok_or_else(|| BotError::InvalidOrder("limit price overflows".to_string()))?;
        let raw_size = budget_quote
            .checked_div(price)
            .ok_or_else(|| BotError::InvalidOrder("size overflows".to_string()))?;

        let limit_price = round_down(raw_price, increments.price_increment);
        let size = round_down(raw_size, increments.base_increment);

        if limit_price <= Decimal::ZERO {
            return Err(BotError::InvalidOrder(format!(
                "limit price {raw_price} is below one price increment ({})",
                increments.price_increment
            )));
        }
        if size <= Decimal::ZERO {
            return Err(BotError::InvalidOrder(format!(
                "budget {budget_quote} buys less than one base increment ({}) at {price}",
                increments.base_increment
            )));
        }

        debug!(%price, %raw_price, %limit_price, %raw_size, %size, "order priced");

        Ok(OrderRequest {
            client_oid: Uuid::new_v4().to_string(),
            symbol: self.pair.clone(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            price: format_to_increment(limit_price, increments.price_increment),
            size: format_to_increment(size, increments.base_increment),
        })
    }

    /// Build the order and, in [`TradingMode::Live`], send it once.
    pub async fn submit(
        &self,
        price: Decimal,
        budget_quote: Decimal,
        increments: &SymbolIncrements,
        mode: TradingMode,
    ) -> Result<OrderOutcome, BotError> {
        let order = self.build_order(price, budget_quote, increments)?;

        match mode {
            TradingMode::Preview => {
                info!(
                    symbol = %order.symbol,
                    side = "buy",
                    order_type = "limit",
                    price = %order.price,
                    size = %order.size,
                    client_oid = %order.client_oid,
                    "DRY RUN: order preview (not sent)"
                );
                Ok(OrderOutcome::Previewed(order))
            }
            TradingMode::Live => {
                let start = Instant::now();
                let raw = self.client.post_hf_order(&order).await?;
                let elapsed = start.elapsed();
                classify_response(order, raw, elapsed)
            }
        }
    }
}

/// Accepted only on HTTP 200 with body `code == "200000"`.
pub fn classify_response(
    order: OrderRequest,
    raw: RawResponse,
    elapsed: std::time::Duration,
) -> Result<OrderOutcome, BotError> {
    let parsed: Option<Value> = serde_json::from_str(&raw.body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(Value::as_str);

    if raw.status.as_u16() == 200 && code == Some(SUCCESS_CODE) {
        let order_id = parsed
            .as_ref()
            .and_then(|v| v["data"]["orderId"].as_str())
            .map(str::to_string);
        info!(
            symbol = %order.symbol,
            price = %order.price,
            size = %order.size,
            order_id = order_id.as_deref().unwrap_or("?"),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "order accepted"
        );
        return Ok(OrderOutcome::Accepted {
            order,
            order_id,
            elapsed,
        });
    }

    warn!(
        status = raw.status.as_u16(),
        body = %raw.body,
        client_oid = %order.client_oid,
        "order rejected"
    );
    Err(BotError::OrderRejected {
        status: raw.status.as_u16(),
        body: raw.body,
    })
}
