// =============================================================================
// Orchestrator — one run, start to finish
// =============================================================================
//
//   increments -> feed token -> spawn feed -> first price -> submit -> join feed
//
// Each step is a precondition of the next, so the order can never be sent
// before increments and a price exist. The price reaches this task over the
// feed's oneshot channel, which is also what orders the write before the read.
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BotConfig;
use crate::error::BotError;
use crate::execution::OrderSubmitter;
use crate::kucoin::KucoinClient;
use crate::market_data::spawn_first_price;
use crate::types::OrderOutcome;

/// Run the whole pipeline once.
pub async fn run(config: &BotConfig, client: Arc<KucoinClient>) -> Result<OrderOutcome, BotError> {
    let increments = client.fetch_increments(&config.pair).await?;
    info!(
        pair = %config.pair,
        price_increment = %increments.price_increment,
        base_increment = %increments.base_increment,
        "symbol increments loaded"
    );

    let conn = client.fetch_feed_connection().await?;

    // `feed` aborts the listener if anything below returns early.
    let (feed, price_rx) = spawn_first_price(conn, config.pair.clone());

    let observation = match price_rx.await {
        Ok(observation) => observation,
        Err(_) => {
            return Err(feed.join().await.err().unwrap_or_else(|| {
                BotError::FeedProtocolError("feed ended without a price".to_string())
            }));
        }
    };
    info!(
        price = %observation.price,
        received_at = %observation.received_at,
        "price observed"
    );

    let submitter = OrderSubmitter::new(client, config.pair.clone(), config.price_offset);
    let outcome = submitter
        .submit(observation.price, config.budget_quote, &increments, config.mode)
        .await;

    if let Err(e) = feed.join().await {
        warn!(error = %e, "feed did not close cleanly");
    }

    outcome
}
