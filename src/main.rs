// =============================================================================
// KuCoin HF Bot — Main Entry Point
// =============================================================================
//
// One run = one limit buy. The bot starts in Preview (dry-run) mode unless
// DRY_RUN=false is set explicitly; Preview never contacts the order endpoint.
//
// Exit codes: 0 success, 1 configuration or pipeline failure, 2 order
// rejected by the exchange, 3 order never reached the exchange.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod config;
mod error;
mod execution;
mod kucoin;
mod market_data;
mod orchestrator;
mod rounding;
mod types;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::BotConfig;
use crate::kucoin::KucoinClient;
use crate::types::{OrderOutcome, TradingMode};

#[tokio::main]
async fn main() -> ExitCode {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "invalid configuration");
            return ExitCode::from(1);
        }
    };

    info!(
        pair = %config.pair,
        mode = %config.mode,
        budget_quote = %config.budget_quote,
        price_offset = %config.price_offset,
        offset_pct = %config.price_offset_pct(),
        "starting HF bot"
    );
    if config.mode == TradingMode::Live {
        warn!("LIVE mode: one real order will be sent");
    }

    // ── 2. REST client ───────────────────────────────────────────────────
    let client = match KucoinClient::new(config.base_url.clone(), config.credentials.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %format!("{e:#}"), "failed to build REST client");
            return ExitCode::from(1);
        }
    };

    // ── 3. Run ───────────────────────────────────────────────────────────
    match orchestrator::run(&config, client).await {
        Ok(outcome @ OrderOutcome::Previewed(_)) => {
            let order = outcome.order();
            info!(
                symbol = %order.symbol,
                price = %order.price,
                size = %order.size,
                "dry run complete, no order sent"
            );
            ExitCode::SUCCESS
        }
        Ok(outcome @ OrderOutcome::Accepted { .. }) => {
            info!(result = %outcome, "order executed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_fatal() {
                error!(error = %e, "run aborted");
            } else {
                error!(error = %e, "order not placed");
            }
            ExitCode::from(e.exit_code())
        }
    }
}
