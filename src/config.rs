// =============================================================================
// Bot Configuration — environment-driven settings for a single buy run
// =============================================================================
//
// Every key is optional. `.env` is loaded by main.rs before this runs, so the
// same keys can live in a file or in the real environment.
//
// Live trading is opt-in: only `DRY_RUN=false` leaves Preview mode. A typo
// such as `DRY_RUN=flase` keeps the run in Preview.
// =============================================================================

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

use crate::types::TradingMode;

pub const ENV_API_KEY: &str = "KUCOIN_API_KEY";
pub const ENV_API_SECRET: &str = "KUCOIN_API_SECRET";
pub const ENV_API_PASSPHRASE: &str = "KUCOIN_API_PASSPHRASE";
pub const ENV_PAIR: &str = "PAIR";
pub const ENV_BUDGET: &str = "AMOUNT_TO_BUY_USDT";
pub const ENV_PRICE_OFFSET: &str = "PRICE_OFFSET";
pub const ENV_DRY_RUN: &str = "DRY_RUN";
pub const ENV_BASE_URL: &str = "KUCOIN_BASE_URL";

// =============================================================================
// Default-value helpers
// =============================================================================

fn default_pair() -> String {
    "BTC-USDT".to_string()
}

fn default_budget_quote() -> Decimal {
    Decimal::from(20)
}

/// 1.001 = 0.1 % above the observed price.
fn default_price_offset() -> Decimal {
    Decimal::new(1001, 3)
}

fn default_base_url() -> String {
    "https://api.kucoin.com".to_string()
}

// =============================================================================
// Credentials
// =============================================================================

/// API key, secret, and passphrase. `Debug` never prints them.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            api_key: "demo_key".to_string(),
            api_secret: "demo_secret".to_string(),
            api_passphrase: "demo_pass".to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("api_passphrase", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// BotConfig
// =============================================================================

/// Immutable run context assembled once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub credentials: Credentials,

    /// Trading pair, exactly as the exchange lists it (e.g. "BTC-USDT").
    pub pair: String,

    /// Quote-currency amount to spend.
    pub budget_quote: Decimal,

    /// Multiplier applied to the observed price before rounding.
    ///
    /// Above 1 the buy is priced above market (a markup that fills more
    /// readily); below 1 it rests under market as a discount bid.
    pub price_offset: Decimal,

    pub mode: TradingMode,

    /// REST host, without a trailing slash.
    pub base_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            pair: default_pair(),
            budget_quote: default_budget_quote(),
            price_offset: default_price_offset(),
            mode: TradingMode::Preview,
            base_url: default_base_url(),
        }
    }
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// missing or blank keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Credentials::default();
        let credentials = Credentials {
            api_key: get(ENV_API_KEY).unwrap_or(defaults.api_key),
            api_secret: get(ENV_API_SECRET).unwrap_or(defaults.api_secret),
            api_passphrase: get(ENV_API_PASSPHRASE).unwrap_or(defaults.api_passphrase),
        };

        let budget_quote = match get(ENV_BUDGET) {
            Some(raw) => parse_positive_decimal(ENV_BUDGET, &raw)?,
            None => default_budget_quote(),
        };
        let price_offset = match get(ENV_PRICE_OFFSET) {
            Some(raw) => parse_positive_decimal(ENV_PRICE_OFFSET, &raw)?,
            None => default_price_offset(),
        };

        Ok(Self {
            credentials,
            pair: get(ENV_PAIR).unwrap_or_else(default_pair),
            budget_quote,
            price_offset,
            mode: parse_mode(get(ENV_DRY_RUN).as_deref()),
            base_url: get(ENV_BASE_URL)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(default_base_url),
        })
    }

    /// Signed distance of the limit price from market, in percent.
    pub fn price_offset_pct(&self) -> Decimal {
        (self.price_offset - Decimal::ONE) * Decimal::ONE_HUNDRED
    }
}

fn parse_positive_decimal(key: &str, raw: &str) -> Result<Decimal> {
    let value =
        Decimal::from_str(raw).with_context(|| format!("{key} is not a decimal number"))?;
    if value <= Decimal::ZERO {
        bail!("{key} must be greater than zero, got {value}");
    }
    Ok(value)
}

/// Map `DRY_RUN` to a trading mode. Only an explicit "false" goes live.
fn parse_mode(raw: Option<&str>) -> TradingMode {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("true") => TradingMode::Preview,
        Some("false") => TradingMode::Live,
        Some(other) => {
            warn!(value = %other, "unrecognised DRY_RUN value, staying in Preview mode");
            TradingMode::Preview
        }
    }
}
