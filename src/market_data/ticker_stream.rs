// =============================================================================
// Ticker Stream — first live price from the KuCoin public WebSocket
// =============================================================================
//
// Single-shot listener: connect, subscribe to `/market/ticker:{pair}`, wait for
// the first message carrying `data.price`, hand it over, close. There is no
// reconnect; any failure before the price arrives ends the run.
//
//   Connecting -> Subscribed -> AwaitingFirstTick -> Delivered -> Closed
//
// While waiting, a client ping is sent every `ping_interval` so the server
// keeps an idle subscription open. No overall timeout is applied: a feed that
// never ticks keeps the caller waiting.
// =============================================================================

use std::str::FromStr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::BotError;
use crate::types::{FeedConnection, PriceObservation};

/// Upper bound on waiting for the server to acknowledge our close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Connecting,
    Subscribed,
    AwaitingFirstTick,
    Delivered,
    Closed,
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::AwaitingFirstTick => write!(f, "AwaitingFirstTick"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Subscription frame for one pair's ticker topic.
pub fn subscribe_message(pair: &str) -> String {
    json!({
        "type": "subscribe",
        "topic": format!("/market/ticker:{pair}"),
        "privateChannel": false,
    })
    .to_string()
}

fn ping_message(seq: u64) -> String {
    json!({ "id": seq.to_string(), "type": "ping" }).to_string()
}

/// Extract `data.price` from one feed message.
///
/// `Ok(None)` for anything without a price (welcome, ack, pong). A server
/// `error` frame or a price that is not a positive decimal is an error.
pub fn parse_ticker_price(text: &str) -> Result<Option<Decimal>, BotError> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| BotError::FeedProtocolError(format!("non-JSON feed message: {e}")))?;

    if root["type"].as_str() == Some("error") {
        return Err(BotError::FeedProtocolError(format!("server error frame: {root}")));
    }

    let raw = match root.get("data").and_then(|d| d.get("price")) {
        Some(v) => v,
        None => return Ok(None),
    };

    let price = match raw {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        _ => None,
    }
    .ok_or_else(|| BotError::FeedProtocolError(format!("unparseable ticker price: {raw}")))?;

    if price <= Decimal::ZERO {
        return Err(BotError::FeedProtocolError(format!(
            "non-positive ticker price: {price}"
        )));
    }
    Ok(Some(price))
}

// ---------------------------------------------------------------------------
// Feed task
// ---------------------------------------------------------------------------

/// Handle on the spawned feed. Dropping it aborts the task, which drops the
/// socket, so no exit path leaves the connection open.
pub struct FeedTask {
    handle: Option<JoinHandle<Result<(), BotError>>>,
}

impl FeedTask {
    /// Wait for the feed to finish closing and return how it ended.
    pub async fn join(mut self) -> Result<(), BotError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(BotError::FeedProtocolError(format!("feed task failed: {e}"))),
        }
    }

    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl Drop for FeedTask {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Spawn the listener. The receiver resolves with the first price; if the
/// feed fails first it is dropped and the error is available from
/// [`FeedTask::join`].
pub fn spawn_first_price(
    conn: FeedConnection,
    pair: String,
) -> (FeedTask, oneshot::Receiver<PriceObservation>) {
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move { run_ticker_stream(&conn, &pair, tx).await });
    (
        FeedTask {
            handle: Some(handle),
        },
        rx,
    )
}

/// Connect, subscribe, deliver the first price on `on_price`, then close.
pub async fn run_ticker_stream(
    conn: &FeedConnection,
    pair: &str,
    on_price: oneshot::Sender<PriceObservation>,
) -> Result<(), BotError> {
    let mut state = FeedState::Connecting;
    info!(endpoint = %conn.endpoint, pair, "connecting to ticker WebSocket");

    // Nagle off: the price matters more than the few bytes we send.
    let (ws_stream, _response) = connect_async_with_config(conn.url(), None, true)
        .await
        .map_err(|e| BotError::FeedConnectFailed(format!("WebSocket connect failed: {e}")))?;

    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(subscribe_message(pair)))
        .await
        .map_err(|e| BotError::FeedProtocolError(format!("subscribe send failed: {e}")))?;
    state = advance(state, FeedState::Subscribed);

    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + conn.ping_interval,
        conn.ping_interval,
    );
    let mut ping_seq: u64 = 0;
    state = advance(state, FeedState::AwaitingFirstTick);

    let price = loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(price) = parse_ticker_price(&text)? {
                        break price;
                    }
                    debug!(message = %text, "ignoring feed message without price");
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(BotError::FeedProtocolError(format!(
                        "server closed feed before first tick: {frame:?}"
                    )));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(BotError::FeedProtocolError(format!("feed read error: {e}")));
                }
                None => {
                    return Err(BotError::FeedProtocolError(
                        "feed stream ended before first tick".to_string(),
                    ));
                }
            },
            _ = ping.tick() => {
                ping_seq += 1;
                write
                    .send(Message::Text(ping_message(ping_seq)))
                    .await
                    .map_err(|e| BotError::FeedProtocolError(format!("ping send failed: {e}")))?;
                debug!(seq = ping_seq, "feed ping sent");
            }
        }
    };

    let observation = PriceObservation::now(price);
    if on_price.send(observation).is_err() {
        warn!("price receiver dropped before delivery");
    }
    state = advance(state, FeedState::Delivered);
    info!(pair, price = %price, "first ticker price received");

    // Best effort: the price is already delivered, so a messy close is only
    // worth a warning.
    if let Err(e) = write.send(Message::Close(None)).await {
        warn!(error = %e, "failed to send close frame");
    }
    let drained = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(msg)) = read.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!("server did not acknowledge close in time");
    }
    advance(state, FeedState::Closed);
    Ok(())
}

fn advance(from: FeedState, to: FeedState) -> FeedState {
    debug!(from = %from, to = %to, "feed state");
    to
}
