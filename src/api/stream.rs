//! WebSocket price stream
//!
//! Pushes a `stock_update` batch for the configured stream symbols on connect
//! and then once per stream interval, until the client goes away.

use crate::api::types::StreamMessage;
use crate::services::{BatchQuotes, QuotesService};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// GET /ws/stocks
pub async fn stock_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let symbols = state.config.stream_symbols.clone();

    let period = state.config.stream_interval.max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Price stream client connected ({} symbols)", symbols.len());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let message = match QuotesService::get_batch(&state, &symbols).await {
                    Ok(batch) => update_message(batch),
                    Err(e) => StreamMessage::Error {
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    },
                };

                let payload = match serde_json::to_string(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to encode stream update: {}", e);
                        continue;
                    }
                };

                if let Err(e) = sender.send(Message::Text(payload)).await {
                    debug!("Price stream send failed: {}", e);
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Price stream receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    info!("Price stream client disconnected");
}

/// Stream message for a fetched batch
pub fn update_message(batch: BatchQuotes) -> StreamMessage {
    StreamMessage::StockUpdate {
        data: batch.quotes,
        missing: batch.missing,
        timestamp: batch.fetched_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::testing::quote;

    #[test]
    fn test_update_message_shape() {
        let batch = BatchQuotes {
            quotes: vec![quote("AAPL", 180.0)],
            missing: vec!["MSFT".to_string()],
            fetched_at: Utc::now(),
        };

        let json = serde_json::to_value(update_message(batch)).unwrap();
        assert_eq!(json["type"], "stock_update");
        assert_eq!(json["data"][0]["symbol"], "AAPL");
        assert_eq!(json["missing"][0], "MSFT");
    }
}
