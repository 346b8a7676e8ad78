//! Chat Service
//!
//! Logs chat exchanges produced elsewhere and serves them back per session.

use crate::db::sqlite::{ChatTurn, NewChatTurn};
use crate::error::{AppError, Result};
use crate::quotes::normalize_symbol;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Default number of turns returned by a history request
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Request to log one exchange
#[derive(Debug, Clone, Deserialize)]
pub struct LogTurnRequest {
    pub session_id: Option<String>,
    pub user_message: String,
    pub ai_response: String,
    pub stock_symbol: Option<String>,
}

/// Session transcript
#[derive(Debug, Clone, Serialize)]
pub struct ChatHistory {
    pub session_id: String,
    pub turns: Vec<ChatTurn>,
}

/// Chat service for business logic
pub struct ChatService;

impl ChatService {
    /// Log a turn, starting a new session when none is given
    pub fn log_turn(state: &AppState, request: LogTurnRequest) -> Result<ChatTurn> {
        if request.user_message.trim().is_empty() {
            return Err(AppError::Validation("user_message must not be empty".to_string()));
        }

        let session_id = match request.session_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let stock_symbol = match request.stock_symbol.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(normalize_symbol(raw)?),
            _ => None,
        };

        info!("ChatService::log_turn - session {}", session_id);

        state.sqlite.insert_chat_turn(&NewChatTurn {
            session_id,
            user_message: request.user_message,
            ai_response: request.ai_response,
            stock_symbol,
        })
    }

    /// Turns of a session, oldest first
    pub fn history(state: &AppState, session_id: &str, limit: Option<usize>) -> Result<ChatHistory> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
        let turns = state.sqlite.get_chat_history(session_id, Some(limit))?;

        Ok(ChatHistory {
            session_id: session_id.to_string(),
            turns,
        })
    }
}
