//! Chat turn log

use crate::db::sqlite::models::{format_timestamp, timestamp_column, ChatTurn, NewChatTurn};
use crate::error::Result;
use chrono::Utc;
use rusqlite::Connection;

/// Append a chat turn
pub fn insert_turn(conn: &Connection, turn: &NewChatTurn) -> Result<ChatTurn> {
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO chat_history (session_id, user_message, ai_response, stock_symbol, created_at)
         VALUES (?, ?, ?, ?, ?)",
        rusqlite::params![
            turn.session_id,
            turn.user_message,
            turn.ai_response,
            turn.stock_symbol,
            format_timestamp(&created_at),
        ],
    )?;

    Ok(ChatTurn {
        id: conn.last_insert_rowid(),
        session_id: turn.session_id.clone(),
        user_message: turn.user_message.clone(),
        ai_response: turn.ai_response.clone(),
        stock_symbol: turn.stock_symbol.clone(),
        created_at,
    })
}

/// Turns of a session, oldest first.
///
/// With `limit`, only the most recent `limit` turns are returned (still
/// oldest first).
pub fn session_history(conn: &Connection, session_id: &str, limit: Option<usize>) -> Result<Vec<ChatTurn>> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);

    let mut stmt = conn.prepare(
        "SELECT id, session_id, user_message, ai_response, stock_symbol, created_at FROM (
             SELECT * FROM chat_history WHERE session_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?
         ) ORDER BY created_at ASC, id ASC",
    )?;

    let turns = stmt
        .query_map(rusqlite::params![session_id, limit], |row| {
            Ok(ChatTurn {
                id: row.get(0)?,
                session_id: row.get(1)?,
                user_message: row.get(2)?,
                ai_response: row.get(3)?,
                stock_symbol: row.get(4)?,
                created_at: timestamp_column(row, 5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn turn(session: &str, message: &str) -> NewChatTurn {
        NewChatTurn {
            session_id: session.to_string(),
            user_message: message.to_string(),
            ai_response: format!("re: {}", message),
            stock_symbol: None,
        }
    }

    #[test]
    fn test_history_is_per_session_and_ordered() {
        let conn = create_test_db();
        insert_turn(&conn, &turn("s1", "first")).unwrap();
        insert_turn(&conn, &turn("s2", "other")).unwrap();
        insert_turn(&conn, &turn("s1", "second")).unwrap();

        let history = session_history(&conn, "s1", None).unwrap();
        let messages: Vec<_> = history.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn test_history_limit_keeps_most_recent() {
        let conn = create_test_db();
        for i in 0..7 {
            insert_turn(&conn, &turn("s1", &format!("m{}", i))).unwrap();
        }

        let history = session_history(&conn, "s1", Some(5)).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].user_message, "m2");
        assert_eq!(history[4].user_message, "m6");
    }
}
