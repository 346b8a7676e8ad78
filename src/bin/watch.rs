//! Terminal watchlist that stays in sync with the API server
//!
//! Usage: `stockdash-watch [+SYMBOL | -SYMBOL]...`
//!
//! `+SYMBOL` adds and `-SYMBOL` removes a symbol before polling starts.
//! The server URL comes from `STOCKDASH_API_URL` and the polling period from
//! `STOCKDASH_SYNC_INTERVAL_SECS`. `STOCKDASH_USER_ID` selects whose watchlist
//! to show; the server default user is used when it is unset.

use anyhow::Context;
use stockdash::client::{ApiClient, DisplayState, Synchronizer};
use stockdash::config::env_or;
use std::sync::Arc;
use std::time::Duration;

fn render(display: &DisplayState) {
    println!("{:<8} {:>10} {:>8} {:>14}  {}", "SYMBOL", "PRICE", "CHG%", "VOLUME", "NAME");
    for row in display.rows() {
        let price = row.price.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".into());
        let change = row
            .change_percent
            .map(|c| format!("{:+.2}", c))
            .unwrap_or_else(|| "-".into());
        let volume = row.volume.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        let name = row.company_name.as_deref().unwrap_or(if row.pending { "(pending)" } else { "" });
        println!("{:<8} {:>10} {:>8} {:>14}  {}", row.symbol, price, change, volume, name);
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    stockdash::init_tracing();

    let api_url: String = env_or("STOCKDASH_API_URL", "http://127.0.0.1:8000".to_string())?;
    let interval_secs: u64 = env_or("STOCKDASH_SYNC_INTERVAL_SECS", 30)?;

    let mut client = ApiClient::new(&api_url, Duration::from_secs(10))?;
    let user_id: String = env_or("STOCKDASH_USER_ID", String::new())?;
    if !user_id.is_empty() {
        client = client.with_user(user_id);
    }
    let sync = Synchronizer::new(Arc::new(client), Duration::from_secs(interval_secs.max(1)));

    sync.load()
        .await
        .with_context(|| format!("Failed to load watchlist from {}", api_url))?;

    for arg in std::env::args().skip(1) {
        let result = if let Some(symbol) = arg.strip_prefix('+') {
            sync.add(symbol).await.map(|_| ())
        } else if let Some(symbol) = arg.strip_prefix('-') {
            sync.remove(symbol).await
        } else {
            eprintln!("Ignoring argument {}: expected +SYMBOL or -SYMBOL", arg);
            continue;
        };
        if let Err(e) = result {
            eprintln!("{}: {}", arg, e);
        }
    }

    let mut updates = sync.subscribe();
    render(&sync.display());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&sync.display());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sync.stop();
    Ok(())
}
