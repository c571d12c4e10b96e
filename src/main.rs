use chrono::{Days, Local};
use tracing::info;

use roomledger::engine::CalendarMonth;
use roomledger::model::Stay;
use roomledger::{Config, Engine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    if let Some(dir) = sqlite_parent_dir(&config.database_url) {
        std::fs::create_dir_all(dir)?;
    }

    let engine = Engine::open(&config).await?;
    info!("roomledger ready");
    info!("  database: {}", config.database_url);
    info!("  max_connections: {}", config.max_connections);
    info!("  op_timeout: {:?}", config.op_timeout);

    let rooms = engine.ensure_rooms(&config.rooms).await?;
    info!("  rooms: {}", rooms.len());

    let today = Local::now().date_naive();
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or("date out of range")?;
    let free = engine.free_rooms(Stay::new(today, tomorrow)?).await?;
    info!("{} of {} room(s) free tonight", free.len(), rooms.len());

    let view = engine.calendar(CalendarMonth::containing(today)?).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    engine.store().close().await;
    Ok(())
}

/// Directory holding a file-backed SQLite database, if the URL names one.
fn sqlite_parent_dir(url: &str) -> Option<&std::path::Path> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    std::path::Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}
