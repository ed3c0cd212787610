use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use goonker_server::config::Settings;
use goonker_server::http::routes::{self, AppState};
use goonker_server::room::RoomManager;
use goonker_server::telemetry::{self, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(LogFormat::from_env());

    let settings = Settings::from_env();
    let room_config = settings
        .room_config()
        .context("failed to load challenges")?;
    info!(
        board_size = settings.board_size,
        bot = ?settings.bot,
        challenges = room_config.challenges.len(),
        "configuration loaded"
    );

    let state = AppState {
        rooms: RoomManager::new(room_config),
        write_timeout: settings.write_timeout,
    };
    let app = routes::router(state);

    let addr = settings.addr;
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
