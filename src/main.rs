use duocall::config::Config;
use duocall::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    duocall::telemetry::init(config.mode);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, mode = ?config.mode, "duocall relay listening on ws://{addr}/ws");

    server::serve(listener, AppState::from_config(&config)).await?;
    Ok(())
}
