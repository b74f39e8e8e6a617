//! Read-only local status API.
//!
//! Lets the user inspect schedules, priority lists, attempt state and the
//! status log while the daemon runs. Strictly read-only; configuration
//! edits go through the CLI.

pub mod routes;
pub mod state;

use anyhow::Result;

pub use routes::api_routes;
pub use state::AppState;

/// Serve the status API until the process exits.
pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api_routes(state);

    tracing::info!(%addr, "status API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
