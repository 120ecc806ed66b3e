//! HTTP surface: two parallel route trees over the same domain, one per
//! storage backend.

pub mod api;
pub mod session;
pub mod state;
mod v1;
mod v2;

pub use session::{PrincipalRef, Session, SessionStore};
pub use state::ServerState;

use anyhow::Result;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::info;

async fn home() -> &'static str {
    "fonoteca-server"
}

async fn fallback() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .nest("/api/v1", v1::router())
        .nest("/api/v2", v2::router())
        .fallback(fallback)
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on port {}", port);
    axum::serve(listener, router).await?;
    Ok(())
}
