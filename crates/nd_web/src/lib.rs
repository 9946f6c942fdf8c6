use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/runs", post(handlers::trigger_run))
        .route("/api/status", get(handlers::get_status))
        .route("/api/newsletters", get(handlers::list_newsletters))
        .route(
            "/api/newsletters/:id",
            get(handlers::get_newsletter).delete(handlers::delete_newsletter),
        )
        .route("/api/newsletters/:id/html", get(handlers::get_newsletter_html))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> nd_core::Result<()> {
    let app = create_app(state).await;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Dashboard API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use nd_core::{Error, Result};
}
