use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use memewall_api::auth::{self, AppState, AppStateInner};
use memewall_api::middleware::{require_admin, require_auth};
use memewall_api::{admin, feed, memes, votes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memewall=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("MEMEWALL_DB_PATH").unwrap_or_else(|_| "memewall.db".into());
    let host = std::env::var("MEMEWALL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MEMEWALL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = memewall_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db });

    // Routes. The meme write handlers validate the bearer token themselves
    // since they share paths with public reads; /admin/* goes through the
    // auth + role middleware stack.
    let api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/memes", get(feed::list_memes).post(memes::create_meme))
        .route("/memes/{id}", get(feed::get_meme).delete(memes::delete_meme))
        .route("/memes/{id}/adjacent", get(feed::get_adjacent))
        .route("/memes/chunk/{chunk}/{position}", get(feed::get_by_chunk_position))
        .route("/memes/{id}/vote", post(votes::cast_vote))
        .with_state(app_state.clone());

    let admin_routes = Router::new()
        .route("/admin/migrations/{name}", post(admin::run_migration))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(api_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Memewall server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
