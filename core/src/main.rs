mod app;
mod config;
mod crawler;
mod dispatcher;
mod engine;
mod error;
mod fetcher;
mod json;
mod pipeline;
mod query;
mod rank;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use mimalloc::MiMalloc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::App;
use config::Config;

#[global_allocator]
static ALLOC: MiMalloc = MiMalloc;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load_or_exit(DEFAULT_CONFIG_PATH);
    let cors_origins = config.service.cors_origins.clone();

    let app = match App::new(config) {
        Ok(app) => app,
        Err(err) => {
            tracing::error!(?err, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    let dispatcher_app = Arc::new(app.clone());
    tokio::spawn(async move {
        dispatcher::run(dispatcher_app).await;
    });

    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(
            cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<_>>(),
        )
    };

    let router = Router::new()
        .merge(query::route())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app);

    let addr: SocketAddr = DEFAULT_BIND_ADDR.parse().expect("static bind address is valid");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(%addr, "read API listening");
    axum::serve(listener, router.into_make_service())
        .await
        .expect("server exited unexpectedly");
}
