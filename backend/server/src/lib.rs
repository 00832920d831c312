use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod content;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod utils;

use config::Config;
use routes::{
    create_placeholder, function_preflight, get_preference, proxy_image, proxy_missing_key,
    proxy_preflight, put_preference, resolve_image, sync_image_to_local,
};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load();

    info!("Initializing state...");
    let state = match State::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize state: {e:#}");
            return;
        }
    };

    info!("Starting server...");

    let app = build_router(state);

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");

    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {address}: {e}");
            return;
        }
    };
    info!("Server running on {address}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
    }

    info!("Server shutting down...");
}

pub fn build_router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route(
            "/api/preferences/image",
            get(get_preference).put(put_preference),
        )
        .route("/api/images/resolve", post(resolve_image))
        .layer(cors);

    // image proxy and functions answer their own preflights
    let functions = Router::new()
        .route("/api/i", get(proxy_missing_key).options(proxy_preflight))
        .route("/api/i/", get(proxy_missing_key).options(proxy_preflight))
        .route("/api/i/{*key}", get(proxy_image).options(proxy_preflight))
        .route(
            "/functions/sync-image-to-local",
            post(sync_image_to_local).options(function_preflight),
        )
        .route(
            "/functions/create-placeholder",
            post(create_placeholder).options(function_preflight),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ));

    api.merge(functions).with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
