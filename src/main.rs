use crate::config::Config;
use crate::startup::{AppState, router};
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

mod auth;
mod config;
mod db;
mod error;
mod live;
mod options;
mod polls;
mod startup;
mod users;
mod votes;

#[tokio::main]
async fn main() {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db = db::init_db(&config.database_url, config.db_max_connections)
        .await
        .expect("Unable to connect to the database");

    let addr = config.bind_addr;
    let app_state = AppState::new(db, config);
    app_state.spawn_health_check();

    let app = router(app_state);

    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
