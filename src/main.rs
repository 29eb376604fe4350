mod config;
mod db;
mod protocol;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("configuration error");
    let jwt = services::auth::JwtConfig::from_env().expect("JWT_SECRET required");
    let runner = services::execution::PistonClient::from_env().expect("execution client init failed");

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("database init failed");

    let state = state::AppState::new(pool, jwt, Arc::new(runner), config.ws_notify_malformed);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "collabcode listening");
    axum::serve(listener, app).await.expect("server failed");
}
