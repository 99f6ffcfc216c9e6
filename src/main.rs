mod config;
mod db;
mod mail;
mod rate_limit;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let mailer = mail::mailer_from_config(config.resend.as_ref());
    if config.resend.is_none() {
        tracing::warn!("RESEND_API_KEY not set; emails are logged, not delivered");
    }

    let port = config.port;
    let state = state::AppState::new(pool, config, mailer);

    // Expired sessions, spent codes and stale invites.
    let _cleanup = services::maintenance::spawn_cleanup_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "hearthbook listening");
    axum::serve(listener, app).await.expect("server failed");
}
