use propdesk::config::ServerConfig;
use propdesk::guard::GuardConfig;
use propdesk::routes;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid server config");
    if !config.pages_dir.is_dir() {
        tracing::warn!(pages_dir = %config.pages_dir.display(), "pages directory missing; only redirects will be served");
    }

    let app = routes::app(&config.pages_dir, GuardConfig::default());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, pages_dir = %config.pages_dir.display(), "propdesk listening");
    axum::serve(listener, app).await.expect("server failed");
}
