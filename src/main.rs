use neurominder::api::{self, ApiState};
use neurominder::application::bootstrap::bootstrap_workspace;
use neurominder::application::push_dispatcher::PushDispatcher;
use neurominder::infrastructure::config::{load_secrets, load_server_config};
use neurominder::infrastructure::push_client::VapidPushClient;
use neurominder::infrastructure::push_state::KvPushStateRepository;
use neurominder::infrastructure::store::SqliteKeyValueStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let workspace_root = match std::env::var("NEUROMINDER_ROOT") {
        Ok(root) => PathBuf::from(root),
        Err(_) => std::env::current_dir()?,
    };
    let bootstrap = bootstrap_workspace(&workspace_root)?;
    let config = load_server_config(&bootstrap.config_dir)?;
    let secrets = load_secrets()?;

    let repository = Arc::new(KvPushStateRepository::new(SqliteKeyValueStore::new(
        &bootstrap.database_path,
    )));
    let push_client = Arc::new(
        VapidPushClient::new(secrets.vapid_subject, secrets.vapid_private_key)
            .with_ttl(config.push_ttl_seconds),
    );
    let dispatcher = Arc::new(PushDispatcher::new(
        Arc::clone(&repository),
        Arc::clone(&push_client),
        config.icon.clone(),
    ));
    let state = ApiState::new(
        repository,
        dispatcher,
        push_client,
        secrets.cron_secret,
        config.icon.clone(),
    );

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(timezone = %config.timezone, "push relay listening on http://{local_addr}");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
