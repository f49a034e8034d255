use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use oauth2_token::config::{BootstrapClient, Config};
use oauth2_token::events::TracingEventSink;
use oauth2_token::keys::CertificateKeyPair;
use oauth2_token::logging::init_tracing;
use oauth2_token::models::{Application, OAuth2Provider};
use oauth2_token::policy::StaticPolicy;
use oauth2_token::server::{router, AppState};
use oauth2_token::storage::MemoryStore;
use oauth2_token::Backends;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting OAuth2 Token Service");

    let store = MemoryStore::new();
    match &config.bootstrap {
        Some(client) => seed(&store, client).await?,
        None => warn!("No BOOTSTRAP_CLIENT_ID set, store starts empty"),
    }

    let backends = Backends::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(StaticPolicy::allow()),
        Arc::new(TracingEventSink),
    );
    let app = router(AppState::new(&backends, &config));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("OAuth2 Token Service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    })
    .await?;

    Ok(())
}

async fn seed(store: &MemoryStore, client: &BootstrapClient) -> anyhow::Result<()> {
    let mut provider = OAuth2Provider::new(&client.client_id, &client.client_secret)
        .with_client_type(client.client_type)
        .with_redirect_uris(&client.redirect_uris)
        .with_token_validity(client.token_validity);

    if let Some(path) = &client.signing_key_path {
        let pem = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read signing key {path}"))?;
        let key = CertificateKeyPair::from_pem(path.as_str(), &pem)?;
        info!(kid = key.kid(), "Loaded signing key");
        provider = provider.with_signing_key(store.insert_key(key).await);
    }

    store
        .insert_application(Application::new(&client.app_slug, Some(provider.id)))
        .await;
    info!(
        client_id = %provider.client_id,
        app = %client.app_slug,
        "Seeded bootstrap client"
    );
    store.insert_provider(provider).await;
    Ok(())
}
