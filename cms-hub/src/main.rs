use anyhow::Result;
use axum::serve;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cms_hub::api;
use cms_hub::config::{Cli, Config};
use cms_hub_core::auth::{CredentialStore, Hs256Tokens};
use cms_hub_core::storage::DocumentStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(Cli::parse());

    // Credentials are loaded once here and only rewritten on sign-up.
    let credentials = Arc::new(CredentialStore::load(&config.users_file)?);
    let store = DocumentStore::new(&config.data_dir, credentials.clone())?;
    let tokens = Arc::new(Hs256Tokens::new(&config.jwt_secret));
    let app = api::router(Arc::new(RwLock::new(store)), credentials, tokens);

    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        addr = %config.addr,
        data_dir = %config.data_dir.display(),
        "listening"
    );
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
