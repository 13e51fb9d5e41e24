//! Relay server entry point.

use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::relay::upstream::HttpUpstream;
use crate::relay::{build_router, RelayMode, RelayState};

pub async fn run_serve(listen: Option<String>) -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let mode: RelayMode = config.mode().parse()?;
    let upstream_url = config.upstream_url();
    let upstream = HttpUpstream::new(&upstream_url)?;
    let state = RelayState {
        upstream: Arc::new(upstream),
        mode,
    };

    let addr = listen.unwrap_or_else(|| config.listen_addr());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, upstream = %upstream_url, ?mode, "relay listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
