use std::io;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Context;
use docuquery::{api, config, logging, processing};
use tokio::net::TcpListener;

/// Ports scanned in order when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 8000..=8099;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();
    let service = processing::RagService::new(config).context("Failed to initialize pipeline")?;
    let options = api::RouterOptions::from_config(config).context("Failed to read home page")?;
    let app = api::create_router(Arc::new(service), options);

    let listener = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    let address = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("Listening on http://{address}");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Bind the configured port, or the first free port in [`FALLBACK_PORTS`].
///
/// A configured port is never substituted: if it is taken the bind error is returned as is.
async fn bind_listener(configured: Option<u16>) -> io::Result<TcpListener> {
    let candidates = configured.map_or(FALLBACK_PORTS, |port| port..=port);
    let mut last_error = None;
    for port in candidates {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok(listener),
            Err(error) if configured.is_none() && error.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port in use, trying the next one");
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no port left to try")
    }))
}
