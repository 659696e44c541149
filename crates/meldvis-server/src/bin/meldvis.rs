//! Meldvis server
//!
//! Follow a running Meld program and serve its execution graph.

use meldvis_core::VisConfig;
use meldvis_server::{RuntimeClient, SessionActor, VisServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meldvis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = VisConfig::from_env()?;
    tracing::info!(runtime = %config.runtime_url, listen = %config.listen_addr, "starting meldvis");

    let (session, outbound) = SessionActor::spawn(&config);
    let client = RuntimeClient::new(
        config.runtime_url.clone(),
        config.reconnect_interval,
        session.clone(),
        outbound,
    );
    tokio::spawn(client.run());

    VisServer::new(session).serve(config.listen_addr).await?;
    Ok(())
}
