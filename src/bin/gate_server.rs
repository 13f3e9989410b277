//! Standalone gate server.
//!
//! Accepts connections, requires a hello from each one and echoes `chat`
//! packets back to their sender.
//!
//! Run with: `cargo run --bin gate_server -- [config.toml]`
//! Without a path the configuration comes from `GAME_TRANSPORT_*` variables.

use game_transport::config::{AuthenticationMode, NetworkConfig, DEFAULT_CIPHER_KEY};
use game_transport::prelude::*;
use game_transport::utils::logging::init_logging;
use game_transport::utils::metrics::Metrics;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const CHAT_PACKET_NAME: &str = "chat";

fn load_config() -> Result<NetworkConfig> {
    match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path),
        None => NetworkConfig::from_env(),
    }
}

fn build_registry() -> Result<Arc<PacketRegistry>> {
    let registry = PacketRegistry::with_hello()?;
    registry.register_raw(Alias::from_name(CHAT_PACKET_NAME))?;
    Ok(Arc::new(registry))
}

fn build_handlers() -> Result<HandlerTable> {
    let handlers = HandlerTable::new();
    handlers.bind(Alias::from_name(CHAT_PACKET_NAME), |context, packet| {
        info!(
            connection = %context.connection.id(),
            peer = %context.peer,
            size = packet.payload().len(),
            "Chat received"
        );
        context.connection.send(packet.clone())
    })?;
    Ok(handlers)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.logging)?;

    let (warnings, errors): (Vec<_>, Vec<_>) = config
        .validate()
        .into_iter()
        .partition(|problem| problem.starts_with("WARNING"));
    for warning in &warnings {
        warn!("{warning}");
    }
    if !errors.is_empty() {
        return Err(ProtocolError::ConfigError(errors.join("; ")));
    }
    if config.transport.authentication == AuthenticationMode::Token
        && config.transport.cipher_key == DEFAULT_CIPHER_KEY
    {
        warn!("Using the placeholder cipher key; set GAME_TRANSPORT_CIPHER_KEY in production");
    }

    let metrics = Arc::new(Metrics::new());
    let gate = SessionGate::new(Arc::new(build_handlers()?))
        .with_hello_timeout(config.server.hello_timeout)
        .with_metrics(Arc::clone(&metrics))
        .with_server_identity(Uuid::new_v4());

    let server = Server::from_config(&config, build_registry()?)
        .session_gate(Arc::new(gate))
        .metrics(metrics)
        .bind()
        .await?;

    info!(
        app = %config.logging.app_name,
        address = %server.local_addr(),
        authentication = ?config.transport.authentication,
        hello_timeout_ms = config.server.hello_timeout.as_millis() as u64,
        "Gate server ready"
    );
    server.run().await
}
