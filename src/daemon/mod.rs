use std::path::PathBuf;

use anyhow::{Context, Result};
use ingest::IngestModule;
use storage::activity_store::LedgerStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    gateway::{GatewayEvent, discord::DiscordGateway},
    utils::clock::DefaultClock,
};

pub mod args;
pub mod ingest;
pub mod shutdown;
pub mod storage;

pub const TOKEN_VAR: &str = "GUILDWATCH_TOKEN";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let token = std::env::var(TOKEN_VAR)
        .with_context(|| format!("Bot token expected in the {TOKEN_VAR} environment variable"))?;

    let (sender, receiver) = mpsc::channel::<GatewayEvent>(EVENT_CHANNEL_CAPACITY);

    let shutdown_token = CancellationToken::new();

    let gateway = DiscordGateway::new(token, sender, shutdown_token.clone());
    let ingest = create_ingest(dir.join("activity"), receiver, gateway.responder())?;

    let (_, gateway_result, ingest_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        gateway.run(),
        ingest.run(),
    );

    if let Err(gateway_result) = gateway_result {
        error!("Gateway module got an error {:?}", gateway_result);
    }

    if let Err(ingest_result) = ingest_result {
        error!("Ingest module got an error {:?}", ingest_result);
    }

    Ok(())
}

fn create_ingest(
    ledger_dir: PathBuf,
    receiver: mpsc::Receiver<GatewayEvent>,
    responder: Box<dyn crate::gateway::Responder>,
) -> Result<IngestModule<LedgerStore>> {
    let store = LedgerStore::new(ledger_dir)?;
    Ok(IngestModule::new(
        receiver,
        store,
        responder,
        Box::new(DefaultClock),
    ))
}
