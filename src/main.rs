//! Buidler mint client
//!
//! Connects the configured wallet, keeps the sale state in sync with the
//! collection contract and serves it over HTTP together with the user
//! actions (start presale, presale mint, public mint) and token metadata.

use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use mint_client::config::Config;
use mint_client::connector::{ChainConnector, LocalWallet};
use mint_client::gateway::EvmSaleGateway;
use mint_client::metadata::MetadataTemplate;
use mint_client::metrics::Metrics;
use mint_client::server::{self, AppState};
use mint_client::types::SystemClock;
use mint_client::SaleClient;
use tracing::{error, info};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Buidler mint client");

    let config = Config::load()?;
    info!(
        evm_rpc = %config.evm_rpc_url,
        contract = %config.nft_contract_address,
        required_chain_id = config.required_chain_id,
        "Configuration loaded"
    );

    let wallet = Arc::new(LocalWallet::new(
        &config.evm_rpc_url,
        config.wallet_private_key.as_deref(),
    )?);
    let gateway = EvmSaleGateway::new(
        &config.nft_contract_address,
        Duration::from_millis(config.tx_confirm_timeout_ms),
    )?;

    let client = Arc::new(SaleClient::new(
        ChainConnector::new(wallet, config.required_chain_id),
        Arc::new(gateway),
        Arc::new(SystemClock),
        Arc::new(Metrics::new()),
        Duration::from_millis(config.poll_interval_ms),
        config.max_supply,
    ));

    client
        .connect()
        .await
        .wrap_err("Failed to connect wallet")?;

    let state = AppState {
        client: client.clone(),
        metadata: Arc::new(MetadataTemplate::new(
            &config.collection_name,
            &config.metadata_base_url,
        )),
    };

    let bind_address = config.bind_address.clone();
    let http_port = config.http_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(&bind_address, http_port, state).await {
            error!(error = %e, "HTTP server error");
        }
    });

    wait_for_shutdown_signal().await;

    server_handle.abort();
    client.disconnect().await;

    info!("Buidler mint client stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,buidler_mint=debug,mint_client=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
