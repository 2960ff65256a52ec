//! mcafk binary entry point.
//!
//! Wires the pieces together: configuration, logging, the adapter socket
//! feeding the link, and the session controller supervising the predictors.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use mcafk_core::link::{ChannelLink, PacketLink};
use mcafk_proxy::adapter::AdapterServer;
use mcafk_proxy::{Cli, ProxyServer};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format = cli.log_format.into();
    if let Err(e) = mcafk_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "mcafk starting");

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(%e, "configuration rejected");
            std::process::exit(1);
        }
    };
    info!(
        remote = %config.minecraft.remote_server.host,
        version = %config.minecraft.remote_server.version,
        "configuration loaded"
    );

    let link = ChannelLink::new();
    let adapter = match AdapterServer::bind(cli.listen, link.clone()).await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!(%e, addr = %cli.listen, "failed to bind adapter socket");
            std::process::exit(1);
        }
    };
    match adapter.local_addr() {
        Ok(addr) => info!(%addr, "adapter socket listening"),
        Err(e) => error!(%e, "adapter socket address unavailable"),
    }

    let behavior = config.minecraft.local_server_proxy_config.clone();
    let server = ProxyServer::new(Arc::new(link.clone()) as Arc<dyn PacketLink>, behavior);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(%e, "proxy session failed");
            }
        }
        result = adapter.run() => {
            if let Err(e) = result {
                error!(%e, "adapter socket failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    if let Err(e) = server.stop() {
        error!(%e, "teardown reported failures");
    }
    link.shutdown();
    info!(metrics = %link.metrics().snapshot(), "session ended");
}
