//! Multi-transport chat server - Entry Point
//!
//! Starts the orchestrator, the history sink and one listener per
//! transport, then waits for Ctrl-C and drains every session.

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cherry_chat::{health, server, tls, AppError, Cli, Listener, MessageHistory, Transport};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG controls the level, e.g. RUST_LOG=cherry_chat=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cherry_chat=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = cli.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("Server failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = cli.server_config()?;
    let tls_paths = cli.tls_paths()?;

    let history = match cli.history_root() {
        Some(root) => Some(MessageHistory::open(root).await?),
        None => {
            info!("Message history disabled");
            None
        }
    };

    let handle = server::spawn(config, history);
    let stop = CancellationToken::new();

    let mut listeners = vec![
        Listener::bind(cli.tcp_addr, Transport::Line, None, handle.clone()).await?,
        Listener::bind(cli.ws_addr, Transport::WebSocket, None, handle.clone()).await?,
    ];
    if let (Some(addr), Some((cert, key))) = (cli.wss_addr, tls_paths) {
        let acceptor = tls::load_acceptor(&cert, &key)?;
        listeners.push(
            Listener::bind(addr, Transport::SecureWebSocket, Some(acceptor), handle.clone())
                .await?,
        );
    }
    for listener in listeners {
        tokio::spawn(listener.run(stop.clone()));
    }

    if let Some(addr) = cli.health_addr {
        let listener = TcpListener::bind(addr).await?;
        tokio::spawn(health::serve(listener, handle.clone(), stop.clone()));
    }

    info!("Chat server running; press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }

    info!("Shutdown signal received");
    stop.cancel();

    let report = handle.shutdown(Some(cli.shutdown_timeout())).await?;
    if report.timed_out {
        warn!(
            "Shutdown timed out with {} of {} sessions still draining",
            report.remaining, report.total
        );
    } else {
        info!("All {} sessions drained", report.total);
    }
    Ok(())
}
