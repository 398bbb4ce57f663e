use partitioned_log::config::{NodeConfig, USAGE};
use partitioned_log::node::{Node, handlers::router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = match NodeConfig::from_args(&args[1..]) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    // 1. Cluster wiring:
    let node = Node::from_config(&config)?;
    tracing::info!(
        "Node {} starting with {} members (store embedded: {})",
        node.id(),
        node.membership.member_count(),
        node.hosts_store()
    );

    // 2. Start HTTP server:
    let app = router(node);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Node {} stopped", config.node_id);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
