//! L1 synchronization binary

use clap::Parser;
use rollup_node::{L1SyncNode, L1SyncNodeArgs};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing_subscriber();

    let args = L1SyncNodeArgs::parse();
    let cancel = CancellationToken::new();
    let node = L1SyncNode::from_args(&args, cancel.clone())?;

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: "scroll::node", "received ctrl-c, shutting down");
            }
            cancel.cancel();
        }
    });

    node.run(args.sync_args.start_block).await
}

/// Initialize the tracing subscriber, logging to the console with the level set by `RUST_LOG`,
/// `info` by default.
fn init_tracing_subscriber() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
