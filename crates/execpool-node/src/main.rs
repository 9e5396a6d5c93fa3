//! Executor node binary.

use clap::Parser;
use execpool_node::{shutdown_signal, NodeConfig, NodeServer};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a code executor node")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Identifier reported by /health (defaults to $EXECUTOR_ID)
    #[arg(long)]
    executor_id: Option<String>,

    /// Interpreter used to run submitted code
    #[arg(long, default_value = "python3")]
    python: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let mut config = NodeConfig::new()
        .with_bind_addr(args.bind)
        .with_python_bin(args.python);
    if let Some(executor_id) = args.executor_id {
        config = config.with_executor_id(executor_id);
    }

    NodeServer::new(config)
        .serve_with_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
