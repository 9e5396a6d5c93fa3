//! `execpool` command line: serve the execution API, run a file through the
//! pool, inspect the audit log, or check node health.

use anyhow::Result;
use clap::{Parser, Subcommand};
use execpool_core::config::ConfigLoader;
use execpool_core::pool::{probe_pool, HttpNodeTransport};
use execpool_core::{AuditLogStore, Dispatcher, ExecPoolConfig, ExecutionRequest};
use execpool_server::{build_router, serve_with_shutdown, AppState};
use log::LevelFilter;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Execpool - dispatch code snippets to an executor pool")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "YAML configuration file (defaults plus environment when omitted)")]
    config: Option<PathBuf>,

    #[clap(long, default_value = "127.0.0.1:8000")]
    bind_addr: String,

    #[clap(long, short, help = "Log level, overriding the configured one")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the execution API (default command)
    Serve {
        #[clap(long)]
        bind_addr: Option<String>,
    },
    /// Execute a source file through the pool and print its output
    Run {
        file: PathBuf,

        #[clap(long, help = "Timeout in seconds")]
        timeout: Option<u64>,
    },
    /// Print the audit log as JSON
    Logs,
    /// Probe every executor node
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::from_file(path).await?,
        None => ConfigLoader::from_env()?,
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level_filter = level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    match cli.command {
        Some(Commands::Serve { bind_addr }) => {
            run_server(config, bind_addr.unwrap_or(cli.bind_addr)).await
        }
        Some(Commands::Run { file, timeout }) => run_file(config, file, timeout).await,
        Some(Commands::Logs) => print_logs(&config).await,
        Some(Commands::Health) => print_health(&config).await,
        None => run_server(config, cli.bind_addr).await,
    }
}

async fn open_engine(config: ExecPoolConfig) -> Result<(Arc<Dispatcher>, AuditLogStore)> {
    let audit = AuditLogStore::connect(&config.audit.database_url).await?;
    log::info!(
        "Dispatching to {} executor node(s) via {}",
        config.pool.pool_size,
        config.pool.node_url_template
    );
    let dispatcher = Dispatcher::new(Arc::new(config)).with_audit_log(audit.clone());
    Ok((Arc::new(dispatcher), audit))
}

async fn run_server(config: ExecPoolConfig, bind_addr: String) -> Result<()> {
    let bind_socket_addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", bind_addr, e))?;

    let (dispatcher, audit) = open_engine(config).await?;
    let router = build_router(AppState::new(dispatcher, audit.clone()));

    serve_with_shutdown(router, bind_socket_addr, shutdown_signal()).await?;
    audit.close().await;
    Ok(())
}

async fn run_file(config: ExecPoolConfig, file: PathBuf, timeout: Option<u64>) -> Result<()> {
    let code = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let timeout = timeout.unwrap_or(config.execution.default_timeout_secs);

    let (dispatcher, audit) = open_engine(config).await?;
    let report = dispatcher.dispatch(ExecutionRequest::new(code, timeout)).await;
    log::info!(
        "Execution {} served by {:?} after {} remote attempt(s)",
        report.execution_id,
        report.served_by,
        report.attempts.len()
    );
    print!("{}", report.output);
    audit.close().await;
    Ok(())
}

async fn print_logs(config: &ExecPoolConfig) -> Result<()> {
    let audit = AuditLogStore::connect(&config.audit.database_url).await?;
    let logs = audit.list_all().await?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "logs": logs }))?);
    audit.close().await;
    Ok(())
}

async fn print_health(config: &ExecPoolConfig) -> Result<()> {
    let transport = HttpNodeTransport::from_config(&config.pool);
    let report = probe_pool(&transport, config.pool.pool_size).await;
    let healthy = report.iter().filter(|n| n.healthy).count();
    println!("{}", serde_json::to_string_pretty(&report)?);
    log::info!("{}/{} executor node(s) healthy", healthy, report.len());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Received Ctrl+C, shutting down...");
}
