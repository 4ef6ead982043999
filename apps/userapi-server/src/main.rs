use anyhow::{Context, Result};
use api_ingress::{ApiIngress, ApiIngressConfig, Router};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use users_info::{config::UsersInfoConfig, UsersInfo};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// UserAPI Server - CRUD over users persisted in a JSON document
#[derive(Parser)]
#[command(name = "userapi-server")]
#[command(about = "UserAPI Server - CRUD over users persisted in a JSON document")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, &config.home_dir());
    tracing::info!("UserAPI Server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules...");
    let home_dir = config.home_dir();

    let users_cfg: UsersInfoConfig = config.module_config(UsersInfo::NAME)?;
    let users = UsersInfo::init(&users_cfg, &home_dir).await?;

    let ingress = ApiIngress::new(ingress_config(&config)?);
    let addr = ingress.bind_addr(&config.server.host, config.server.port)?;

    let router = ingress.build_router(users.register_rest(Router::new()));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = runtime::shutdown::wait_for_shutdown().await {
            tracing::warn!("shutdown signal listener failed: {e:#}");
        }
        signal_cancel.cancel();
    });

    ingress
        .serve(addr, router, cancel)
        .await
        .context("HTTP server failed")?;

    tracing::info!("UserAPI Server stopped");
    Ok(())
}

/// `server.timeout_sec`, when set, takes precedence over the ingress default.
fn ingress_config(config: &AppConfig) -> Result<ApiIngressConfig> {
    let mut ingress_cfg: ApiIngressConfig = config.module_config(ApiIngress::NAME)?;
    if config.server.timeout_sec > 0 {
        ingress_cfg.request_timeout_secs = config.server.timeout_sec;
    }
    Ok(ingress_cfg)
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    let users_cfg: UsersInfoConfig = config.module_config(UsersInfo::NAME)?;
    let addr = ApiIngress::new(ingress_config(&config)?)
        .bind_addr(&config.server.host, config.server.port)?;

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Bind address: {addr}");
    println!("Users storage: {}", users_cfg.storage_path);
    println!("{}", config.to_yaml()?);

    Ok(())
}
