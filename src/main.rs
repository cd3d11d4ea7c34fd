use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;

use herald_bot::application::errors::{BotError, FatalSignal};
use herald_bot::application::messaging::EventDispatcher;
use herald_bot::domain::traits::Platform;
use herald_bot::infrastructure::adapters::ConsoleAdapter;
use herald_bot::infrastructure::config::Config;
use herald_bot::plugins::builtin::BuiltinCommands;
use herald_bot::plugins::manifest::manifest;
use herald_bot::plugins::PluginRegistry;

#[derive(Parser)]
#[command(name = "herald-bot")]
#[command(about = "Plugin command router for chat communities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config) {
                tracing::error!("herald-bot stopped: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("herald-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            if let Err(e) = init_config() {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_bot(config_path: &str) -> Result<(), BotError> {
    // Load config
    let config = if std::path::Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };
    config.validate()?;

    tracing::info!("Starting herald-bot: {}", config.bot.name);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("failed to start runtime: {}", e)))?;
    rt.block_on(run_console_bot(config))
}

async fn run_console_bot(config: Config) -> Result<(), BotError> {
    let console = match &config.adapters.console {
        Some(console) if console.enabled => console.clone(),
        _ => {
            return Err(BotError::Internal(
                "no platform adapter enabled in config".to_string(),
            ))
        }
    };

    let adapter = Arc::new(
        ConsoleAdapter::new(console.operator_id, config.control_channel.clone()).with_echo(true),
    );
    let (fatal, fatal_rx) = FatalSignal::channel();

    let registry = Arc::new(PluginRegistry::new(&config, adapter.clone(), fatal)?);
    registry.permissions().check_control_channel().await?;
    for plugin in manifest() {
        registry.load(plugin)?;
    }
    registry
        .add_builtin(Arc::new(BuiltinCommands::new(registry.lang().clone())))
        .await?;
    registry.initiate_all().await?;
    tracing::info!("Plugin system initialized with {} plugins", registry.names().len());

    let (tx, rx) = mpsc::channel(64);
    let transport = {
        let adapter = adapter.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.start(tx).await {
                tracing::error!("Console adapter failed: {}", e);
            }
        })
    };

    println!(
        "herald-bot console. You are {} in #{}; try {}help",
        adapter.operator_id(),
        adapter.home_channel(),
        config.bot.prefix
    );

    let result = EventDispatcher::new(registry.clone()).run(rx, fatal_rx).await;
    transport.abort();
    registry.flush().await?;
    result
}

fn init_config() -> Result<(), BotError> {
    let yaml = Config::default().to_yaml()?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
