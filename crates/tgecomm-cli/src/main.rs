//! TGecomm CLI - main entry point

use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tgecomm_cli::{app, cli::Cli, config, error::Result, ui};
use tgecomm_core::{ClientConfig, MetricsCollector};
use tgecomm_runtime::{ConsolePrompt, LoopbackTransport, SessionBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.debug);

    // Load and validate configuration
    let config = match load_and_validate(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            eprintln!("\n✗ Configuration error: {:#}", e);
            eprintln!("\nPlease check your .env file and ensure all values are correct.");
            std::process::exit(1);
        }
    };
    info!("Configuration loaded: {:?}", config.masked());

    ui::print_header(&mut io::stdout())?;

    let metrics = Arc::new(MetricsCollector::with_error_capacity(
        config.session.error_log_capacity,
    ));
    let session = SessionBuilder::new(Arc::new(LoopbackTransport::default()))
        .with_config(config)
        .with_metrics(metrics)
        .with_prompt(Arc::new(ConsolePrompt::default()))
        .on_message(|view| {
            if let Err(e) = ui::print_inbound(&mut io::stdout(), &view) {
                error!("Error displaying new message: {}", e);
            }
        })
        .build()?;
    let session = Arc::new(session);

    let account = match session.start().await {
        Ok(account) => account,
        Err(e) => {
            error!("Failed to start client: {}", e);
            eprintln!("\n✗ Error: {}", e);
            std::process::exit(1);
        }
    };
    ui::print_success(
        &mut io::stdout(),
        &format!("Logged in as: {} ({})", account.first_name, account.handle()),
    )?;

    let outcome = app::run_interactive(session.clone()).await;

    if let Err(e) = session.disconnect().await {
        error!("Error disconnecting: {}", e);
    }

    match outcome {
        Ok(exit) => {
            info!("TGecomm exited: {:?}", exit);
            Ok(())
        }
        Err(e) => {
            error!("Session ended with error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Setup logging based on the debug flag, `RUST_LOG` takes precedence
fn setup_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    if debug {
        tracing::debug!("Debug mode enabled");
    }
}

/// Load configuration from file, .env and environment, then validate it
fn load_and_validate(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let config = config::load_configuration(cli.config.as_deref(), &cli.env)
        .with_context(|| format!("loading configuration (env file {})", cli.env.display()))?;
    config.validate()?;
    Ok(config)
}
