//! NoxDrive Daemon
//!
//! Serves the allowed roots over HTTP and builds the index snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use daemon::config::{default_config_path, Config};
use daemon::files::{IgnoreList, IndexBuilder, PathSandbox};
use daemon::logging::init_logging;
use daemon::{hash_password, DriveServer};
use tokio_util::sync::CancellationToken;

/// NoxDrive - sandboxed folder browsing and streaming ZIP downloads.
#[derive(Parser, Debug)]
#[command(name = "noxdrive")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server until SIGINT or SIGTERM
    Serve {
        /// Listen address, overriding the configuration
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Build the index snapshot of every allowed root
    Index {
        /// Output file, overriding the configuration
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the SHA-256 digest to use as auth.password_sha256
    HashPassword {
        /// Password to hash
        password: String,
    },

    /// Print the effective configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Needs no configuration at all.
    if let Commands::HashPassword { password } = &cli.command {
        println!("{}", hash_password(password));
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if let Commands::Config { init: true } = cli.command {
        if config_path.exists() {
            eprintln!("Config file already exists: {}", config_path.display());
            std::process::exit(1);
        }
        Config::default().save(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();

    if let Commands::Serve { bind: Some(addr) } = &cli.command {
        config.server.bind_addr = addr.clone();
    }

    // Validate configuration
    config.validate()?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let _log_guard = init_logging(level, config.server.log_dir())?;

    tracing::debug!("Using config file: {:?}", config_path);

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("NoxDrive starting (root: {:?})", config.storage.root);
            run_server(&config).await?;
        }
        Commands::Index { output } => {
            let path = output.unwrap_or_else(|| config.storage.index_path());
            let builder = IndexBuilder::new(
                Arc::new(PathSandbox::from_config(&config.storage)),
                Arc::new(IgnoreList::new(config.storage.ignored_names.iter().cloned())),
            );

            match builder.build_and_write_async(path.clone()).await {
                Ok(snapshot) => {
                    println!(
                        "Indexed {} entries across {} roots into {}",
                        snapshot.node_count(),
                        snapshot.roots.len(),
                        path.display()
                    );
                }
                Err(e) => {
                    tracing::error!("Index build failed: {:#}", e);
                    eprintln!("Failed to build index: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Config { .. } => {
            print!("{}", config.to_toml()?);
        }
        Commands::HashPassword { .. } => unreachable!("handled before configuration is loaded"),
    }

    Ok(())
}

/// Run the server until a shutdown signal arrives.
async fn run_server(config: &Config) -> anyhow::Result<()> {
    let server = DriveServer::bind(config).await?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::error!("Failed to listen for shutdown signals: {}", e),
        }
        signal_token.cancel();
    });

    server.run(shutdown).await
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }

    Ok(())
}
