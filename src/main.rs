use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderName;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::signal;

use mcdash_tail::{LevelFilter, StreamUnit, SubscriptionRegistry, subscribe};
use mcdash_types::RecordBuffer;
use mcdash_web::{AppState, ContainerRestarter, build_router};

mod config;

use config::Config;

/// mcdash - A web dashboard for operating a Minecraft server
#[derive(Parser, Debug)]
#[command(name = "mcdash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.mcdash/config.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the dashboard API
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,

        /// Log file to stream
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },

    /// Follow the log in this terminal
    Tail {
        /// INFO, WARN, ERROR or ALL
        #[arg(long, default_value = "ALL")]
        level: LevelFilter,

        /// Log file to follow
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// On exit, write the retained lines to PATH
        /// (minecraft_logs_<date>.log when no PATH is given)
        #[arg(long, value_name = "PATH")]
        export: Option<Option<PathBuf>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                config
                    .log_level
                    .parse()
                    .with_context(|| format!("invalid log_level '{}'", config.log_level))?,
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve { bind, log_file } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(log_file) = log_file {
                config.log_file = log_file;
            }
            serve(config).await
        }
        Commands::Tail {
            level,
            log_file,
            export,
        } => {
            if let Some(log_file) = log_file {
                config.log_file = log_file;
            }
            tail(config, level, export).await
        }
    };

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn serve(config: Config) -> Result<()> {
    let registry = Arc::new(SubscriptionRegistry::new(config.max_subscriptions));
    let identity_header = HeaderName::try_from(config.identity_header.as_str())
        .with_context(|| format!("invalid identity_header '{}'", config.identity_header))?;
    let restarter = Arc::new(ContainerRestarter::new(
        &config.container_runtime,
        &config.container,
    ));

    let allow_list = config.allow_list();
    if allow_list.is_empty() {
        tracing::warn!("no authorized emails configured, every request will be rejected");
    }

    let state = AppState::new(
        Arc::clone(&registry),
        config.tail_config(),
        allow_list,
        restarter,
    )
    .with_identity_header(identity_header);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        log_file = %config.log_file.display(),
        container = %config.container,
        "dashboard listening"
    );

    let shutdown_registry = Arc::clone(&registry);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            // Live streams never end on their own
            let closed = shutdown_registry.unregister_all();
            tracing::info!(closed, "shutting down, closed live log streams");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn tail(config: Config, level: LevelFilter, export: Option<Option<PathBuf>>) -> Result<()> {
    let registry = Arc::new(SubscriptionRegistry::new(1));
    let mut subscription = subscribe(&registry, "cli", level, &config.tail_config())
        .context("failed to start tailing")?;
    let buffer = RecordBuffer::default();

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            unit = subscription.next() => match unit {
                Some(StreamUnit::Record(record)) => {
                    // Retained in wire form, as the dashboard client receives it
                    if buffer.push_payload(&record.payload()) {
                        if record.is_system() {
                            eprintln!("-- {}", record.text);
                        } else {
                            println!("{}", record.text);
                        }
                    }
                }
                Some(StreamUnit::Heartbeat) => {}
                None => break,
            },
        }
    }
    subscription.close();

    let counts = buffer.counts();
    eprintln!(
        "Retained {} records ({} INFO, {} WARN, {} ERROR, {} SYSTEM, {} UNKNOWN)",
        counts.total(),
        counts.info,
        counts.warn,
        counts.error,
        counts.system,
        counts.unknown
    );

    if let Some(target) = export {
        let path = target.unwrap_or_else(default_export_path);
        tokio::fs::write(&path, buffer.export_raw())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Exported {} lines to {}", buffer.len(), path.display());
    }

    Ok(())
}

fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "minecraft_logs_{}.log",
        chrono::Local::now().format("%Y-%m-%d")
    ))
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
