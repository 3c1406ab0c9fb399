use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use blocklist_import::config::Config;
use blocklist_import::format::ListType;
use blocklist_import::init::{build_components, setup_logging};
use blocklist_import::staleness::FetchMode;
use blocklist_import::ImportOutcome;

const DEFAULT_CONFIG_PATH: &str = "blocklist-import.toml";

#[derive(Debug, PartialEq)]
enum Command {
    Run,
    Force,
    Configure {
        url: String,
        load_after_days: i64,
        list_type: ListType,
    },
}

/// Splits `[config.toml] [command ...]`. A leading command word means the
/// config path was left out.
fn parse_args(args: &[String]) -> Result<(String, Command)> {
    match args.first().map(String::as_str) {
        None | Some("force") | Some("configure") => {
            Ok((DEFAULT_CONFIG_PATH.to_string(), parse_command(args)?))
        }
        Some(path) => Ok((path.to_string(), parse_command(&args[1..])?)),
    }
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None => Ok(Command::Run),
        Some("force") => Ok(Command::Force),
        Some("configure") => {
            let [url, days, list_type] = &args[1..] else {
                bail!("usage: configure <url> <load_after_days> <listtype>");
            };
            Ok(Command::Configure {
                url: url.clone(),
                load_after_days: days.parse().context("load_after_days must be an integer")?,
                list_type: list_type.parse()?,
            })
        }
        Some(other) => bail!("unknown command '{}'", other),
    }
}

fn report(outcome: &ImportOutcome) {
    match outcome {
        ImportOutcome::Completed { imported, fetched } => {
            info!("Imported {} ranges (downloaded: {})", imported, fetched)
        }
        ImportOutcome::Cancelled { applied } => {
            info!("Import cancelled after {} ranges", applied)
        }
        ImportOutcome::Failed(e) => error!("Import failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command) = parse_args(&args)?;

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting blocklist-import...");

    if !std::path::Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    // 3. Build Orchestrator
    let components = build_components(&config)?;
    let orchestrator = components.orchestrator.clone();

    // 4. Ctrl-C cancels the import in flight and stops the daemon
    let shutdown = orchestrator.shutdown_token();
    {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received.");
                orchestrator.shutdown();
            }
        });
    }

    // 5. Initial Import
    match command {
        Command::Configure {
            url,
            load_after_days,
            list_type,
        } => {
            let outcome = orchestrator
                .reconfigure(&url, load_after_days, list_type)
                .await?;
            report(&outcome);
            return Ok(());
        }
        Command::Force => report(&orchestrator.import(FetchMode::Force).await),
        Command::Run => {
            if let Some(outcome) = orchestrator.import_on_start().await {
                report(&outcome);
            }
        }
    }
    info!(
        "{} ({} merged ranges live)",
        orchestrator.status_line(),
        components.filter.live().len()
    );
    if shutdown.is_cancelled() {
        return Ok(());
    }

    // 6. Periodic Staleness Check
    let check_interval = Duration::from_secs(config.updates.check_interval_hours.max(1) * 3600);
    let mut interval = tokio::time::interval(check_interval);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !orchestrator.is_configured() {
                    continue;
                }
                info!("Scheduled blocklist check...");
                report(&orchestrator.import(FetchMode::UseCacheIfFresh).await);
                info!("{}", orchestrator.status_line());
            }
            _ = shutdown.cancelled() => break,
        }
    }

    Ok(())
}
