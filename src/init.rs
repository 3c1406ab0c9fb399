//! Initialization helpers for the application startup.

use crate::config::{Config, FileConfigStore};
use crate::fetch::HttpFetcher;
use crate::filter::RangeFilter;
use crate::orchestrator::ImportOrchestrator;
use crate::progress::TracingProgress;
use crate::workload::WorkloadRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // HTTP client internals are noise unless explicitly asked for
        for noisy in ["hyper", "hyper_util", "reqwest", "rustls"] {
            if !filter.contains(noisy) {
                filter.push_str(&format!(",{}=warn", noisy));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Everything the daemon needs to run imports.
pub struct Components {
    pub orchestrator: Arc<ImportOrchestrator>,
    pub filter: Arc<RangeFilter>,
}

/// Wires the file-backed config store, HTTP fetcher, in-memory filter and
/// workload registry into an orchestrator.
pub fn build_components(config: &Config) -> Result<Components> {
    let store = FileConfigStore::open(config.store_path())
        .with_context(|| format!("Failed to load {}", config.store_path().display()))?;
    let fetcher = HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?;

    let filter = Arc::new(RangeFilter::new());
    let workloads = Arc::new(WorkloadRegistry::new());
    for id in &config.workloads {
        workloads.register(*id, false);
    }
    info!(
        "Registered {} workloads, cache at {}",
        config.workloads.len(),
        config.cache_path().display()
    );

    let orchestrator = Arc::new(ImportOrchestrator::new(
        filter.clone(),
        workloads,
        Arc::new(store),
        Arc::new(TracingProgress),
        Arc::new(fetcher),
        config.cache_path(),
        config.import.clone(),
    ));

    Ok(Components {
        orchestrator,
        filter,
    })
}
