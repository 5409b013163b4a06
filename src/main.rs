//! # offload
//!
//! Demo binary: a counter virtual object whose state is written to disk
//! after it goes idle and loaded back on the next call.
//!
//! ```text
//! offload demo --key a --expiry-ms 500
//! offload config --config offload.toml
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;
mod config;
mod counter;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use offload_core::ResultExt;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use offload_runtime::archiving::ArchiveLayer;
use offload_runtime::storage::FileBlobStore;
use offload_runtime::virtual_objects::{ObjectHost, ObjectId};

use crate::cli::{Cli, Commands, Overrides};
use crate::config::AppConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.overrides)?;

    match cli.command {
        Commands::Demo { key } => run_demo(&config, &key).await,
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(overrides: &Overrides) -> Result<AppConfig> {
    let base = match &overrides.config {
        Some(path) => AppConfig::from_file(path)
            .log_error("Failed to load configuration")
            .with_context(|| format!("Could not load {}", path.display()))?,
        None => AppConfig::default(),
    };

    let config = base.with_overrides(
        overrides.expiry_ms,
        overrides.check_ms,
        overrides.dir.clone(),
    );
    config
        .validate()
        .log_error("Configuration rejected")
        .context("Invalid configuration")?;
    Ok(config)
}

fn build_host(config: &AppConfig) -> Result<ObjectHost> {
    let store = Arc::new(FileBlobStore::new(config.store.dir.clone()));
    let layer = ArchiveLayer::builder(config.archive)
        .store(store)
        .build()
        .context("Failed to build archiving layer")?;

    let definition = layer
        .wrap(counter::definition().context("Invalid counter definition")?)
        .context("Failed to wrap counter")?;

    ObjectHost::builder()
        .config(config.host.clone())
        .bind(definition)
        .build()
        .context("Failed to build object host")
}

async fn run_demo(config: &AppConfig, key: &str) -> Result<()> {
    let host = build_host(config)?;
    let executor = host.start();
    let id = ObjectId::new(counter::SERVICE, key);

    info!(
        object = %id,
        expiry_ms = config.archive.expiry_ms,
        dir = %config.store.dir.display(),
        "Demo starting"
    );

    for handler in ["inc", "inc", "dec"] {
        let output = host
            .invoke(&id, handler, Value::Null)
            .await
            .with_context(|| format!("{handler} failed"))?;
        info!(object = %id, handler, %output, "Handler returned");
    }

    let horizon = config.eviction_horizon().saturating_mul(2);
    let Some(pointer) = wait_for_offload(&host, &id, horizon).await else {
        host.shutdown().await;
        bail!("state of {id} was not offloaded within {horizon:?}");
    };
    info!(object = %id, %pointer, "State offloaded");

    let count = host
        .invoke(&id, "count", Value::Null)
        .await
        .context("count failed")?;
    info!(object = %id, %count, "Shared read after reload");

    match host.inspect(&id).await {
        Some(entry) if !entry.is_offloaded() => {
            info!(object = %id, keys = ?entry.domain_keys(), "State is resident again");
        }
        _ => warn!(object = %id, "State still offloaded after read"),
    }

    host.shutdown().await;
    executor.abort();
    Ok(())
}

async fn wait_for_offload(host: &ObjectHost, id: &ObjectId, within: Duration) -> Option<String> {
    let poll = async {
        loop {
            if let Some(pointer) = host
                .inspect(id)
                .await
                .and_then(|entry| entry.tier().pointer().map(ToString::to_string))
            {
                return pointer;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(within, poll).await.ok()
}
