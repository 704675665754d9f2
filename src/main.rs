use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use memory_injection::config::{validate_config, Config, ConfigLoader};
use memory_injection::memory::OffsetChain;
use memory_injection::offsets::{reconcile, OffsetFile, OffsetSource};
use memory_injection::process::simulated::DEFAULT_BASE;
use memory_injection::process::{
    native_locator, ProcessLocator, SimulatedProcess, SimulatedSystem,
};
use memory_injection::InjectionService;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = ConfigLoader::new(&config_path)
        .load_or_default()
        .with_context(|| format!("loading {config_path}"))?;
    validate_config(&config)?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting memory-injection v{}", env!("CARGO_PKG_VERSION"));

    let offsets = load_offsets(&config);
    let locator = native_locator().unwrap_or_else(|| demo_locator(&config.process.name));

    let service =
        InjectionService::new(locator, config.process.selector(), config.service.clone())?;

    tokio::select! {
        result = service.initialize() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted while waiting for the target process");
            service.shutdown().await;
            return Ok(());
        }
    }
    service.start()?;

    if let Some(offsets) = &offsets {
        report_offsets(&service, offsets);
    }
    if let Some(path) = service.game_path() {
        info!("Game path: {}", path.display());
    }

    info!("Ready. Press Ctrl+C to shutdown.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    service.shutdown().await;
    Ok(())
}

fn load_offsets(config: &Config) -> Option<OffsetFile> {
    let local = OffsetFile::load_optional(&config.offsets.local);
    let update = config.offsets.update.as_ref().and_then(OffsetFile::load_optional);

    match reconcile(local, update) {
        Ok(offsets) => Some(offsets),
        Err(e) => {
            warn!("Running without offsets: {}", e);
            None
        }
    }
}

/// Logs where every named base offset currently points
fn report_offsets(service: &InjectionService, offsets: &OffsetFile) {
    for name in offsets.names() {
        let requests: Vec<Vec<OffsetChain>> = match offsets
            .lookup_offset(name)
            .and_then(|values| OffsetChain::instances(&values))
        {
            Ok(chains) => chains.into_iter().map(|chain| vec![chain]).collect(),
            Err(e) => {
                warn!("Skipping offset {}: {}", name, e);
                continue;
            }
        };

        match service.get_addresses(&requests) {
            Ok(addresses) => {
                for address in addresses {
                    match address {
                        Ok(address) => info!("{} -> {}", name, address),
                        Err(e) => warn!("{}: {}", name, e),
                    }
                }
            }
            Err(e) => warn!("Cannot resolve {}: {}", name, e),
        }
    }
}

/// A simulated target for platforms without a native backend
fn demo_locator(name: &str) -> Arc<dyn ProcessLocator> {
    warn!("No native process backend on this platform, using a simulated process");

    let process = SimulatedProcess::new(std::process::id(), format!("{name}.exe"));
    process.map(DEFAULT_BASE, 0x10_0000);
    info!(pid = process.info().pid, base = %DEFAULT_BASE, "Simulated target ready");

    let system = SimulatedSystem::new();
    system.spawn(process);
    Arc::new(system)
}
