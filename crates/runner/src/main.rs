//! asset-bridge: run a guest module with the asset bridge wired in.

use anyhow::Context;
use asset_bridge_host::config::BridgeConfig;
use asset_bridge_host::prelude::*;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "asset-bridge.toml";

#[derive(Parser, Debug)]
#[command(name = "asset-bridge", version, about)]
struct Cli {
    /// config file, `asset-bridge.toml` in the working directory is used if present
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// override the asset index path from the config
    #[arg(long)]
    index: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// instantiate a guest and call one of its exports
    Run {
        /// guest module, binary wasm or wat
        wasm: PathBuf,
        /// export to call once the guest is wired up
        #[arg(long, default_value = "run")]
        entry: String,
    },
    /// load the asset index into an in-process arena and list it
    Index,
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if PathBuf::from(DEFAULT_CONFIG_FILE).exists() => {
            BridgeConfig::from_file(DEFAULT_CONFIG_FILE)?
        }
        None => BridgeConfig::default(),
    };
    if let Some(index) = &cli.index {
        config.index_path = index.clone();
    }
    Ok(config)
}

fn run(bridge: Bridge<Source>, runtime: &Runtime, wasm: PathBuf, entry: &str) -> anyhow::Result<()> {
    let bytes = std::fs::read(&wasm).with_context(|| format!("reading {}", wasm.display()))?;
    let mut instance = GuestInstance::new(&bytes, Arc::new(bridge), runtime.handle().clone())?;
    tracing::info!(wasm = %wasm.display(), entry, "calling guest");
    let results = instance.call(entry, &[])?;
    for value in results.iter() {
        println!("{:?}", value);
    }
    Ok(())
}

fn index(bridge: Bridge<Source>, runtime: &Runtime, config: &BridgeConfig) -> anyhow::Result<()> {
    let mut arena = Arena::with_capacity(config.arena.capacity);
    let handle = runtime.block_on(bridge.load_index(&mut arena))?;
    let bytes = arena
        .slice(handle)
        .context("index handle outside the arena")?;
    let manifest = AssetManifest::from_slice(bytes).context("index is not an asset list")?;
    for asset in manifest.assets() {
        match &asset.entity_id {
            Some(entity_id) => println!("{:?}\t{}\t{}", asset.kind, asset.path, entity_id),
            None => println!("{:?}\t{}", asset.kind, asset.path),
        }
    }
    tracing::info!(
        assets = manifest.assets().len(),
        bytes = handle.length(),
        "index loaded"
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let source = Source::from_config(&config.source)?;
    let bridge = Bridge::from_config(source, &config);
    let runtime = Runtime::new()?;

    match cli.command {
        Command::Run { wasm, entry } => run(bridge, &runtime, wasm, &entry),
        Command::Index => index(bridge, &runtime, &config),
    }
}
