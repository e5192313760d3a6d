//! DevLink host diagnostic tool: entry point.
//!
//! The full host runs the protocol inside a GUI; this binary exposes the same
//! library code from a terminal so a link can be debugged without one.
//!
//! # Usage
//!
//! ```text
//! devlink-host [--config <PATH>] <COMMAND>
//!
//! Commands:
//!   replay <CAPTURE>                 Decode a raw byte capture and log every packet
//!   hash <FILE>                      Print the MD5 content hash of a file
//!   cache path                       Print the cache directory
//!   cache clear                      Delete every cached device file
//!   cache check <NAME> <LEN> <HASH>  Report whether a cached file is current
//!   encode identify|heartbeat        Print a framed request as hex
//!   telemetry [--schema <PATH>] <DATAGRAM>
//!                                    Route one simulator DATA datagram
//! ```
//!
//! # Logging
//!
//! `RUST_LOG` wins when set (e.g. `RUST_LOG=devlink_core=debug`); otherwise
//! the `[host] log_level` from the config file applies.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use devlink_core::protocol::messages::HostHeartbeat;
use devlink_core::{FileHash, Packet};
use devlink_host::application::link::{DeviceLink, LinkConfig};
use devlink_host::application::telemetry::TelemetryRouter;
use devlink_host::infrastructure::storage::cache::DeviceFileCache;
use devlink_host::infrastructure::storage::config::{self, HostConfig};
use devlink_host::infrastructure::storage::schema::load_schema;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// DevLink host diagnostics.
#[derive(Debug, Parser)]
#[command(
    name = "devlink-host",
    about = "Diagnostic tool for the DevLink host-device protocol",
    version
)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "DEVLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a raw byte capture of a device link and log every packet.
    Replay {
        capture: PathBuf,
        /// Bytes fed to the decoder per read, to mimic a transport.
        #[arg(long, default_value_t = 64)]
        chunk: usize,
    },
    /// Print the MD5 content hash of a file.
    Hash { file: PathBuf },
    /// Inspect or clear the device file cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print a framed request packet as hex.
    Encode {
        #[command(subcommand)]
        packet: EncodeKind,
    },
    /// Route one simulator DATA datagram through the conversion table.
    Telemetry {
        /// Schema file; defaults to `[telemetry] schema` from the config.
        #[arg(long)]
        schema: Option<PathBuf>,
        datagram: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// Print the cache directory.
    Path,
    /// Delete every cached device file.
    Clear,
    /// Report whether the cached copy of a file matches the given length and hash.
    Check {
        name: String,
        length: u64,
        /// 32 hex digits.
        hash: String,
    },
}

#[derive(Debug, Subcommand)]
enum EncodeKind {
    /// IDENTIFY request carrying this host's name and address.
    Identify,
    /// HEARTBEAT request carrying the current UTC time.
    Heartbeat,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .context("failed to load configuration")?;

    // `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.host.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Replay { capture, chunk } => replay(&config, &capture, chunk),
        Command::Hash { file } => {
            let hash = FileHash::compute_file(&file)
                .with_context(|| format!("failed to hash {}", file.display()))?;
            println!("{hash}  {}", file.display());
            Ok(())
        }
        Command::Cache { action } => run_cache(&config, action).await,
        Command::Encode { packet } => encode(&config, packet),
        Command::Telemetry { schema, datagram } => telemetry(&config, schema, &datagram),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn replay(config: &HostConfig, capture: &Path, chunk: usize) -> anyhow::Result<()> {
    if chunk == 0 {
        bail!("--chunk must be at least 1");
    }
    let bytes =
        std::fs::read(capture).with_context(|| format!("failed to read {}", capture.display()))?;
    let mut link = DeviceLink::new(LinkConfig::from(&config.link));
    info!(capture = %capture.display(), bytes = bytes.len(), "replaying capture");

    let (mut good, mut bad) = (0usize, 0usize);
    for piece in bytes.chunks(chunk) {
        for result in link.receive(piece) {
            match result {
                Ok(decoded) => {
                    good += 1;
                    info!(
                        counter = decoded.envelope.counter,
                        packet_type = %decoded.envelope.packet_type,
                        "{:?}",
                        decoded.packet
                    );
                }
                Err(e) => {
                    bad += 1;
                    warn!(error = %e, "undecodable frame");
                }
            }
        }
    }

    println!("{good} packets decoded, {bad} frames rejected");
    Ok(())
}

async fn run_cache(config: &HostConfig, action: CacheAction) -> anyhow::Result<()> {
    let cache = DeviceFileCache::from_config(config).context("no data directory available")?;
    match action {
        CacheAction::Path => println!("{}", cache.cache_dir().display()),
        CacheAction::Clear => {
            cache.clear_cache();
            info!(dir = %cache.cache_dir().display(), "cache cleared");
        }
        CacheAction::Check { name, length, hash } => {
            let hash: FileHash = hash.parse().context("invalid hash")?;
            let current = cache.is_file_exists_async(name.clone(), length, hash).await;
            println!("{name}: {}", if current { "current" } else { "stale or missing" });
        }
    }
    Ok(())
}

fn encode(config: &HostConfig, kind: EncodeKind) -> anyhow::Result<()> {
    let packet = match kind {
        EncodeKind::Identify => Packet::IdentifyRequest(
            config
                .identity()
                .context("host name does not fit the identity field")?,
        ),
        EncodeKind::Heartbeat => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .context("system clock is before 1970")?;
            Packet::HeartbeatRequest(HostHeartbeat::from_unix_secs(now.as_secs()))
        }
    };

    let link = DeviceLink::new(LinkConfig::from(&config.link));
    let wire = link.send(&packet)?;
    println!("{}", hex::encode_upper(&wire));
    Ok(())
}

fn telemetry(
    config: &HostConfig,
    schema: Option<PathBuf>,
    datagram: &Path,
) -> anyhow::Result<()> {
    let Some(schema_path) = schema.or_else(|| config.telemetry.schema.clone()) else {
        bail!("no schema given: pass --schema or set [telemetry] schema in the config");
    };
    let schema = load_schema(&schema_path)?;
    let bytes = std::fs::read(datagram)
        .with_context(|| format!("failed to read {}", datagram.display()))?;

    let router = TelemetryRouter::from_schema(&schema);
    let mut store = BTreeMap::new();
    let routed = router.route_datagram(&bytes, &mut store)?;
    info!(routed, bound = router.table().bound_count(), "datagram routed");

    for ((class_index, member_index), value) in &store {
        let name = schema
            .qualified_name(*class_index, *member_index)
            .unwrap_or_else(|| format!("#{class_index}.{member_index}"));
        println!("{name} = {value}");
    }
    Ok(())
}
