//! durastore CLI
//!
//! Command-line access to a journal-backed store directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use durastore::network::FeedSubscriber;
use durastore::notify::{ChangeBus, EventKind};
use durastore::{Config, ExportBundle, GetOptions, Result, SetOptions, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// durastore CLI
#[derive(Parser, Debug)]
#[command(name = "durastore-cli")]
#[command(about = "Inspect and maintain a durastore data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./durastore_data")]
    data_dir: PathBuf,

    /// Primary capacity in KB
    #[arg(short, long, default_value = "5120")]
    capacity_kb: usize,

    /// Run without the SQLite overflow store
    #[arg(long)]
    no_secondary: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,

        /// Skip schema validation
        #[arg(long)]
        raw: bool,
    },

    /// Set a key to a JSON value
    Set {
        /// The key to set
        key: String,

        /// The value, as JSON
        value: String,

        /// Do not snapshot this write
        #[arg(long)]
        no_backup: bool,
    },

    /// Remove a key (its snapshots are kept)
    Rm {
        /// The key to remove
        key: String,
    },

    /// Remove every key in the namespace
    Clear,

    /// Export the namespace as a bundle (stdout if no file)
    Export {
        file: Option<PathBuf>,
    },

    /// Replace the namespace with a bundle
    Import {
        file: PathBuf,
    },

    /// Show statistics and health
    Stats,

    /// List the snapshots of a key
    Snapshots {
        key: String,
    },

    /// Purge expired snapshots
    Cleanup,

    /// Print events from a change feed until it closes
    Watch {
        /// Feed address (host:port)
        addr: String,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,durastore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let command = match args.command {
        Commands::Watch { addr } => return watch(&addr),
        command => command,
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .capacity_bytes(args.capacity_kb * 1024)
        .secondary_enabled(!args.no_secondary)
        .build();

    let store = Store::open(config)?;
    let result = execute(&store, command);
    store.shutdown()?;
    result
}

fn execute(store: &Store, command: Commands) -> Result<()> {
    match command {
        Commands::Get { key, raw } => {
            let opts = GetOptions {
                validate: !raw,
                ..GetOptions::default()
            };
            match store.get(&key, opts)? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("(nil)"),
            }
        }
        Commands::Set {
            key,
            value,
            no_backup,
        } => {
            let value: serde_json::Value = serde_json::from_str(&value)?;
            let opts = SetOptions {
                backup: !no_backup,
                ..SetOptions::default()
            };
            store.set(&key, &value, opts)?;
            println!("OK");
        }
        Commands::Rm { key } => {
            let removed = store.remove(&key)?;
            println!("{}", if removed { "removed" } else { "not found" });
        }
        Commands::Clear => {
            let removed = store.clear_all()?;
            println!("cleared {} records", removed);
        }
        Commands::Export { file } => {
            let bundle = store.export_all()?;
            match file {
                Some(path) => {
                    bundle.write_to(&path)?;
                    println!("exported {} keys to {}", bundle.len(), path.display());
                }
                None => println!("{}", bundle.to_json_pretty()?),
            }
        }
        Commands::Import { file } => {
            let bundle = ExportBundle::read_from(&file)?;
            store.import_all(&bundle)?;
            println!("imported {} keys", bundle.len());
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Snapshots { key } => {
            for info in store.snapshots(&key)? {
                println!(
                    "{:>20}  {:>8} bytes  {}",
                    info.timestamp,
                    info.size_bytes,
                    if info.valid { "valid" } else { "CORRUPT" }
                );
            }
        }
        Commands::Cleanup => {
            let report = store.cleanup()?;
            println!(
                "removed {} snapshots, freed {}",
                report.snapshots_removed,
                durastore::store::format_bytes(report.bytes_freed)
            );
        }
        Commands::Watch { addr } => watch(&addr)?,
    }
    Ok(())
}

fn watch(addr: &str) -> Result<()> {
    let bus = ChangeBus::new();
    bus.subscribe(EventKind::All, |event| {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "unprintable event"),
        }
    })
    .detach();

    let feed = FeedSubscriber::connect(addr, bus)?;
    tracing::info!(peer = feed.peer_addr(), "watching change feed");
    feed.join();
    Ok(())
}
