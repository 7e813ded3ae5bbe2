//! DocVault CLI
//!
//! Inspect and edit a DocVault data directory from the command line.

use std::process;

use clap::{Parser, Subcommand};
use docvault::storage::SEPARATOR;
use docvault::{Config, Storage, StorageKey, SyncStrategy, VaultError};
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// DocVault CLI
#[derive(Parser, Debug)]
#[command(name = "docvault-cli")]
#[command(about = "CLI for the DocVault document store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./docvault_data")]
    data_dir: String,

    /// How long to wait for a document lock (milliseconds)
    #[arg(short = 't', long, default_value = "30000")]
    lock_timeout_ms: u64,

    /// Skip fsync before renaming documents into place
    #[arg(long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a document
    Get {
        /// Key, segments separated by '/'
        key: String,
    },

    /// Create or replace a document
    Put {
        /// Key, segments separated by '/'
        key: String,

        /// JSON value to store
        value: String,
    },

    /// Delete a document
    Rm {
        /// Key, segments separated by '/'
        key: String,
    },

    /// List documents under a prefix
    Ls {
        /// Prefix, segments separated by '/' (whole store if omitted)
        prefix: Option<String>,
    },

    /// Add to a numeric field of an existing document
    Incr {
        /// Key, segments separated by '/'
        key: String,

        /// Top-level field to increment
        field: String,

        /// Amount to add
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        by: i64,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,docvault=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("DocVault CLI v{}", docvault::VERSION);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .lock_timeout_ms(args.lock_timeout_ms)
        .sync_strategy(if args.no_sync {
            SyncStrategy::Never
        } else {
            SyncStrategy::Always
        })
        .build();

    let storage = match Storage::open(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&storage, args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

/// Errors surfaced by the CLI
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document {0} is not a JSON object")]
    NotAnObject(String),
}

fn run(storage: &Storage, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Get { key } => {
            let value: Value = storage.read(&StorageKey::parse(&key)?)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Put { key, value } => {
            let value: Value = serde_json::from_str(&value)?;
            storage.write(&StorageKey::parse(&key)?, &value)?;
        }
        Commands::Rm { key } => {
            storage.remove(&StorageKey::parse(&key)?)?;
        }
        Commands::Ls { prefix } => {
            let segments: Vec<&str> = match prefix.as_deref() {
                Some(p) if !p.is_empty() => p.split(SEPARATOR).collect(),
                _ => Vec::new(),
            };
            for key in storage.list(&segments)? {
                println!("{}", key);
            }
        }
        Commands::Incr { key, field, by } => {
            let key = StorageKey::parse(&key)?;
            let updated: Value = storage.try_update(&key, |doc: &mut Value| {
                let object = doc
                    .as_object_mut()
                    .ok_or_else(|| CliError::NotAnObject(key.to_string()))?;
                let current = object.get(&field).and_then(Value::as_i64).unwrap_or(0);
                object.insert(field.clone(), Value::from(current + by));
                Ok::<(), CliError>(())
            })?;
            println!("{}", updated[field.as_str()]);
        }
    }
    Ok(())
}
