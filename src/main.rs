//! ctxcache
//!
//! Inspect and edit a chunked cache kept in a file-backed context store.
//!
//! ```text
//! ctxcache --store ctx.json --prefix phishing_connector set alert-1 '{"seen":true}'
//! ctxcache --store ctx.json --prefix phishing_connector chunks
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info, Level};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use ctxcache::{Cache, CacheConfig, FileContextStore, LoggingEventPublisher};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Chunked key-value cache over a size-bounded context store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding the context store
    #[arg(long, env = "CTXCACHE_STORE")]
    store: PathBuf,

    /// Cache prefix (overrides the config file)
    #[arg(long, env = "CTXCACHE_PREFIX")]
    prefix: Option<String>,

    /// Maximum number of entries (overrides the config file)
    #[arg(long, env = "CTXCACHE_MAX_SIZE")]
    max_size: Option<usize>,

    /// YAML cache configuration
    #[arg(long, env = "CTXCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Log routine cache events (evictions, commits) at info level
    #[arg(long, env = "CTXCACHE_LOG_EVENTS")]
    log_events: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value stored under a key
    Get { key: String },
    /// Store a value; parsed as JSON, otherwise kept as a string
    Set { key: String, value: String },
    /// Remove a key
    Delete { key: String },
    /// List all keys
    Keys,
    /// Print the number of entries
    Len,
    /// Print the whole cache as one JSON object
    Dump,
    /// Print chunk metadata
    Chunks,
    /// Even out chunk sizes and commit
    Rebalance,
}

impl Command {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Set { .. } | Command::Delete { .. } | Command::Rebalance
        )
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    debug!(prefix = %config.prefix, store = %args.store.display(), "Opening cache");

    let store = Arc::new(
        FileContextStore::open(&args.store)
            .with_context(|| format!("failed to open context store {}", args.store.display()))?,
    );
    let events = Arc::new(event_publisher(&args));
    let mut cache: Cache<Value> =
        Cache::with_events(store, config, events).context("failed to load cache metadata")?;

    run(&mut cache, &args.command)?;

    if args.command.mutates() {
        cache.commit().context("failed to commit cache")?;
        info!(
            entries = cache.len(),
            chunks = cache.chunk_count(),
            "Cache committed"
        );
    }

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CacheConfig::default(),
    };

    if let Some(prefix) = &args.prefix {
        config.prefix = prefix.clone();
    }
    if args.max_size.is_some() {
        config.max_size = args.max_size;
    }
    if config.prefix.is_empty() {
        bail!("a cache prefix is required (--prefix or the config file)");
    }
    Ok(config)
}

fn event_publisher(args: &Args) -> LoggingEventPublisher {
    if args.log_events {
        LoggingEventPublisher::info_level()
    } else {
        LoggingEventPublisher::new()
    }
}

fn run(cache: &mut Cache<Value>, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Get { key } => {
            let value = cache.get(key)?;
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Command::Set { key, value } => {
            let value =
                serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
            cache.set(key.clone(), value)?;
        }
        Command::Delete { key } => {
            cache.delete(key)?;
        }
        Command::Keys => {
            for key in cache.keys()? {
                println!("{}", key);
            }
        }
        Command::Len => println!("{}", cache.len()),
        Command::Dump => {
            println!("{}", serde_json::to_string_pretty(&cache.content()?)?);
        }
        Command::Chunks => {
            println!("{:>10}  {:>6}  {:<36}  KEY", "INDEX", "SIZE", "STORAGE KEY");
            for meta in cache.chunk_metadata() {
                println!(
                    "{:>10}  {:>6}  {:<36}  {}",
                    meta.index,
                    meta.size,
                    meta.storage_key,
                    meta.backend_key()
                );
            }
        }
        Command::Rebalance => cache.balance_chunks()?,
    }
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    // Logs go to stderr so command output stays pipeable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Tests
// =============================================================================
