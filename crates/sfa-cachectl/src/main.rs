//! # SFA Report Cache CLI
//!
//! Operator tool for the report cache: check connectivity, inspect and
//! edit entries, fire invalidation groups.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sfa_cache::ttl::{TtlPolicy, cache_control_header};
use sfa_cache::{
    BackendHealth, CacheConfig, DomainEvent, InvalidationGroup, InvalidationReport, Lookup,
    ReportCache, WriteOutcome,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sfa-cachectl")]
#[command(version, about = "Inspect and invalidate the SFA report cache")]
struct Args {
    /// Redis host (overrides REDIS_HOST)
    #[arg(long, env = "REDIS_HOST")]
    host: Option<String>,

    /// Redis port (overrides REDIS_PORT)
    #[arg(long, env = "REDIS_PORT")]
    port: Option<u16>,

    /// Key prefix (overrides REDIS_KEY_PREFIX)
    #[arg(long, env = "REDIS_KEY_PREFIX")]
    prefix: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and report remote tier health
    Ping,
    /// Print the JSON value stored under a key
    Get { key: String },
    /// Store a JSON value under a key
    Set {
        key: String,
        /// JSON text, e.g. '{"sales": 10}'
        value: String,
        /// TTL in seconds (configured default when omitted)
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Delete keys
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Delete every key matching a `*` pattern
    Invalidate { pattern: String },
    /// Fire a named invalidation group
    Fire { group: String },
    /// List invalidation groups
    Groups,
    /// List TTL policies
    Ttls,
    /// Print cache statistics after connecting
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json);

    let mut config = CacheConfig::from_env().context("invalid cache configuration")?;
    if let Some(host) = args.host {
        config.redis.host = host;
    }
    if let Some(port) = args.port {
        config.redis.port = port;
    }
    if let Some(prefix) = args.prefix {
        config.redis.key_prefix = prefix;
    }
    config.validate().context("invalid cache configuration")?;

    // Commands that never touch a store
    match args.command {
        Command::Groups => {
            print_groups();
            return Ok(());
        }
        Command::Ttls => {
            print_ttls(&config);
            return Ok(());
        }
        _ => {}
    }

    tracing::info!(
        version = sfa_cache::VERSION,
        remote = %config.redis.display_target(),
        "Starting sfa-cachectl"
    );

    let cache = ReportCache::new(config);
    let health = cache.initialize().await;
    if health != Some(BackendHealth::Ready) && !matches!(args.command, Command::Ping) {
        eprintln!("warning: remote tier unavailable, operating on an empty in-process store");
    }

    let result = run(&cache, args.command, health).await;
    cache.close().await;
    result
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cache: &ReportCache, command: Command, health: Option<BackendHealth>) -> Result<()> {
    match command {
        Command::Ping => {
            let target = cache.config().redis.display_target();
            match health {
                Some(BackendHealth::Ready) => println!("{target}: ready"),
                Some(other) => bail!("{target}: {other}"),
                None => bail!("remote tier disabled (CACHE_REDIS_ENABLED=false)"),
            }
        }
        Command::Get { key } => match cache.lookup::<serde_json::Value>(&key).await {
            Lookup::Hit(value, tier) => {
                println!("{}", serde_json::to_string_pretty(&value)?);
                tracing::debug!(key = %key, tier = %tier, "Printed cached value");
            }
            Lookup::Miss(tier) => bail!("{key}: not cached ({tier})"),
            Lookup::Failed(e) => bail!("{key}: {e}"),
        },
        Command::Set { key, value, ttl } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).context("value is not valid JSON")?;
            let outcome = cache
                .set(&key, &value, ttl.map(Duration::from_secs))
                .await;
            print_outcome("set", &key, &outcome)?;
        }
        Command::Del { keys } => {
            let outcome = cache.delete_many(keys.as_slice()).await;
            print_outcome("del", &keys.join(" "), &outcome)?;
        }
        Command::Invalidate { pattern } => {
            let outcome = cache.invalidate_pattern(&pattern).await;
            print_outcome("invalidate", &pattern, &outcome)?;
        }
        Command::Fire { group } => {
            let event: DomainEvent = group.parse()?;
            let report = cache.invalidate_event(event).await;
            print_report(&report)?;
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
        Command::Groups | Command::Ttls => {}
    }
    Ok(())
}

fn print_outcome(op: &str, subject: &str, outcome: &WriteOutcome) -> Result<()> {
    match outcome {
        WriteOutcome::Applied { tier, affected } => {
            println!("{op} {subject}: {affected} key(s) on {tier}");
            Ok(())
        }
        WriteOutcome::Failed(e) => bail!("{op} {subject}: {e}"),
    }
}

fn print_report(report: &InvalidationReport) -> Result<()> {
    for (pattern, outcome) in &report.outcomes {
        match outcome {
            WriteOutcome::Applied { tier, affected } => {
                println!("  {pattern:<20} {affected:>6} removed ({tier})");
            }
            WriteOutcome::Failed(e) => println!("  {pattern:<20} failed: {e}"),
        }
    }
    println!("{}: {} key(s) removed", report.group, report.removed());

    if !report.is_complete() {
        bail!("{}: some patterns failed", report.group);
    }
    Ok(())
}

fn print_groups() {
    for group in InvalidationGroup::all() {
        println!("{:<18} {}", group.name, group.patterns.join(", "));
    }
}

fn print_ttls(config: &CacheConfig) {
    for policy in TtlPolicy::ALL {
        let ttl = config.ttl.ttl_for(policy);
        println!(
            "{:<14} {:>5}s  {}",
            policy.as_str(),
            ttl.as_secs(),
            cache_control_header(ttl)
        );
    }
    println!("{:<14} {:>5}s", "default", config.default_ttl.as_secs());
}
