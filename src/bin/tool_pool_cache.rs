use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use poolcache::config::{default_config_path, Config};
use poolcache::logger::{self, LogLevel, LogTag, LoggerConfig};
use poolcache::{CacheKey, FetchResult, TieredCache};
use std::path::PathBuf;

/// Inspect and drive the tiered pool data cache.
///
/// Reads go through the same path the dashboard uses: persistent store first,
/// then the remote cache raced against the live RPC source.
#[derive(Parser, Debug)]
#[command(name = "tool_pool_cache", about = "Inspect the tiered pool data cache")]
struct Args {
    /// Config file (defaults to pool_cache.toml in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug output for a tag (cache, store, remote, live, config, all)
    #[arg(long = "debug", value_name = "TAG")]
    debug_tags: Vec<String>,

    /// Show verbose output
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Console output only
    #[arg(long, default_value_t = false)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a pool through the cache
    Get {
        pool: String,
        /// Print the full result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Query remote and live sources now and store the winner
    Refresh { pool: String },
    /// Show persistent store contents
    Stats,
    /// Delete every persistent entry
    Clear,
    /// Read or attach caller extras
    Extras {
        #[command(subcommand)]
        action: ExtrasAction,
    },
}

#[derive(Subcommand, Debug)]
enum ExtrasAction {
    Get { pool: String },
    /// Attach a JSON value to a pool
    Set { pool: String, value: String },
}

fn logger_config(args: &Args) -> LoggerConfig {
    let mut config = LoggerConfig::default();
    for tag in &args.debug_tags {
        config.debug_tags.insert(tag.to_lowercase());
        config.min_level = LogLevel::Debug;
    }
    if args.verbose {
        config.min_level = LogLevel::Verbose;
    }
    config.file_logging = !args.no_log_file;
    config
}

fn print_result(result: &FetchResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("source:     {}", result.source);
    println!("generated:  {}", result.generated_at.to_rfc3339());
    println!("age:        {}s", result.age(Utc::now()).num_seconds());
    println!("schema:     {}", result.schema_version);
    println!("payload:    {}", result.payload);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with(logger_config(&args));

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load_from_path(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let cache = TieredCache::from_config(&config).context("building pool cache")?;

    let outcome = run(&cache, args.command).await;
    if let Err(e) = &outcome {
        logger::error(LogTag::System, &format!("{:#}", e));
    }
    logger::flush();
    outcome
}

async fn run(cache: &TieredCache, command: Command) -> Result<()> {
    match command {
        Command::Get { pool, json } => {
            let key = CacheKey::new(pool)?;
            let result = cache.get_data(&key).await?;
            print_result(&result, json)?;
        }
        Command::Refresh { pool } => {
            let key = CacheKey::new(pool)?;
            let result = cache.refresh(&key).await?;
            print_result(&result, false)?;
        }
        Command::Stats => {
            let stats = cache.get_cache_stats();
            println!(
                "schema {} | {}/{} entries",
                stats.schema_version, stats.entry_count, stats.max_entries
            );
            for entry in stats.entries {
                let source = entry
                    .source
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "extras only".to_string());
                let generated = entry
                    .generated_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<12} {:<16} generated {} accessed {}",
                    entry.key_prefix,
                    source,
                    generated,
                    entry.last_accessed_at.to_rfc3339()
                );
            }
        }
        Command::Clear => {
            cache.clear_cache();
            logger::info(LogTag::System, "Pool cache cleared");
        }
        Command::Extras { action } => match action {
            ExtrasAction::Get { pool } => {
                let key = CacheKey::new(pool)?;
                match cache.get_extras(&key) {
                    Some(extras) => println!("{}", serde_json::to_string_pretty(&extras)?),
                    None => println!("no extras for {}", key.prefix()),
                }
            }
            ExtrasAction::Set { pool, value } => {
                let key = CacheKey::new(pool)?;
                let extras: serde_json::Value =
                    serde_json::from_str(&value).context("extras must be valid JSON")?;
                cache.set_extras(&key, extras)?;
                logger::info(LogTag::System, &format!("Extras stored for {}", key.prefix()));
            }
        },
    }
    Ok(())
}
