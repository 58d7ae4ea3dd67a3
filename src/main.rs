use clap::{Parser, Subcommand};
use feewatch::chain::{export_chain, import_chain, verify_chain};
use feewatch::config::{Config, DEFAULT_CONFIG_PATH};
use feewatch::detector::FeeSourceDetector;
use feewatch::fetcher::HttpDataSource;
use feewatch::ledger::{FeeStore, SqliteStore};
use feewatch::logger::{self, LogTag};
use feewatch::orchestrator::{BatchOrchestrator, MintTarget, RealtimeMonitor};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "feewatch", about = "Creator-fee disposition tracker", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Show verbose output
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable debug output for a subsystem (repeatable), e.g. --debug rpc
    #[arg(long, global = true, value_name = "MODULE")]
    debug: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One-shot ingestion of recent history for the given tokens
    Batch {
        /// Tokens as mint:creator_wallet pairs
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Watch the given tokens live over websocket until interrupted
    Realtime {
        /// Tokens as mint:creator_wallet pairs
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Detect where a token's creator fees flow
    Detect {
        mint: String,
        creator_wallet: String,
        /// Bypass the cached result
        #[arg(long)]
        refresh: bool,
    },
    /// Verify a token's stored proof-of-history chain, or an exported file
    Verify {
        /// Token mint whose stored chain to verify
        #[arg(long, conflicts_with = "file")]
        mint: Option<String>,
        /// Previously exported chain file to verify instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Export a token's proof-of-history chain as JSON
    Export {
        mint: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Solana addresses are 32 bytes in base58
fn is_valid_address(raw: &str) -> bool {
    bs58::decode(raw)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

/// Parse a `mint:creator_wallet` pair
fn parse_target(raw: &str) -> anyhow::Result<MintTarget> {
    let (mint, wallet) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected mint:creator_wallet, got '{}'", raw))?;
    if !is_valid_address(mint) {
        anyhow::bail!("'{}' is not a valid mint address", mint);
    }
    if !is_valid_address(wallet) {
        anyhow::bail!("'{}' is not a valid wallet address", wallet);
    }
    Ok(MintTarget {
        mint: mint.to_string(),
        creator_wallet: wallet.to_string(),
    })
}

fn parse_targets(raw: &[String]) -> anyhow::Result<Vec<MintTarget>> {
    raw.iter().map(|r| parse_target(r)).collect()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.quiet, &cli.debug);

    if let Err(e) = run(cli).await {
        logger::error(LogTag::System, "FATAL", &format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Batch { targets } => {
            let targets = parse_targets(&targets)?;
            let store: Arc<dyn FeeStore> = Arc::new(SqliteStore::open(&config.database_path)?);
            let source = Arc::new(
                HttpDataSource::new(&config.rpc_url, &config.api_url, &config.api_key)?
                    .with_retry_policies(config.rpc_retry_policy(), config.rest_retry_policy()),
            );
            let detector = Arc::new(FeeSourceDetector::new(source.clone()));
            let orchestrator =
                BatchOrchestrator::new(source, store, detector, config.batch_config());

            let summary = orchestrator.run_batch(&targets).await;
            for error in &summary.errors {
                logger::error(LogTag::Batch, "TARGET_FAILED", error);
            }
            if summary.processed == 0 && !summary.errors.is_empty() {
                anyhow::bail!("every target failed");
            }
        }
        Command::Realtime { targets } => {
            let targets = parse_targets(&targets)?;
            let store: Arc<dyn FeeStore> = Arc::new(SqliteStore::open(&config.database_path)?);
            let source = Arc::new(
                HttpDataSource::new(&config.rpc_url, &config.api_url, &config.api_key)?
                    .with_retry_policies(config.rpc_retry_policy(), config.rest_retry_policy()),
            );
            let detector = Arc::new(FeeSourceDetector::new(source.clone()));
            let monitor = Arc::new(RealtimeMonitor::new(
                source,
                store,
                detector,
                config.realtime_config(),
            ));

            let handle = monitor.clone();
            ctrlc::set_handler(move || {
                logger::log(LogTag::System, "SHUTDOWN", "Interrupt received, stopping");
                handle.stop();
            })?;

            monitor.run(&targets).await?;
        }
        Command::Detect {
            mint,
            creator_wallet,
            refresh,
        } => {
            let source = Arc::new(
                HttpDataSource::new(&config.rpc_url, &config.api_url, &config.api_key)?
                    .with_retry_policies(config.rpc_retry_policy(), config.rest_retry_policy()),
            );
            let detector = FeeSourceDetector::new(source);

            let result = if refresh {
                detector.refresh(&mint, &creator_wallet).await?
            } else {
                detector.detect(&mint, &creator_wallet).await?
            };

            println!("model:          {}", result.model.as_str());
            println!("primary source: {}", result.primary_source);
            println!("recommendation: {}", result.recommendation);
            println!(
                "vault:          {} (active: {}, {} sigs, {} lamports)",
                result.sources.vault.address,
                result.sources.vault.active,
                result.evidence.vault_signature_count,
                result.evidence.vault_balance_lamports
            );
            println!(
                "wallet:         {} (active: {}, {} sigs, {} lamports)",
                result.sources.wallet.address,
                result.sources.wallet.active,
                result.evidence.wallet_signature_count,
                result.evidence.wallet_balance_lamports
            );
        }
        Command::Verify { mint, file } => {
            let records = match (&mint, &file) {
                (Some(mint), None) => {
                    let store = SqliteStore::open(&config.database_path)?;
                    store.poh_records(mint)?
                }
                (None, Some(path)) => {
                    let text = std::fs::read_to_string(path)?;
                    import_chain(&text)?
                }
                _ => anyhow::bail!("pass exactly one of --mint or --file"),
            };

            let result = verify_chain(&records);
            if result.valid {
                logger::log(
                    LogTag::Chain,
                    "VERIFIED",
                    &format!("{} records, chain intact", records.len()),
                );
            } else {
                anyhow::bail!(
                    "chain invalid at index {}: {}",
                    result.invalid_at.unwrap_or(0),
                    result.error.unwrap_or_default()
                );
            }
        }
        Command::Export { mint, out } => {
            let store = SqliteStore::open(&config.database_path)?;
            let records = store.poh_records(&mint)?;
            if records.is_empty() {
                logger::warning(LogTag::Chain, "EMPTY", &format!("No records for {}", mint));
            }
            let text = export_chain(&records)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    logger::log(
                        LogTag::Chain,
                        "EXPORTED",
                        &format!("{} records to {}", records.len(), path.display()),
                    );
                }
                None => println!("{}", text),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "So11111111111111111111111111111111111111112";
    const WALLET: &str = "Vote111111111111111111111111111111111111111";

    #[test]
    fn test_parse_target_pair() {
        let target = parse_target(&format!("{}:{}", MINT, WALLET)).unwrap();
        assert_eq!(target.mint, MINT);
        assert_eq!(target.creator_wallet, WALLET);
    }

    #[test]
    fn test_parse_target_rejects_malformed() {
        assert!(parse_target(MINT).is_err());
        assert!(parse_target(&format!(":{}", WALLET)).is_err());
        assert!(parse_target(&format!("{}:", MINT)).is_err());
        assert!(parse_target(&format!("{}:not-base58!", MINT)).is_err());
    }
}
