//! Reddit-Harvest main entry point
//!
//! This is the command-line interface for the resumable subreddit crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reddit_harvest::config::{load_config_with_hash, validate_combos, Config, Strategy};
use reddit_harvest::crawler::{
    crawl_subreddit, resume_run, BatchOrchestrator, Credentials, RedditClient,
};
use reddit_harvest::output::{
    combine_run_dirs, print_batch_summary, print_combine_summary, print_run_summary,
};
use reddit_harvest::storage::ExitStatus;
use reddit_harvest::{logging, CancellationFlag};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Reddit-Harvest: a resumable, deduplicating subreddit crawler
///
/// Reddit-Harvest collects posts and their full comment trees, filters them by
/// language, and writes them to append-only outputs that survive interruption.
#[derive(Parser, Debug)]
#[command(name = "reddit-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, deduplicating subreddit crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every configured subreddit once with the configured strategy
    Crawl {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Continue an earlier run in its existing directory
        #[arg(long, value_name = "RUN_DIR")]
        resume: Option<PathBuf>,

        /// Validate config and show what would be crawled without crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a sequence of listing strategies per subreddit and merge their output
    Batch {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Combos to run instead of the configured/default sequence (e.g. new top:week)
        #[arg(long, num_args = 1..)]
        combos: Vec<String>,

        /// Validate config and show what would be crawled without crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge every run directory under ROOT into ROOT/combined
    Combine {
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.quiet);

    match cli.command {
        Command::Crawl {
            config,
            resume,
            dry_run,
        } => {
            let (config, hash) = load(&config)?;
            if dry_run {
                print_plan(&config, &[config.strategy()]);
                return Ok(ExitCode::SUCCESS);
            }
            handle_crawl(&config, hash, resume.as_deref()).await
        }
        Command::Batch {
            config,
            combos,
            dry_run,
        } => {
            let (config, hash) = load(&config)?;
            let combos = parse_combos(&config, &combos)?;
            if dry_run {
                print_plan(&config, &combos);
                return Ok(ExitCode::SUCCESS);
            }
            handle_batch(&config, hash, &combos).await
        }
        Command::Combine { root } => {
            let summary = combine_run_dirs(&root)
                .with_context(|| format!("failed to combine runs under {}", root.display()))?;
            print_combine_summary(&summary);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load(path: &Path) -> anyhow::Result<(Config, String)> {
    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok((config, hash))
}

/// Combos from the command line, or the configured/default sequence
fn parse_combos(config: &Config, args: &[String]) -> anyhow::Result<Vec<Strategy>> {
    let combos = if args.is_empty() {
        config.batch_combos()
    } else {
        args.iter()
            .map(|arg| arg.parse::<Strategy>())
            .collect::<Result<Vec<_>, _>>()?
    };
    validate_combos(&combos)?;
    Ok(combos)
}

/// Exit status for a forced stop on a second Ctrl-C (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Cancels the flag on the first Ctrl-C and exits the process on the second
fn install_interrupt_handler() -> CancellationFlag {
    let cancel = CancellationFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, &flag).await {
            tracing::error!("Second interrupt received, exiting without finalizing");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
    cancel
}

/// Waits for interrupts from `signal`: the first cancels `flag`
///
/// # Returns
///
/// `true` once a second interrupt arrives, `false` if the signal source fails.
async fn watch_interrupts<S, Fut>(mut signal: S, flag: &CancellationFlag) -> bool
where
    S: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if signal().await.is_err() {
        return false;
    }
    tracing::warn!(
        "Interrupt received, finishing the current post before stopping (Ctrl-C again to force)"
    );
    flag.cancel();

    signal().await.is_ok()
}

fn build_client(config: &Config) -> anyhow::Result<RedditClient> {
    let credentials = Credentials::from_env(&config.api);
    if credentials.is_some() {
        tracing::info!("Using app-only OAuth credentials from the environment");
    } else {
        tracing::info!("No API credentials set, using the public JSON endpoints");
    }
    RedditClient::new(&config.api, credentials).context("failed to build HTTP client")
}

/// Handles the `crawl` command
async fn handle_crawl(
    config: &Config,
    hash: String,
    resume: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let client = build_client(config)?;
    let cancel = install_interrupt_handler();
    let mut any_error = false;

    if let Some(run_dir) = resume {
        let report = resume_run(&client, config, run_dir, cancel, Some(hash))
            .await
            .with_context(|| format!("failed to resume {}", run_dir.display()))?;
        print_run_summary(&report.metadata);
        any_error = report.status() == ExitStatus::Error;
    } else {
        let strategy = config.strategy();
        for subreddit in &config.subreddits {
            if cancel.is_cancelled() {
                break;
            }
            let report = crawl_subreddit(
                &client,
                config,
                subreddit,
                strategy,
                cancel.clone(),
                Some(hash.clone()),
            )
            .await
            .with_context(|| format!("crawl of r/{} failed", subreddit))?;
            print_run_summary(&report.metadata);
            any_error |= report.status() == ExitStatus::Error;
        }
    }

    Ok(exit_code(any_error))
}

/// Handles the `batch` command
async fn handle_batch(
    config: &Config,
    hash: String,
    combos: &[Strategy],
) -> anyhow::Result<ExitCode> {
    let client = build_client(config)?;
    let cancel = install_interrupt_handler();

    let report = BatchOrchestrator::new(&client, config, cancel)
        .with_config_hash(Some(hash))
        .run(&config.subreddits, combos)
        .await;

    for meta in &report.sources {
        print_batch_summary(meta);
    }
    for (subreddit, error) in &report.failed_sources {
        eprintln!("r/{}: {}", subreddit, error);
    }

    Ok(exit_code(report.any_error()))
}

fn exit_code(any_error: bool) -> ExitCode {
    if any_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Prints the sources x combos plan for `--dry-run`
fn print_plan(config: &Config, combos: &[Strategy]) {
    println!("=== Reddit-Harvest Dry Run ===\n");

    println!("Subreddits ({}):", config.subreddits.len());
    for subreddit in &config.subreddits {
        println!("  - r/{}", subreddit);
    }

    println!("\nStrategies ({}):", combos.len());
    for combo in combos {
        println!("  - {}", combo);
    }

    println!("\nCrawling:");
    match config.crawling.post_cap() {
        Some(cap) => println!("  Post cap per run: {}", cap),
        None => println!("  Post cap per run: unlimited"),
    }
    println!("  Delay between posts: {}ms", config.crawling.post_sleep_ms);

    println!("\nLanguage:");
    match &config.language.target {
        Some(language) => println!("  Target: {}", language),
        None => println!("  Target: none (no filtering)"),
    }
    println!("  Title gate: {}", config.language.require_title);
    println!("  Original-post gate: {}", config.language.require_op);
    println!("  Comment gate: {}", config.language.filter_comments);
    println!("  Minimum script ratio: {}", config.language.min_script_ratio);

    println!("\nOutput:");
    println!("  Base directory: {}", config.output.base_dir);
    println!("  Buffer size: {}", config.output.buffer_size);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would run {} crawl sessions",
        config.subreddits.len() * combos.len()
    );
}
