use std::{
    fs,
    path::{Path, PathBuf},
    sync::{atomic::Ordering, Arc},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use golden_nonce::{
    config::{DEFAULT_BLOCK, DEFAULT_CONFIDENCE, DEFAULT_LEADING_ZEROS, DEFAULT_TIMEOUT_SECS},
    sizing::{DEFAULT_MAX_WORKERS, DEFAULT_THROUGHPUT},
    Coordinator, LocalProvisioner, MemoryQueue, Outcome, PoolMode, QueueSettings, Scanner,
    SearchTask, SizingModel, WorkerPoolConfig, WorkerResult,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const INPUT_QUEUE: &str = "INPUT_QUEUE";
const OUTPUT_QUEUE: &str = "OUTPUT_QUEUE";

#[derive(Parser, Debug)]
#[command(name = "golden-nonce")]
#[command(about = "Distributed search for golden nonces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Append a JSON report of the run to this file.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Seconds a claimed task stays hidden from other workers.
    #[arg(long, global = true, default_value_t = 600)]
    lease: u64,

    /// Longest single blocking receive, in seconds.
    #[arg(long, global = true, default_value_t = 10)]
    poll: u64,

    /// Rayon threads per local worker.
    #[arg(long, global = true, default_value_t = 1)]
    worker_threads: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run with an explicit number of workers.
    Direct {
        #[command(flatten)]
        search: SearchArgs,

        #[arg(short = 'n', long = "workers", default_value_t = 1)]
        workers: u32,
    },
    /// Size the pool from a confidence percentage.
    Indirect {
        #[command(flatten)]
        search: SearchArgs,

        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: u32,

        /// Hashes per second one worker is assumed to manage.
        #[arg(long, default_value_t = DEFAULT_THROUGHPUT)]
        throughput: u32,

        #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
        max_workers: u32,
    },
    /// Scan a single range in this process.
    Scan {
        #[arg(long, default_value = DEFAULT_BLOCK)]
        block: String,

        #[arg(short = 'd', long = "leading-zeros", default_value_t = DEFAULT_LEADING_ZEROS)]
        leading_zeros: u32,

        #[arg(long, default_value_t = 0)]
        lower: u32,

        #[arg(long, default_value_t = u32::MAX)]
        upper: u32,

        #[arg(long)]
        threads: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Block of data the nonce is appended to.
    #[arg(long, default_value = DEFAULT_BLOCK)]
    block: String,

    /// Number of leading zero bits required.
    #[arg(short = 'd', long = "leading-zeros", default_value_t = DEFAULT_LEADING_ZEROS)]
    leading_zeros: u32,

    /// Timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

#[derive(Serialize)]
struct RunReport {
    block: String,
    leading_zeros: u32,
    workers: u32,
    confidence: u32,
    timeout_secs: u64,
    outcome: Option<Outcome>,
    error: Option<String>,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let settings = QueueSettings {
        lease: Duration::from_secs(cli.lease.max(1)),
        receive_wait: Duration::from_secs(cli.poll.max(1)),
        retry_interval: Duration::from_secs(cli.poll.max(1)),
    };

    match cli.command {
        Command::Direct { search, workers } => {
            let config = WorkerPoolConfig::new(
                search.block,
                search.leading_zeros,
                search.timeout,
                PoolMode::Direct { workers },
                &SizingModel::default(),
            )?;
            run_pool(config, settings, cli.worker_threads, cli.output.as_deref()).await
        }
        Command::Indirect {
            search,
            confidence,
            throughput,
            max_workers,
        } => {
            let sizing = SizingModel {
                throughput_per_worker: throughput,
                max_workers,
            };
            let config = WorkerPoolConfig::new(
                search.block,
                search.leading_zeros,
                search.timeout,
                PoolMode::Indirect { confidence },
                &sizing,
            )?;
            run_pool(config, settings, cli.worker_threads, cli.output.as_deref()).await
        }
        Command::Scan {
            block,
            leading_zeros,
            lower,
            upper,
            threads,
        } => run_scan(block, leading_zeros, lower, upper, threads).await,
    }
}

async fn run_pool(
    config: WorkerPoolConfig,
    settings: QueueSettings,
    worker_threads: usize,
    output_path: Option<&Path>,
) -> Result<()> {
    println!("Searching for golden nonce...");
    println!("Block     : {}", config.payload);
    println!("Zeros     : {}", config.target);
    println!("Timeout   : {}s", config.timeout_secs);
    println!("Workers   : {} (confidence {}%)", config.worker_count, config.confidence);
    if let Some(path) = output_path {
        println!("Output    : {}", path.display());
    }

    let input = Arc::new(MemoryQueue::new(INPUT_QUEUE));
    let output = Arc::new(MemoryQueue::new(OUTPUT_QUEUE));
    let provisioner = LocalProvisioner::new(Arc::clone(&input), Arc::clone(&output), settings)
        .with_threads(worker_threads);
    let coordinator = Coordinator::new(input, output, provisioner, settings);

    let start = Instant::now();
    let result = coordinator.run(&config, shutdown_signal()).await;
    let elapsed = start.elapsed();

    let report = RunReport {
        block: config.payload.clone(),
        leading_zeros: config.target,
        workers: config.worker_count,
        confidence: config.confidence,
        timeout_secs: config.timeout_secs,
        outcome: result.as_ref().ok().cloned(),
        error: result.as_ref().err().map(|e| e.to_string()),
        elapsed_ms: elapsed.as_millis(),
    };
    if let Some(path) = output_path {
        match append_result_file(path, &report) {
            Ok(_) => println!("Result saved to {}", path.display()),
            Err(err) => eprintln!("Failed to write result file {}: {err:?}", path.display()),
        }
    }

    println!();
    match result? {
        Outcome::Found {
            nonce,
            hash,
            responses,
        } => {
            println!(
                "Found golden nonce after {} responses ({:.2?})",
                responses, elapsed
            );
            println!("Nonce     : {}", nonce);
            println!("Hash      : {}", hash);
        }
        Outcome::Exhausted { responses } => {
            println!(
                "No golden nonce found: all {} workers exhausted their ranges ({:.2?})",
                responses, elapsed
            );
        }
    }
    Ok(())
}

async fn run_scan(
    block: String,
    leading_zeros: u32,
    lower: u32,
    upper: u32,
    threads: Option<usize>,
) -> Result<()> {
    let threads = threads
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1)
        .max(1);
    let task = SearchTask::new(block.into_bytes(), lower, upper, leading_zeros)?;
    println!("Scanning {} candidates on {} threads...", task.width(), threads);

    let scanner = Arc::new(Scanner::new(threads));
    let cancel = scanner.cancel_flag();
    let start = Instant::now();
    let mut handle = tokio::task::spawn_blocking(move || scanner.scan(&task));
    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        _ = shutdown_signal() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            cancel.store(true, Ordering::Release);
            handle.await
        }
    };
    let scanned = joined.context("Scan thread panicked")?;
    let elapsed = start.elapsed();

    match scanned {
        Some(WorkerResult::Found { nonce, hash }) => {
            println!("Nonce is {} for hash: {} ({:.2?})", nonce, hash, elapsed);
            Ok(())
        }
        Some(WorkerResult::NotFound { reason }) => {
            println!("{} ({:.2?})", reason, elapsed);
            Ok(())
        }
        None => Err(anyhow!("Scan interrupted after {:.2?}", elapsed)),
    }
}

/// Resolves on ctrl-c; never resolves if the handler can't be installed.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install ctrl-c handler: {err}");
        std::future::pending::<()>().await;
    }
}

/// Append `report` to the JSON array stored at `path`, creating the file
/// (and its directory) on first use.
fn append_result_file(path: &Path, report: &RunReport) -> Result<()> {
    let mut runs = load_reports(path)?;
    runs.push(serde_json::to_value(report).context("Report is not serializable")?);

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create report directory {}", dir.display()))?;
    }
    let json = serde_json::to_vec_pretty(&runs)?;
    fs::write(path, json).with_context(|| format!("Cannot write run report {}", path.display()))
}

/// Previous runs in the report file. A single object from an older run is
/// kept as the first entry.
fn load_reports(path: &Path) -> Result<Vec<Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("Cannot read run report {}", path.display()))
        }
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let previous: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Run report {} is not valid JSON", path.display()))?;
    Ok(match previous {
        Value::Array(runs) => runs,
        single => vec![single],
    })
}
