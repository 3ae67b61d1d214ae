//! Command-line runner for query documents.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use slotbook::{
    coalescer::CounterMetrics,
    config::ClientConfig,
    logging::init_logging,
    CoalesceWindow, CoalescerOptions, EngineExecutor, ProcessTransport, QueryDocument,
    QueryError, RequestCoalescer,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "slotbook",
    version,
    about = "Run weekly booking queries through the batching client",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Config file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Log filter, overrides the config file")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit every document of a JSON-lines file in one coalescing window
    Run(RunCmd),
    /// Print the resolved configuration
    Config,
}

#[derive(Args, Debug)]
struct RunCmd {
    #[arg(long, value_name = "FILE", help = "JSON-lines file of query documents")]
    queries: PathBuf,

    #[arg(long, value_name = "PATH", help = "Query engine executable")]
    engine: Option<PathBuf>,

    #[arg(long, value_name = "MS", help = "Coalescing window; 0 flushes at the next tick")]
    window_ms: Option<u64>,

    #[arg(long, help = "Print coalescer counters to stderr when done")]
    stats: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when at least one query failed.
async fn run() -> Result<bool, Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config)?;
    if let Some(level) = cli.log {
        config.log.level = level;
    }
    init_logging(&config.log.level)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(true)
        }
        Command::Run(cmd) => {
            if let Some(engine) = cmd.engine.clone() {
                config.engine.path = Some(engine);
            }
            if let Some(ms) = cmd.window_ms {
                config.coalescer.window_ms = ms;
            }
            run_queries(&cmd, &config).await
        }
    }
}

async fn run_queries(cmd: &RunCmd, config: &ClientConfig) -> Result<bool, Box<dyn Error>> {
    let documents = read_documents(&cmd.queries)?;
    let transport = Arc::new(ProcessTransport::new(config.transport_options()?));
    let metrics = Arc::new(CounterMetrics::default());
    let window: CoalesceWindow = config.window();
    let coalescer = RequestCoalescer::new(
        EngineExecutor::new(Arc::clone(&transport)),
        CoalescerOptions::default()
            .window(window)
            .metrics(metrics.clone()),
    );
    info!(documents = documents.len(), ?window, "slotbook.run.start");

    let tickets: Vec<_> = documents
        .into_iter()
        .map(|doc| coalescer.submit(doc))
        .collect();
    let mut all_ok = true;
    for ticket in tickets {
        let line = match ticket.await {
            Ok(value) => json!({ "ok": value }),
            Err(err) => {
                all_ok = false;
                error_json(&err)
            }
        };
        println!("{line}");
    }

    transport.shutdown().await?;
    if cmd.stats {
        eprintln!("{}", serde_json::to_string(&metrics.snapshot())?);
    }
    Ok(all_ok)
}

fn read_documents(path: &Path) -> Result<Vec<QueryDocument>, Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let mut documents = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let doc: QueryDocument = serde_json::from_str(line)
            .map_err(|err| format!("{}:{}: invalid query document: {err}", path.display(), idx + 1))?;
        documents.push(doc);
    }
    Ok(documents)
}

fn error_json(err: &QueryError) -> serde_json::Value {
    match err {
        QueryError::Engine(engine) => json!({
            "error": {
                "kind": "engine",
                "code": engine.code,
                "message": engine.message,
                "meta": engine.meta,
            }
        }),
        QueryError::Batch(batch) => json!({
            "error": { "kind": "batch", "message": batch.to_string() }
        }),
        other => json!({
            "error": { "kind": "client", "message": other.to_string() }
        }),
    }
}
