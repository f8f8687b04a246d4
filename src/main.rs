use clap::Parser;
use engagement_ledger::application::engine::Engine;
use engagement_ledger::config::EngineConfig;
use engagement_ledger::domain::ports::LedgerStores;
use engagement_ledger::infrastructure::directory::InMemoryDirectory;
use engagement_ledger::infrastructure::gateway::SimulatedGateway;
use engagement_ledger::infrastructure::in_memory::in_memory_stores;
use engagement_ledger::infrastructure::notifier::LogNotifier;
use engagement_ledger::interfaces::csv::command_reader::CommandReader;
use engagement_ledger::interfaces::csv::work_item_writer::WorkItemWriter;
use engagement_ledger::interfaces::script::ScriptRunner;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command script CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Platform fee rate shown on contractor receipts
    #[arg(long, default_value = "0.10")]
    fee_rate: Decimal,

    /// Upper bound on each payment gateway call, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    gateway_timeout_ms: u64,

    /// Write issued documents and compliance entries to this JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

fn open_stores(db_path: Option<PathBuf>) -> Result<LedgerStores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use engagement_ledger::infrastructure::rocksdb::RocksDBStore;
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(LedgerStores::from_backend(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(in_memory_stores())
        }
        None => Ok(in_memory_stores()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = EngineConfig {
        platform_fee_rate: cli.fee_rate,
        gateway_timeout: Duration::from_millis(cli.gateway_timeout_ms),
        ..EngineConfig::default()
    };
    config.validate().into_diagnostic()?;
    let gateway = SimulatedGateway::new();
    let directory = InMemoryDirectory::new();
    let engine = Engine::new(
        open_stores(cli.db_path)?,
        Arc::new(gateway.clone()),
        Arc::new(directory.clone()),
        Arc::new(LogNotifier),
        config,
    );
    let mut runner = ScriptRunner::new(engine, gateway, directory);

    let file = File::open(cli.input).into_diagnostic()?;
    for (index, command) in CommandReader::new(file).commands().enumerate() {
        let row = index + 1;
        match command {
            Ok(command) => {
                let op = command.op;
                if let Err(err) = runner.run(command).await {
                    warn!(row, ?op, error = %err, "command rejected");
                }
            }
            Err(err) => warn!(row, error = %err, "unreadable command row"),
        }
    }

    let rows = runner.work_items().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = WorkItemWriter::new(stdout.lock());
    writer
        .write_work_items(rows.iter().map(|(item, payment)| (item, payment.as_ref())))
        .into_diagnostic()?;

    if let Some(path) = cli.export {
        let export = runner.export().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        serde_json::to_writer_pretty(file, &export).into_diagnostic()?;
    }

    Ok(())
}
