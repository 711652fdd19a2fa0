//! purchase-pipeline CLI - clean, aggregate and model customer purchases
//!
//! # Main Commands
//!
//! ```bash
//! purchase-pipeline run                        # Full run with default paths
//! purchase-pipeline run -c pipeline.json       # Full run from a config file
//! purchase-pipeline example-config             # Print the default config
//! ```
//!
//! # Stage Commands
//!
//! ```bash
//! purchase-pipeline clean -i raw.csv           # Cleaned + log feature CSV
//! purchase-pipeline aggregate -i raw.csv       # Sales workbook
//! purchase-pipeline regress -i raw.csv         # Predictions CSV
//! purchase-pipeline ingest -d purchases.db     # Raw table into SQLite
//! purchase-pipeline summary -i raw.csv         # Data overview
//! ```
//!
//! Every stage command loads and cleans its input first; cleaning is
//! idempotent, so an already cleaned file works as input too.

use clap::{Args, Parser, Subcommand};
use purchase_pipeline::{
    aggregate_all, export_aggregates, persist_table, regression, sink::DEFAULT_TABLE, Pipeline,
    PipelineConfig, PipelineError, RunLog, SinkConfig, SortOrder, StageOutcome,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "purchase-pipeline")]
#[command(about = "Customer purchase ETL: clean, aggregate, regress", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads the input.
#[derive(Args)]
struct Common {
    /// JSON config file (defaults apply for missing keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV file (overrides config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Do not print the run log
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: load, clean, features, then export, aggregate and regress
    Run {
        #[command(flatten)]
        common: Common,

        /// Directory for all outputs (keeps default file names)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Write the JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Also load the raw table into this SQLite database
        #[arg(long)]
        sink_db: Option<PathBuf>,

        /// Order rows by amount before the outputs
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Regression seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Clean the input and write the cleaned table
    Clean {
        #[command(flatten)]
        common: Common,

        /// Output CSV (default from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write per-dimension sales totals to a workbook
    Aggregate {
        #[command(flatten)]
        common: Common,

        /// Output workbook (default from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit the baseline regression and write test predictions
    Regress {
        #[command(flatten)]
        common: Common,

        /// Output CSV (default from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Regression seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Load the raw input into a SQLite table (replaces the table)
    Ingest {
        #[command(flatten)]
        common: Common,

        /// SQLite database file (default: config sink or PURCHASE_SINK_DATABASE)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Destination table
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Print a descriptive overview of the input
    Summary {
        #[command(flatten)]
        common: Common,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the default configuration
    ExampleConfig,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SortArg {
    None,
    Ascending,
    Descending,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::None => SortOrder::None,
            SortArg::Ascending => SortOrder::Ascending,
            SortArg::Descending => SortOrder::Descending,
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            common,
            output_dir,
            report,
            sink_db,
            sort,
            seed,
        } => cmd_run(common, output_dir, report, sink_db, sort, seed).await,

        Commands::Clean { common, output } => cmd_clean(common, output),

        Commands::Aggregate { common, output } => cmd_aggregate(common, output),

        Commands::Regress {
            common,
            output,
            seed,
        } => cmd_regress(common, output, seed),

        Commands::Ingest {
            common,
            database,
            table,
        } => cmd_ingest(common, database, table),

        Commands::Summary { common, json } => cmd_summary(common, json),

        Commands::ExampleConfig => cmd_example_config(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Config file, then environment, then the input flag.
fn load_config(common: &Common) -> Result<PipelineConfig, PipelineError> {
    let mut config = match common.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    }
    .with_env();

    if let Some(ref input) = common.input {
        config.input = input.clone();
    }
    Ok(config)
}

fn run_log(common: &Common) -> RunLog {
    if common.quiet {
        RunLog::silent()
    } else {
        RunLog::new()
    }
}

async fn cmd_run(
    common: Common,
    output_dir: Option<PathBuf>,
    report: Option<PathBuf>,
    sink_db: Option<PathBuf>,
    sort: Option<SortArg>,
    seed: Option<u64>,
) -> CliResult {
    let mut config = load_config(&common)?;

    if let Some(dir) = output_dir {
        for path in [
            &mut config.cleaned_output,
            &mut config.workbook_output,
            &mut config.predictions_output,
        ] {
            if let Some(name) = path.file_name() {
                *path = dir.join(name);
            }
        }
    }
    if report.is_some() {
        config.report_output = report;
    }
    if let Some(db) = sink_db {
        let table = config
            .sink
            .take()
            .map(|s| s.table)
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        config.sink = Some(SinkConfig { database: db, table });
    }
    if let Some(sort) = sort {
        config.sort = sort.into();
    }
    if let Some(seed) = seed {
        config.regression.seed = seed;
    }

    let pipeline = Pipeline::new(config, run_log(&common));
    let report = pipeline.run().await?;

    eprintln!("\n📊 Run {}", report.run_id);
    eprintln!(
        "   Rows: {} read, {} kept, {} dropped",
        report.clean.input_rows,
        report.clean.output_rows,
        report.clean.dropped()
    );
    print_outcome("Cleaned data", &report.cleaned_export, |p| p.display().to_string());
    print_outcome("Aggregates", &report.aggregates, |w| {
        format!("{} ({} sheets)", w.destination.display(), w.sheets.len())
    });
    print_outcome("Regression", &report.regression, |r| {
        format!("MSE {:.4} on {} test rows", r.mse, r.test_rows)
    });
    if let Some(ref sink) = report.sink {
        print_outcome("Sink", sink, |n| format!("{} rows", n));
    }

    if report.is_success() {
        eprintln!("\n✨ Done!");
        Ok(())
    } else {
        Err("one or more stages failed".into())
    }
}

fn print_outcome<T>(label: &str, outcome: &StageOutcome<T>, detail: impl Fn(&T) -> String) {
    match outcome {
        StageOutcome::Completed(value) => eprintln!("   ✅ {}: {}", label, detail(value)),
        StageOutcome::Failed(e) => eprintln!("   ❌ {}: {}", label, e),
    }
}

fn cmd_clean(common: Common, output: Option<PathBuf>) -> CliResult {
    let config = load_config(&common)?;
    let destination = output.unwrap_or_else(|| config.cleaned_output.clone());
    let log = run_log(&common);

    let prepared = Pipeline::new(config, log.clone()).prepare()?;
    persist_table(&prepared.table, &destination).map_err(PipelineError::from)?;

    log.success(format!("Cleaned data saved: {}", destination.display()));
    Ok(())
}

fn cmd_aggregate(common: Common, output: Option<PathBuf>) -> CliResult {
    let config = load_config(&common)?;
    let destination = output.unwrap_or_else(|| config.workbook_output.clone());
    let log = run_log(&common);

    let prepared = Pipeline::new(config, log.clone()).prepare()?;
    let tables = aggregate_all(&prepared.table).map_err(PipelineError::Aggregate)?;
    for table in &tables {
        log.info(format!("{}: {} groups", table.sheet_name(), table.rows.len()));
    }
    export_aggregates(&tables, &destination).map_err(PipelineError::from)?;

    log.success(format!(
        "Aggregated data exported successfully: {}",
        destination.display()
    ));
    Ok(())
}

fn cmd_regress(common: Common, output: Option<PathBuf>, seed: Option<u64>) -> CliResult {
    let mut config = load_config(&common)?;
    if let Some(seed) = seed {
        config.regression.seed = seed;
    }
    let destination = output.unwrap_or_else(|| config.predictions_output.clone());
    let settings = config.regression;
    let log = run_log(&common);

    let prepared = Pipeline::new(config, log.clone()).prepare()?;
    let report = regression::run(&prepared.table, &settings, &destination, &log.for_stage("regression"))
        .map_err(PipelineError::from)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_ingest(common: Common, database: Option<PathBuf>, table: Option<String>) -> CliResult {
    let config = load_config(&common)?;
    let mut sink = match (database, config.sink.clone()) {
        (Some(db), Some(existing)) => SinkConfig {
            database: db,
            table: existing.table,
        },
        (Some(db), None) => SinkConfig::new(db),
        (None, Some(existing)) => existing,
        (None, None) => {
            return Err("no database given: use --database, the config sink or PURCHASE_SINK_DATABASE".into())
        }
    };
    if let Some(table) = table {
        sink.table = table;
    }

    let log = run_log(&common);
    let rows = Pipeline::new(config, log).ingest(&sink)?;
    eprintln!("📦 {} rows in {}", rows, sink.table);
    Ok(())
}

fn cmd_summary(common: Common, json: bool) -> CliResult {
    let config = load_config(&common)?;
    let prepared = Pipeline::new(config, RunLog::silent()).prepare()?;
    let overview = prepared.overview();

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
    } else {
        print!("{}", overview);
    }
    Ok(())
}

fn cmd_example_config() -> CliResult {
    println!("{}", PipelineConfig::default().to_json()?);
    Ok(())
}
