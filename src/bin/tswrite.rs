//! tswrite binary
//!
//! Command-line interface for the time-series write samples:
//! - Emulator server (serve)
//! - Sample runs (basic, composite partition key, cleanup)
//! - Ad-hoc database and table operations
//!
//! # Examples
//!
//! ```bash
//! # Start the emulator
//! tswrite serve --port 8086
//!
//! # Run the basic sample against it
//! tswrite --endpoint http://127.0.0.1:8086 run --type basic --skip-deletion false
//!
//! # Run against the in-process emulator
//! tswrite run --type composite-partition-key
//!
//! # List databases
//! tswrite --endpoint http://127.0.0.1:8086 db list
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tswrite::config::AppConfig;
use tswrite::model::RetentionProperties;
use tswrite::sample::{BasicSample, Cleanup, CompositePartitionKeySample, Lifecycle, Printer};
use tswrite::server::start_server;
use tswrite::{HttpService, MemoryService, SystemClock, WriteService};

/// tswrite - time-series write samples and service emulator
#[derive(Parser, Debug)]
#[command(name = "tswrite")]
#[command(version = tswrite::VERSION)]
#[command(about = "Time-series write samples and service emulator", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "TSWRITE_CONFIG")]
    config: Option<PathBuf>,

    /// Write service endpoint; the in-process emulator is used when omitted
    #[arg(long, global = true, env = "TSWRITE_ENDPOINT")]
    endpoint: Option<String>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "TSWRITE_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the write service emulator
    Serve(ServeArgs),

    /// Run a sample
    Run(RunArgs),

    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Table operations
    Table {
        #[command(subcommand)]
        command: TableCommands,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Show version
    Version,
}

/// Server arguments
#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address
    #[arg(short, long, env = "TSWRITE_BIND")]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "TSWRITE_PORT")]
    port: Option<u16>,

    /// Enable CORS
    #[arg(long)]
    cors: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SampleType {
    /// CRUD, ingestion and upsert
    Basic,
    /// Dimension and measure-name partition keys
    CompositePartitionKey,
    /// Delete the sample table and database
    Cleanup,
}

/// Sample arguments
#[derive(Args, Debug)]
struct RunArgs {
    /// Sample to run
    #[arg(long = "type", value_enum, default_value_t = SampleType::Basic)]
    sample_type: SampleType,

    /// Database name
    #[arg(long)]
    database: Option<String>,

    /// Table name
    #[arg(long)]
    table: Option<String>,

    /// KMS key for the database update step
    #[arg(long)]
    kms_key_id: Option<String>,

    /// Keep the created resources (true or false)
    #[arg(long)]
    skip_deletion: Option<bool>,
}

/// Database commands
#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Create a database
    Create {
        /// Database name
        name: String,
        /// KMS key
        #[arg(long)]
        kms_key_id: Option<String>,
    },

    /// Describe a database
    Describe {
        /// Database name
        name: String,
    },

    /// List all databases
    List,

    /// Change the KMS key of a database
    Update {
        /// Database name
        name: String,
        /// New KMS key
        #[arg(long)]
        kms_key_id: String,
    },

    /// Delete a database
    Delete {
        /// Database name
        name: String,
    },
}

/// Table commands
#[derive(Subcommand, Debug)]
enum TableCommands {
    /// Create a table
    Create {
        /// Database name
        #[arg(short, long)]
        db: String,
        /// Table name
        name: String,
        #[command(flatten)]
        retention: RetentionArgs,
    },

    /// Describe a table
    Describe {
        /// Database name
        #[arg(short, long)]
        db: String,
        /// Table name
        name: String,
    },

    /// List all tables of a database
    List {
        /// Database name
        #[arg(short, long)]
        db: String,
    },

    /// Change the retention of a table
    Update {
        /// Database name
        #[arg(short, long)]
        db: String,
        /// Table name
        name: String,
        #[command(flatten)]
        retention: RetentionArgs,
    },

    /// Delete a table
    Delete {
        /// Database name
        #[arg(short, long)]
        db: String,
        /// Table name
        name: String,
    },
}

#[derive(Args, Debug)]
struct RetentionArgs {
    /// Memory store retention (hours)
    #[arg(long, default_value = "24")]
    memory_hours: u64,

    /// Magnetic store retention (days)
    #[arg(long, default_value = "7")]
    magnetic_days: u64,
}

impl RetentionArgs {
    fn properties(&self) -> RetentionProperties {
        RetentionProperties::new(self.memory_hours, self.magnetic_days)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.client.endpoint = Some(endpoint.clone());
    }

    match cli.command {
        Commands::Serve(args) => serve_command(config, args).await,
        Commands::Run(args) => run_command(config, args).await,
        Commands::Db { command } => db_command(config, command).await,
        Commands::Table { command } => table_command(config, command).await,
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::Version => {
            println!("tswrite {}", tswrite::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "tswrite.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .pretty(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Remote service when an endpoint is configured, else a fresh emulator.
fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn WriteService>> {
    match &config.client.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, "Using remote write service");
            Ok(Arc::new(HttpService::new(endpoint, config.client.timeout())?))
        }
        None => {
            warn!("No endpoint configured; using an in-process emulator whose state ends with this command");
            Ok(Arc::new(MemoryService::new(
                config.sample.region.clone(),
                config.sample.account_id.clone(),
            )))
        }
    }
}

/// Serve command - start the emulator
async fn serve_command(mut config: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.http_addr = bind;
    }
    if let Some(port) = args.port {
        config.server.http_port = port;
    }
    if args.cors {
        config.server.enable_cors = true;
    }

    info!(version = %tswrite::VERSION, "🚀 tswrite emulator starting...");
    let service = Arc::new(MemoryService::new(
        config.sample.region.clone(),
        config.sample.account_id.clone(),
    ));
    start_server(config.server, service).await
}

/// Run command - execute one sample
async fn run_command(mut config: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(database) = args.database {
        config.sample.database_name = database;
    }
    if let Some(table) = args.table {
        config.sample.table_name = table;
    }
    if let Some(kms_key_id) = args.kms_key_id {
        config.sample.kms_key_id = Some(kms_key_id);
    }
    if let Some(skip_deletion) = args.skip_deletion {
        config.sample.skip_deletion = skip_deletion;
    }
    config.sample.validate()?;

    let service = connect(&config)?;
    let clock = Arc::new(SystemClock::new());
    let mut printer = Printer::stdout();

    match args.sample_type {
        SampleType::Basic => {
            let summary = BasicSample::new(service, clock, config.sample)
                .run(&mut printer)
                .await?;
            println!(
                "✅ Basic sample finished ({} upsert steps, cleaned up: {})",
                summary.upsert.steps.len(),
                summary.cleaned_up
            );
        }
        SampleType::CompositePartitionKey => {
            CompositePartitionKeySample::new(service, clock, config.sample)
                .run(&mut printer)
                .await?;
            println!("✅ Composite partition key sample finished");
        }
        SampleType::Cleanup => {
            let lifecycle = Lifecycle::new(service, config.sample.page_size);
            Cleanup::new(lifecycle, config.sample).run(&mut printer).await?;
            println!("✅ Cleanup finished");
        }
    }
    Ok(())
}

/// Database commands
async fn db_command(config: AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let lifecycle = Lifecycle::new(connect(&config)?, config.sample.page_size);
    let mut printer = Printer::stdout();

    match command {
        DbCommands::Create { name, kms_key_id } => {
            let outcome = lifecycle.create_database(&name, kms_key_id).await?;
            printer.outcome("Create database", &outcome)?;
        }
        DbCommands::Describe { name } => {
            let outcome = lifecycle.describe_database(&name).await?;
            printer.outcome("Describe database", &outcome)?;
        }
        DbCommands::List => {
            let databases = lifecycle.list_databases().await?;
            if databases.is_empty() {
                println!("No databases found.");
            } else {
                println!("Databases ({})", databases.len());
                println!("───────────────────────────────");
                for db in databases {
                    println!("  • {} ({} tables)", db.database_name, db.table_count);
                }
            }
        }
        DbCommands::Update { name, kms_key_id } => {
            let outcome = lifecycle.update_database(&name, Some(&kms_key_id)).await?;
            printer.outcome("Update database", &outcome)?;
        }
        DbCommands::Delete { name } => {
            let outcome = lifecycle.delete_database(&name).await?;
            printer.outcome("Delete database", &outcome)?;
        }
    }
    Ok(())
}

/// Table commands
async fn table_command(config: AppConfig, command: TableCommands) -> anyhow::Result<()> {
    let lifecycle = Lifecycle::new(connect(&config)?, config.sample.page_size);
    let mut printer = Printer::stdout();

    match command {
        TableCommands::Create { db, name, retention } => {
            let outcome = lifecycle
                .create_table(&db, &name, retention.properties(), None)
                .await?;
            printer.outcome("Create table", &outcome)?;
        }
        TableCommands::Describe { db, name } => {
            let outcome = lifecycle.describe_table(&db, &name).await?;
            printer.outcome("Describe table", &outcome)?;
        }
        TableCommands::List { db } => {
            let outcome = lifecycle.list_tables(&db).await?;
            printer.outcome("List tables", &outcome)?;
        }
        TableCommands::Update { db, name, retention } => {
            let outcome = lifecycle
                .update_table(&db, &name, Some(retention.properties()), None)
                .await?;
            printer.outcome("Update table", &outcome)?;
        }
        TableCommands::Delete { db, name } => {
            let outcome = lifecycle.delete_table(&db, &name).await?;
            printer.outcome("Delete table", &outcome)?;
        }
    }
    Ok(())
}
