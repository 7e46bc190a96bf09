//! schemaforge CLI - generate migration scripts and model stubs from a live
//! database schema.

mod writer;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use schemaforge::{
    parse_tables, Config, Connection, ConnectionConfig, DriverTag, GeneratedFile,
    MigrationEmitter, MigrationOptions, ModelEmitter, ParserImpl, RelationshipDetector, Result,
    SchemaComparator, SchemaError, SchemaParser, ScriptArchive, Table, TypeMap,
};
use schemaforge::drivers::MssqlConnectionManager;
use tracing::{info, Level};

/// Exit code when a diff finds drift.
const EXIT_OUT_OF_SYNC: u8 = 10;

/// Connection pool acquisition timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "schemaforge")]
#[command(about = "Generate migration scripts and model stubs from a live database schema")]
#[command(version)]
struct Cli {
    /// Path to YAML or JSON configuration file
    #[arg(short, long, default_value = "schemaforge.yaml")]
    config: PathBuf,

    /// Connection name overriding the configured default
    #[arg(long)]
    connection: Option<String>,

    /// Overwrite existing output files
    #[arg(long)]
    force: bool,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full generation: migration scripts and model stubs
    Schema,

    /// Generate migration scripts only
    Migrations {
        /// Comma-separated table names to include
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Print a drift report instead of writing files
        #[arg(long)]
        diff: bool,

        /// Regenerate everything, overwriting the existing archive
        #[arg(long)]
        fresh: bool,

        /// Print to stdout instead of writing files
        #[arg(long)]
        preview: bool,

        /// Emit foreign keys as separate edge-only scripts
        #[arg(long)]
        separate_fk: bool,
    },

    /// Generate model stubs only
    Models {
        /// Table to include (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Print to stdout instead of writing files
        #[arg(long)]
        preview: bool,

        /// Skip relationship methods
        #[arg(long)]
        no_relationships: bool,

        /// Skip query scopes
        #[arg(long)]
        no_scopes: bool,
    },

    /// Parse the schema and print it without writing files
    Preview,

    /// Compare the live schema against the migration archive
    Diff,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let conn_config = config.active_connection(cli.connection.as_deref())?.clone();
    let connection = connect(&conn_config).await?;
    let parser = ParserImpl::from_connection(connection, conn_config.schema.clone());

    let session = Session {
        cli: &cli,
        config: &config,
        parser,
    };

    match &cli.command {
        Commands::Schema => session.run_schema().await,
        Commands::Migrations {
            tables,
            diff,
            fresh,
            preview,
            separate_fk,
        } => {
            session
                .run_migrations(tables, *diff, *fresh, *preview, *separate_fk)
                .await
        }
        Commands::Models {
            tables,
            preview,
            no_relationships,
            no_scopes,
        } => {
            session
                .run_models(tables, *preview, *no_relationships, *no_scopes)
                .await
        }
        Commands::Preview => session.run_preview().await,
        Commands::Diff => session.run_diff().await,
    }
}

struct Session<'a> {
    cli: &'a Cli,
    config: &'a Config,
    parser: ParserImpl,
}

impl Session<'_> {
    async fn load_tables(&self, requested: &[String]) -> Result<Vec<Table>> {
        let names = if requested.is_empty() {
            self.parser.list_tables(&self.config.exclude_tables).await?
        } else {
            requested.to_vec()
        };
        info!(count = names.len(), "parsing tables");
        parse_tables(&self.parser, &names).await
    }

    fn type_map(&self) -> TypeMap {
        let mut builder = TypeMap::builder();
        if let Some(overrides) = self
            .config
            .type_mappings_for(self.parser.driver().as_str())
        {
            builder = builder.with_mappings(overrides);
        }
        builder.build()
    }

    fn migration_files(&self, tables: &[Table], separate_fk: bool) -> Vec<GeneratedFile> {
        let type_map = self.type_map();
        let emitter = MigrationEmitter::new(
            &type_map,
            MigrationOptions {
                separate_foreign_keys: separate_fk
                    || self.config.features.separate_foreign_keys,
                indent: self.config.formatting.indent.clone(),
            },
        );
        emitter.generate(tables, chrono::Local::now().naive_local())
    }

    /// Emit stubs for `selected`; relationship detection runs against `all`
    /// so inbound relationships are not lost when only a subset is emitted.
    fn model_files(
        &self,
        selected: &[&Table],
        all: &[Table],
        no_relationships: bool,
        no_scopes: bool,
    ) -> Vec<GeneratedFile> {
        let type_map = self.type_map();
        let mut models_config = self.config.models.clone();
        if no_scopes {
            models_config.generate_scopes = false;
        }
        let emitter = ModelEmitter::new(&models_config, &self.config.formatting, &type_map);
        let detector = RelationshipDetector::new(self.config.features.detect_polymorphic);

        selected
            .iter()
            .map(|table| {
                let relationships = if no_relationships
                    || !self.config.models.generate_relationships
                {
                    Vec::new()
                } else {
                    detector.detect(table, all)
                };
                emitter.generate(table, &relationships)
            })
            .collect()
    }

    async fn run_schema(&self) -> Result<ExitCode> {
        let tables = self.load_tables(&[]).await?;

        let migrations = self.migration_files(&tables, false);
        let report = writer::write_files(&self.config.migrations_path, &migrations, self.cli.force)?;
        print_report("migrations", &report);

        let selected: Vec<&Table> = tables.iter().collect();
        let models = self.model_files(&selected, &tables, false, false);
        let report = writer::write_files(&self.config.models.path, &models, self.cli.force)?;
        print_report("models", &report);

        Ok(ExitCode::SUCCESS)
    }

    async fn run_migrations(
        &self,
        requested: &[String],
        diff: bool,
        fresh: bool,
        preview: bool,
        separate_fk: bool,
    ) -> Result<ExitCode> {
        let tables = self.load_tables(requested).await?;

        if diff {
            return self.print_drift(&tables);
        }

        let files = self.migration_files(&tables, separate_fk);
        if preview {
            print_files(&files, self.cli.json)?;
            return Ok(ExitCode::SUCCESS);
        }

        let force = self.cli.force || fresh;
        let report = writer::write_files(&self.config.migrations_path, &files, force)?;
        print_report("migrations", &report);
        Ok(ExitCode::SUCCESS)
    }

    async fn run_models(
        &self,
        requested: &[String],
        preview: bool,
        no_relationships: bool,
        no_scopes: bool,
    ) -> Result<ExitCode> {
        let all = self.load_tables(&[]).await?;
        let selected: Vec<&Table> = if requested.is_empty() {
            all.iter().collect()
        } else {
            for name in requested {
                if !all.iter().any(|t| &t.name == name) {
                    return Err(SchemaError::TableNotFound(name.clone()));
                }
            }
            all.iter().filter(|t| requested.contains(&t.name)).collect()
        };
        let files = self.model_files(&selected, &all, no_relationships, no_scopes);

        if preview {
            print_files(&files, self.cli.json)?;
            return Ok(ExitCode::SUCCESS);
        }

        let report = writer::write_files(&self.config.models.path, &files, self.cli.force)?;
        print_report("models", &report);
        Ok(ExitCode::SUCCESS)
    }

    async fn run_preview(&self) -> Result<ExitCode> {
        let tables = self.load_tables(&[]).await?;
        if self.cli.json {
            println!("{}", serde_json::to_string_pretty(&tables)?);
        } else {
            for table in &tables {
                println!(
                    "{} ({} columns, {} indexes, {} foreign keys)",
                    table.name,
                    table.columns.len(),
                    table.indexes.len(),
                    table.foreign_keys.len()
                );
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn run_diff(&self) -> Result<ExitCode> {
        let tables = self.load_tables(&[]).await?;
        self.print_drift(&tables)
    }

    fn print_drift(&self, tables: &[Table]) -> Result<ExitCode> {
        let archive = ScriptArchive::scan_dir(&self.config.migrations_path)?;
        let drift = SchemaComparator::compare_with_migrations(tables, &archive);

        if self.cli.json {
            println!("{}", serde_json::to_string_pretty(&drift)?);
        } else if drift.is_in_sync() {
            println!("Schema is in sync with the migration archive.");
        } else {
            if !drift.new.is_empty() {
                println!("New tables: {}", drift.new.join(", "));
            }
            if !drift.modified.is_empty() {
                println!("Modified tables: {}", drift.modified.join(", "));
            }
            if !drift.removed.is_empty() {
                println!("Removed tables: {}", drift.removed.join(", "));
            }
        }

        if drift.is_in_sync() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(EXIT_OUT_OF_SYNC))
        }
    }
}

fn print_files(files: &[GeneratedFile], json: bool) -> Result<()> {
    if json {
        let listing: Vec<serde_json::Value> = files
            .iter()
            .map(|f| serde_json::json!({"name": f.name, "content": f.content}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for file in files {
            println!("// === {} ===", file.name);
            println!("{}", file.content);
        }
    }
    Ok(())
}

fn print_report(kind: &str, report: &writer::WriteReport) {
    println!("{}: {} written, {} skipped", kind, report.written, report.skipped.len());
    for name in &report.skipped {
        println!("  skipped {}", name);
    }
}

async fn connect(config: &ConnectionConfig) -> Result<Connection> {
    let driver = DriverTag::from_str(&config.driver)?;
    match driver {
        DriverTag::Mysql => {
            let options = sqlx::mysql::MySqlConnectOptions::new()
                .host(&config.host)
                .port(default_port(config.port, 3306))
                .database(&config.database)
                .username(&config.user)
                .password(&config.password);
            let pool = sqlx::mysql::MySqlPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(POOL_CONNECTION_TIMEOUT)
                .connect_with(options)
                .await?;
            info!(
                "Connected to MySQL: {}:{}/{}",
                config.host, config.port, config.database
            );
            Ok(Connection::MySql(pool))
        }
        DriverTag::Pgsql => {
            let options = sqlx::postgres::PgConnectOptions::new()
                .host(&config.host)
                .port(default_port(config.port, 5432))
                .database(&config.database)
                .username(&config.user)
                .password(&config.password);
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(POOL_CONNECTION_TIMEOUT)
                .connect_with(options)
                .await?;
            info!(
                "Connected to PostgreSQL: {}:{}/{}",
                config.host, config.port, config.database
            );
            Ok(Connection::Postgres(pool))
        }
        DriverTag::Sqlite => {
            let path = config.path.as_ref().ok_or_else(|| {
                SchemaError::Config("sqlite connection requires a 'path'".to_string())
            })?;
            let options = sqlx::sqlite::SqliteConnectOptions::new().filename(path);
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            info!("Connected to SQLite: {}", path.display());
            Ok(Connection::Sqlite(pool))
        }
        DriverTag::Sqlsrv => {
            let manager = MssqlConnectionManager::new(
                config.host.clone(),
                default_port(config.port, 1433),
                config.database.clone(),
                config.user.clone(),
                config.password.clone(),
            );
            let pool = bb8::Pool::builder()
                .max_size(4)
                .connection_timeout(POOL_CONNECTION_TIMEOUT)
                .build(manager)
                .await?;
            info!(
                "Connected to SQL Server: {}:{}/{}",
                config.host, config.port, config.database
            );
            Ok(Connection::Mssql(pool))
        }
    }
}

fn default_port(configured: u16, fallback: u16) -> u16 {
    if configured == 0 {
        fallback
    } else {
        configured
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<()> {
    let level = match verbosity {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            return Err(SchemaError::Config(format!(
                "unknown verbosity '{}'",
                other
            )))
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().init(),
        "text" => builder.init(),
        other => {
            return Err(SchemaError::Config(format!(
                "unknown log format '{}'",
                other
            )))
        }
    }

    Ok(())
}
