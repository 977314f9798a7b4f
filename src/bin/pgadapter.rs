//! pgadapter — schema reconciliation and filter compilation CLI
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL for a filter (no database needed)
//! pgadapter compile posts '{"where": {"title": {"like": "%Test%"}}, "limit": 10}'
//!
//! # Show pending DDL, then apply it
//! pgadapter plan
//! pgadapter migrate
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use pgadapter::prelude::*;
use pgadapter::schema::EntitySchema;
use pgadapter::transpiler::dml;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgadapter")]
#[command(version)]
#[command(about = "PostgreSQL schema reconciliation and filter compilation", long_about = None)]
#[command(after_help = "EXAMPLES:
    pgadapter compile posts '{\"where\": {\"userId\": {\"inq\": [1, 2]}}}'
    pgadapter find posts '{\"order\": \"id DESC\", \"limit\": 5}' --format json
    pgadapter --database-url postgres://localhost/blog migrate")]
struct Cli {
    /// Config file with connection settings and entity declarations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database connection URL (overrides the config file)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SELECT a filter compiles to
    Compile {
        entity: String,
        /// Filter as JSON: {"where": ..., "order": ..., "limit": ..., "offset": ...}
        #[arg(default_value = "{}")]
        filter: String,
    },
    /// Run a filter and print the rows
    Find {
        entity: String,
        #[arg(default_value = "{}")]
        filter: String,
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show the DDL reconciliation would run
    Plan,
    /// Reconcile the database with the declared entities
    Migrate,
    /// Exit non-zero when the database differs from the declarations
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<AdapterConfig> {
    let path = cli.config.clone().or_else(AdapterConfig::default_path);
    let config = match path {
        Some(path) if path.exists() => AdapterConfig::from_file(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        Some(path) if cli.config.is_some() => bail!("config file {} not found", path.display()),
        _ => AdapterConfig::default(),
    };
    Ok(match &cli.database_url {
        Some(url) => config.with_database_url(url),
        None => config,
    })
}

async fn connect(config: &AdapterConfig) -> Result<PgAdapter<PgExecutor>> {
    let mut registry = Registry::new();
    config.register_entities(&mut registry)?;
    if registry.is_empty() {
        println!("{}", "⚠ No entities declared in the config file".yellow());
    }
    let executor = PgExecutor::from_config(&config.connection)
        .await
        .context("connecting to the database")?;
    Ok(PgAdapter::with_registry(executor, registry))
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Compile { entity, filter } => {
            let mut registry = Registry::new();
            config.register_entities(&mut registry)?;
            let filter = parse_filter(filter)?;
            let sql = dml::build_select(registry.entity(entity)?, &filter)?;
            println!("{}", "Generated SQL:".green().bold());
            println!("{}", sql.white());
        }
        Commands::Find {
            entity,
            filter,
            format,
        } => {
            let db = connect(&config).await?;
            let rows = db.find_all(entity, &parse_filter(filter)?).await?;
            print_rows(db.registry().entity(entity)?, &rows, format)?;
        }
        Commands::Plan => {
            let db = connect(&config).await?;
            let mut pending = 0;
            for (entity, plan) in db.plan().await? {
                if plan.is_empty() {
                    println!("{} {}", "✓".green(), entity.white());
                    continue;
                }
                let label = match plan {
                    EntityPlan::Create { .. } => "create",
                    EntityPlan::Alter { .. } => "alter",
                };
                println!("{} {} ({})", "→".yellow(), entity.white().bold(), label.cyan());
                for statement in plan.statements() {
                    pending += 1;
                    println!("    {};", statement.dimmed());
                }
            }
            println!();
            println!("{} pending statement(s)", pending.to_string().cyan());
        }
        Commands::Migrate => {
            let db = connect(&config).await?;
            db.reconcile_schema().await?;
            println!(
                "{} {} entit(ies) reconciled",
                "✓".green(),
                db.registry().len().to_string().cyan()
            );
        }
        Commands::Check => {
            let db = connect(&config).await?;
            if db.is_schema_current().await? {
                println!("{}", "✓ Schema is current".green().bold());
            } else {
                println!("{}", "✗ Schema differs; run `pgadapter plan`".yellow().bold());
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn parse_filter(text: &str) -> Result<Filter> {
    let json: serde_json::Value = serde_json::from_str(text).context("filter is not valid JSON")?;
    Ok(Filter::from_json(json)?)
}

/// Print rows in the entity's declared column order.
fn print_rows(entity: &EntitySchema, rows: &[Row], format: &OutputFormat) -> Result<()> {
    if rows.is_empty() {
        println!("{}", "(no rows)".dimmed());
        return Ok(());
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Table => {
            let columns: Vec<&str> = entity.attributes.iter().map(|a| a.name.as_str()).collect();
            let mut lines = table_lines(&columns, rows).into_iter();
            if let Some(header) = lines.next() {
                println!("{}", header.bold());
            }
            for line in lines {
                println!("{}", line);
            }
            println!("{} {} row(s)", "→".cyan(), rows.len());
        }
    }
    Ok(())
}

/// Header plus one line per row, cells left-aligned to the widest value.
fn table_lines(columns: &[&str], rows: &[Row]) -> Vec<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell(row.get(*c))).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| cells.iter().map(|r| r[i].chars().count()).fold(c.len(), usize::max))
        .collect();
    let line = |values: Vec<String>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<w$}", v, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    std::iter::once(line(columns.iter().map(|c| c.to_string()).collect()))
        .chain(cells.into_iter().map(line))
        .collect()
}

/// Strings print bare; everything else prints as JSON.
fn cell(value: Option<&serde_json::Value>) -> String {
    match value {
        None => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
