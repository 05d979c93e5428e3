//! oxide-grammar CLI
//!
//! Compiles JSON query descriptions into SQL for a chosen database engine.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use oxide_grammar::{Binding, Dialect, Grammar, GrammarConfig, Registry, Row};

/// Compile query descriptions into dialect-specific SQL.
#[derive(Parser)]
#[command(name = "oxide-grammar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding the grammar configuration.
    #[arg(short, long, env = "OXIDE_GRAMMAR_CONFIG")]
    config: Option<PathBuf>,

    /// Table prefix (overrides the configuration file).
    #[arg(short, long, env = "OXIDE_GRAMMAR_PREFIX")]
    prefix: Option<String>,

    /// Use the aliased MySQL upsert form.
    #[arg(long, env = "OXIDE_GRAMMAR_UPSERT_ALIAS")]
    upsert_alias: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query description.
    Compile {
        /// Target database engine.
        #[arg(short, long, default_value = "generic")]
        dialect: Dialect,

        /// Statement to compile from the description.
        #[arg(short, long, value_enum, default_value_t = Statement::Select)]
        statement: Statement,

        /// Print the SQL with its bindings substituted instead.
        #[arg(long)]
        inline: bool,

        /// Path to the JSON description.
        file: PathBuf,
    },

    /// Substitute bindings into parameterized SQL.
    Inline {
        /// Target database engine.
        #[arg(short, long, default_value = "generic")]
        dialect: Dialect,

        /// SQL with `?` placeholders.
        #[arg(long)]
        sql: String,

        /// JSON array of bindings.
        #[arg(long, default_value = "[]")]
        bindings: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Statement {
    Select,
    Exists,
    Insert,
    Update,
    Delete,
}

/// A query plus the values written by insert and update statements.
#[derive(Debug, Deserialize)]
struct Description {
    query: Registry,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    values: Row,
}

fn load_config(cli: &Cli) -> anyhow::Result<GrammarConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => GrammarConfig::new(),
    };
    if let Some(prefix) = &cli.prefix {
        config = config.with_table_prefix(prefix.clone());
    }
    if cli.upsert_alias {
        config = config.with_upsert_alias(true);
    }
    Ok(config)
}

fn load_description(path: &Path) -> anyhow::Result<Description> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid description {}", path.display()))
}

fn compile(
    grammar: &dyn Grammar,
    statement: Statement,
    description: &Description,
) -> anyhow::Result<(String, Vec<Binding>)> {
    let query = &description.query;
    let compiled = match statement {
        Statement::Select => query.to_sql(grammar)?,
        Statement::Exists => query.to_exists_sql(grammar)?,
        Statement::Insert => query.to_insert_sql(grammar, &description.rows)?,
        Statement::Update => query.to_update_sql(grammar, &description.values)?,
        Statement::Delete => query.to_delete_sql(grammar)?,
    };
    Ok(compiled)
}

fn render(
    grammar: &dyn Grammar,
    (sql, bindings): (String, Vec<Binding>),
    inline: bool,
) -> anyhow::Result<String> {
    if inline {
        return Ok(grammar.substitute_bindings_into_raw_sql(&sql, &bindings));
    }
    let bindings: Vec<serde_json::Value> = bindings.iter().map(Binding::to_json).collect();
    Ok(format!("{sql}\n{}", serde_json::to_string(&bindings)?))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli)?;
    debug!(prefix = %config.table_prefix, upsert_alias = config.use_upsert_alias, "loaded config");

    match &cli.command {
        Commands::Compile {
            dialect,
            statement,
            inline,
            file,
        } => {
            let grammar = dialect.grammar(config);
            let description = load_description(file)?;
            info!("Compiling {statement:?} for {dialect}");
            let compiled = compile(grammar.as_ref(), *statement, &description)?;
            println!("{}", render(grammar.as_ref(), compiled, *inline)?);
        }

        Commands::Inline {
            dialect,
            sql,
            bindings,
        } => {
            let grammar = dialect.grammar(config);
            let bindings: Vec<Binding> =
                serde_json::from_str(bindings).context("Bindings must be a JSON array")?;
            println!("{}", grammar.substitute_bindings_into_raw_sql(sql, &bindings));
        }
    }

    Ok(())
}
