#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use orion::OrionConfig;
use orion::domain::access::{allowed_fields, scope_read, validate_roles};
use orion_db::{DialectKind, SelectSpec, SqlBuilder, SqlQuery, SqlValue};
use orion_query::ast::Condition;
use orion_query::{Action, Join, parse_encoded};
use orion_security::{AccessMode, RequestContext};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Orion - generic REST data-access core
#[derive(Parser)]
#[command(name = "orion")]
#[command(about = "Orion - validate entity configuration and render the SQL it produces")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and the entity schema, then exit
    Check,
    /// Print effective configuration (JSON) and exit
    PrintConfig,
    /// Render the statement a list or count request would run
    Sql(SqlArgs),
}

#[derive(Args)]
struct SqlArgs {
    /// Entity to read
    entity: String,

    /// URL-encoded condition, as it appears in the query string
    #[arg(long, default_value = "")]
    condition: String,

    /// Order-by token: `field` or `~field` for descending
    #[arg(long, default_value = "")]
    order_by: String,

    #[arg(long, default_value_t = 0)]
    skip: i64,

    #[arg(long)]
    take: Option<i64>,

    /// Include rich-text columns
    #[arg(long)]
    full: bool,

    /// Render the count statement instead of the select
    #[arg(long)]
    count: bool,

    /// Dialect override (mssql or mysql); defaults to database.engine
    #[arg(long)]
    dialect: Option<DialectKind>,

    /// Caller identity
    #[arg(long)]
    user_id: Option<i64>,

    /// Caller role, repeatable
    #[arg(long = "role", default_value = "guest")]
    roles: Vec<String>,

    /// Force private access mode
    #[arg(long)]
    private: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    if let Some(path) = cli.config.as_deref()
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => {
            for line in check(&config)? {
                println!("{line}");
            }
        }
        Commands::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Sql(args) => {
            let rendered = render(&config, &args)?;
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }
    Ok(())
}

fn init_logging(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<OrionConfig> {
    let config = OrionConfig::load(path).context("failed to load configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;
    tracing::info!(
        entities = config.entities.len(),
        engine = %config.database.engine,
        "configuration loaded"
    );
    Ok(config)
}

/// One summary line per entity, ending with a verdict.
fn check(config: &OrionConfig) -> Result<Vec<String>> {
    let schema = orion::build_schema(config, Vec::new()).context("invalid entity configuration")?;
    let mut lines = Vec::new();
    for entity in schema.entities() {
        let joins = Join::for_entity(&schema, entity.name())?;
        let aliases: Vec<&str> = joins.iter().map(|j| j.target_alias.as_str()).collect();
        lines.push(format!(
            "{} -> {} ({} fields; joins: {})",
            entity.name(),
            entity.table(),
            entity.fields().len(),
            if aliases.is_empty() {
                "none".to_owned()
            } else {
                aliases.join(", ")
            }
        ));
    }
    lines.push(format!(
        "Configuration is valid ({} entities, engine {})",
        lines.len(),
        config.database.engine
    ));
    Ok(lines)
}

fn render(config: &OrionConfig, args: &SqlArgs) -> Result<Value> {
    let schema = orion::build_schema(config, Vec::new()).context("invalid entity configuration")?;
    let entity = schema.require(&args.entity)?;

    let mode = if args.private {
        AccessMode::Private
    } else {
        config.access.default_mode
    };
    let mut builder = RequestContext::builder(&args.entity)
        .roles(args.roles.iter().cloned())
        .mode(mode);
    if let Some(id) = args.user_id {
        builder = builder.user_id(id);
    }
    let mut ctx = builder.build();

    let condition = parse_encoded(entity, &args.condition)?.unwrap_or_else(Condition::always_true);
    let condition = scope_read(&mut ctx, entity, condition)?;
    validate_roles(&ctx, entity, Action::Read)?;
    let joins = Join::for_entity(&schema, entity.name())?;

    let dialect = args.dialect.unwrap_or(config.database.engine);
    let sql = SqlBuilder::new(dialect);
    let query = if args.count {
        sql.count(entity, &condition, &joins)
    } else {
        let fields = allowed_fields(entity, Action::Read);
        let take = orion::ServiceConfig::from(config.pagination).clamp_take(args.take);
        sql.select(&SelectSpec {
            entity,
            fields: &fields,
            condition: &condition,
            joins: &joins,
            order_by: &args.order_by,
            skip: args.skip.max(0),
            take,
            full: args.full,
        })?
    };
    tracing::debug!(sql = %query.sql, "rendered");
    Ok(to_json(dialect, &query))
}

fn to_json(dialect: DialectKind, query: &SqlQuery) -> Value {
    let params: Vec<Value> = query
        .params
        .iter()
        .map(|p| match p {
            SqlValue::Null => Value::Null,
            SqlValue::Int(i) => json!(i),
            SqlValue::Float(f) => json!(f),
            SqlValue::Text(s) => json!(s),
        })
        .collect();
    json!({
        "dialect": dialect.as_str(),
        "sql": query.sql,
        "params": params,
    })
}
