use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use futures::executor::block_on;
use nervusdb_ogm::{
    OgmConfig, PropertyMap, Registry, SchemaDefaults, SchemaDefinition, SchemaValidator,
    ValidationMode, Validator, Value, fill_defaults,
};
use nervusdb_ogm_query::{
    CascadeCompiler, CompiledQuery, EagerCompiler, ORIGINAL_ALIAS, QueryBuilder, WriteCompiler,
    WriteMode, cascade, ddl,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nervusdb-ogm", version, arg_required_else_help = true)]
struct Cli {
    /// JSON schema document declaring every model
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// JSON file overriding depth limits and the overflow policy
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, global = true, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the eager projection returned for a model
    Eager(ModelArgs),
    /// Compile a nested create
    Create(WriteArgs),
    /// Compile a nested merge
    Merge(WriteArgs),
    /// Compile a cascading delete of one node
    Delete(DeleteArgs),
    /// Compile a delete of every node of a model
    DeleteAll(ModelArgs),
    /// List the constraint and index statements for the schema
    SchemaInstall,
    SchemaDrop,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Cypher,
}

#[derive(Parser)]
struct ModelArgs {
    #[arg(long)]
    model: String,
}

#[derive(Parser)]
struct WriteArgs {
    #[arg(long)]
    model: String,

    /// Payload as a JSON object (e.g. '{"name":"alice","employer":"Acme"}')
    #[arg(long)]
    props_json: String,
}

#[derive(Parser)]
struct DeleteArgs {
    #[arg(long)]
    model: String,

    /// Identity of the node to delete
    #[arg(long)]
    id: i64,

    /// Overrides the configured cascade depth
    #[arg(long)]
    depth: Option<usize>,
}

fn load_registry(path: Option<&Path>) -> Result<Registry> {
    let Some(path) = path else {
        bail!("--schema is required");
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;
    let registry = SchemaDefinition::from_json(&raw)
        .and_then(SchemaDefinition::into_registry)
        .with_context(|| format!("invalid schema in {}", path.display()))?;
    debug!(models = registry.len(), "schema loaded");
    Ok(registry)
}

fn load_config(path: Option<&Path>) -> Result<OgmConfig> {
    let Some(path) = path else {
        return Ok(OgmConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    OgmConfig::from_json(&raw).with_context(|| format!("invalid config in {}", path.display()))
}

fn parse_props(raw: &str) -> Result<PropertyMap> {
    let parsed: serde_json::Value =
        serde_json::from_str(raw).context("props_json must be a JSON object")?;
    match Value::from(parsed) {
        Value::Map(map) => Ok(map),
        other => bail!("props_json must be a JSON object, got {}", other.type_name()),
    }
}

fn compile_write(
    registry: &Registry,
    config: &OgmConfig,
    mode: WriteMode,
    args: &WriteArgs,
) -> Result<CompiledQuery> {
    let model = registry.model(&args.model)?;
    let props = block_on(fill_defaults(
        &SchemaDefaults,
        model,
        parse_props(&args.props_json)?,
    ));
    let props = block_on(SchemaValidator.validate(model, props, ValidationMode::Create))?;

    let mut builder = QueryBuilder::new();
    WriteCompiler::new(registry)
        .with_max_depth(config.max_write_depth)
        .with_overflow(config.write_overflow)
        .compile(&mut builder, mode, ORIGINAL_ALIAS, model, &props)?;
    let projection = EagerCompiler::new(registry)
        .with_max_depth(config.max_eager_depth)
        .return_expression(ORIGINAL_ALIAS, model)?;
    builder.with([ORIGINAL_ALIAS]).returning([projection]);
    Ok(builder.build())
}

fn compile(cli: &Cli) -> Result<Vec<CompiledQuery>> {
    let registry = load_registry(cli.schema.as_deref())?;
    let config = load_config(cli.config.as_deref())?;

    Ok(match &cli.command {
        Commands::Eager(args) => {
            let model = registry.model(&args.model)?;
            let projection = EagerCompiler::new(&registry)
                .with_max_depth(config.max_eager_depth)
                .compile(ORIGINAL_ALIAS, model)?;
            vec![CompiledQuery::new(projection, PropertyMap::new())]
        }
        Commands::Create(args) => vec![compile_write(&registry, &config, WriteMode::Create, args)?],
        Commands::Merge(args) => vec![compile_write(&registry, &config, WriteMode::Merge, args)?],
        Commands::Delete(args) => {
            let model = registry.model(&args.model)?;
            let mut builder = QueryBuilder::new();
            CascadeCompiler::new(&registry)
                .with_max_depth(args.depth.unwrap_or(config.max_cascade_depth))
                .compile(&mut builder, ORIGINAL_ALIAS, model, args.id)?;
            vec![builder.build()]
        }
        Commands::DeleteAll(args) => {
            let model = registry.model(&args.model)?;
            let mut builder = QueryBuilder::new();
            cascade::delete_all(&mut builder, ORIGINAL_ALIAS, model);
            vec![builder.build()]
        }
        Commands::SchemaInstall => ddl::install(&registry, config.enterprise),
        Commands::SchemaDrop => ddl::drop(&registry, config.enterprise),
    })
}

fn params_to_json(params: &PropertyMap) -> serde_json::Value {
    serde_json::Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

fn print(queries: &[CompiledQuery], format: OutputFormat) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            for query in queries {
                let record = serde_json::json!({
                    "query": query.query,
                    "params": params_to_json(&query.params),
                });
                serde_json::to_writer(&mut stdout, &record)?;
                stdout.write_all(b"\n")?;
            }
        }
        OutputFormat::Cypher => {
            for query in queries {
                writeln!(stdout, "{};", query.query)?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let queries = compile(&cli)?;
    print(&queries, cli.format)
}
