//! Licencias CLI
//!
//! Command-line front end for the leave-records agent:
//! - `chat`: interactive question loop
//! - `ask`: one question, one answer
//! - `query`: run the records tool directly, no LLM involved
//! - `fields`: show the field catalog

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use licencias_agent::{Agent, AgentAnswer, AgentConfig, LlmConfig};
use licencias_tool::catalog;
use licencias_tool::contract::{
    FieldSelection, ToolArgs, DEFAULT_ENTITY_ID, DEFAULT_LIMIT, DEFAULT_REPORT_ID,
};
use licencias_tool::{LeaveRecordsTool, ResultEnvelope, RukovoditelConfig};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

mod repl;

/// Grace period on top of the agent's own deadline.
const OUTER_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "licencias")]
#[command(
    author,
    version,
    about = "Asistente de consultas sobre licencias de encargados"
)]
struct Cli {
    /// Load environment variables from this file (in addition to `./.env`).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `licencias_tool=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session. Type `salir` to leave.
    Chat,

    /// Ask a single question and print the answer.
    Ask {
        question: String,

        /// Print the full answer object as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Query the records API directly, without the LLM.
    Query(QueryArgs),

    /// List the known field ids and their display names.
    Fields,
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long, default_value_t = DEFAULT_ENTITY_ID)]
    entity_id: u32,

    #[arg(long, default_value_t = DEFAULT_REPORT_ID, conflicts_with = "no_report")]
    reports_id: u32,

    /// Send the query without a report id.
    #[arg(long)]
    no_report: bool,

    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: u32,

    /// Comma-separated field ids.
    #[arg(long, default_value = catalog::DEFAULT_SELECT_FIELDS)]
    fields: String,

    /// Extra filter as `field_id=value`; repeatable.
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Print the raw envelope as JSON.
    #[arg(long)]
    json: bool,
}

impl QueryArgs {
    fn to_tool_args(&self) -> ToolArgs {
        let filters = (!self.filters.is_empty()).then(|| {
            self.filters
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<String, Value>>()
        });
        ToolArgs {
            entity_id: self.entity_id,
            reports_id: (!self.no_report).then_some(self.reports_id),
            limit: self.limit,
            select_fields: FieldSelection::Joined(self.fields.clone()),
            filters,
        }
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field id in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    load_env(cli.env_file.as_ref())?;
    init_tracing(cli.log_level.as_deref())?;

    let runtime = Runtime::new().context("failed to start async runtime")?;

    match cli.command {
        Commands::Chat => {
            let agent = build_agent()?;
            repl::cmd_chat(&runtime, &agent)?;
        }
        Commands::Ask { question, json } => {
            let agent = build_agent()?;
            let answer = answer_blocking(&runtime, &agent, &question);
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Query(args) => {
            let tool = LeaveRecordsTool::from_config(&RukovoditelConfig::from_env())?;
            let envelope = runtime.block_on(tool.run_args(args.to_tool_args()));
            if args.json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                print_envelope(&args, &envelope)?;
            }
        }
        Commands::Fields => cmd_fields(),
    }

    Ok(())
}

fn load_env(env_file: Option<&PathBuf>) -> Result<()> {
    // A missing ./.env is fine; an explicit --env-file must exist.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(anyhow!("failed to read .env: {e}"));
        }
    }
    if let Some(path) = env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to read env file {}", path.display()))?;
    }
    Ok(())
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| anyhow!("invalid --log-level `{level}`: {e}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn build_agent() -> Result<Agent> {
    let llm = LlmConfig::from_env()
        .context("no se puede iniciar el agente sin GROQ_API_KEY (configúrala en .env)")?;
    let tool = LeaveRecordsTool::from_config(&RukovoditelConfig::from_env())?;
    let agent = Agent::groq(llm, tool, AgentConfig::default())?;
    tracing::info!(model = agent.model_name(), "agent ready");
    Ok(agent)
}

/// Run one turn on the runtime with an outer bound slightly above the
/// agent's own deadline.
pub(crate) fn answer_blocking(runtime: &Runtime, agent: &Agent, question: &str) -> AgentAnswer {
    let outer = agent.config().turn_timeout + OUTER_TIMEOUT_SLACK;
    runtime.block_on(async {
        match tokio::time::timeout(outer, agent.run(question)).await {
            Ok(answer) => answer,
            Err(_) => AgentAnswer::timed_out(),
        }
    })
}

pub(crate) fn print_answer(answer: &AgentAnswer) {
    println!("\n{} {}", "Respuesta:".green().bold(), answer.response);
    if answer.tool_used {
        if let Some(result) = &answer.tool_result {
            println!("{} {}", "Resultado de herramienta:".cyan(), result);
        }
    }
}

fn print_envelope(args: &QueryArgs, envelope: &ResultEnvelope) -> Result<()> {
    let rule = "=".repeat(80);
    println!("{rule}");
    println!("Consulta de licencias de encargados:");
    println!("  Entidad: {}", args.entity_id);
    if args.no_report {
        println!("  Reporte: (ninguno)");
    } else {
        println!("  Reporte: {}", args.reports_id);
    }
    println!("  Límite: {} registros", args.limit);
    println!("  Campos: {}", args.fields);
    for (k, v) in &args.filters {
        println!("  Filtro: {k} = {v}");
    }
    println!("{rule}");

    println!("\n{}", "Resultado:".bold());
    match envelope.error() {
        Some(error) => println!("{} {error}", "Error:".red().bold()),
        None => {
            let records = envelope.records();
            println!("Se encontraron {} licencias de encargados:", records.len());
            for (i, record) in records.iter().enumerate() {
                println!("\n--- Licencia {} ---", i + 1);
                for (field, value) in record.iter() {
                    println!("{field}: {}", display_value(value));
                }
            }
        }
    }

    let metadata = serde_json::to_value(&envelope.metadata)?;
    println!("\n{}", "Metadatos:".bold());
    println!(
        "  Éxito: {}",
        if envelope.success() { "Sí".green() } else { "No".red() }
    );
    if let Some(ms) = metadata["response_time_ms"].as_u64() {
        println!("  Tiempo de respuesta: {ms} ms");
    }
    println!(
        "  Timestamp: {}",
        metadata["timestamp"].as_str().unwrap_or("N/A")
    );
    if let Some(count) = metadata["record_count"].as_u64() {
        println!("  Registros encontrados: {count}");
    }
    if let Some(kind) = metadata["error_kind"].as_str() {
        println!("  Tipo de error: {kind}");
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cmd_fields() {
    println!("{}", "Campos conocidos:".bold());
    for entry in catalog::entries() {
        println!("  {}: {}", entry.id.cyan(), entry.name);
    }
}
