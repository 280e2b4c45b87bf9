//! VIGIL CLI
//!
//! Regression verdicts over recorded LLM calls, from the command line.
//!
//! Exit status: 0 when every check passes, 1 on a FAIL verdict, golden
//! mismatch, divergence or tampered snapshot, 2 on a structural error.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;
mod config;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use commands::{CommandOutput, Outcome};
use config::{CliConfig, Overrides};
use console::style;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_core::{ExecutionId, GoldenKey, TraceId, VigilError};
use vigil_expect::TemplateRegistry;
use vigil_graph::NodeKey;
use vigil_store::{FileStore, StoreConfig};

const DEFAULT_TOP_N: usize = 3;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "VIGIL - deterministic regression verdicts for recorded LLM calls", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (JSON)
    #[arg(long, global = true, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Store file
    #[arg(long, global = true, env = "VIGIL_STORE")]
    store: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, env = "VIGIL_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load call records (JSON array or JSON lines) into the store
    Ingest {
        /// Records file
        file: PathBuf,
        /// Expectations file (one set, or a list of scoped entries) applied
        /// to records without a verdict
        #[arg(short, long)]
        expectations: Option<PathBuf>,
        /// Built-in template merged into the expectations (repeatable)
        #[arg(short, long = "template")]
        templates: Vec<String>,
        /// Re-evaluate records that already carry a verdict
        #[arg(long)]
        rejudge: bool,
    },
    /// List stored records
    List {
        /// Only this execution
        #[arg(short, long)]
        execution: Option<String>,
    },
    /// Show one record
    Show {
        /// Trace id
        trace_id: String,
    },
    /// Build an execution graph and aggregate its verdict
    Graph {
        /// Execution id
        execution_id: String,
    },
    /// Evidence path from a root to the first failing node
    Investigate {
        /// Execution id
        execution_id: String,
    },
    /// Latency totals, critical path and bottlenecks
    Analyze {
        /// Execution id
        execution_id: String,
        /// Bottlenecks to report
        #[arg(long)]
        top: Option<usize>,
    },
    /// Compare two executions of the same workflow
    Diff {
        /// Baseline execution
        execution_a: String,
        /// Compared execution
        execution_b: String,
        /// Node matching key: label, position or node_id
        #[arg(long, default_value = "label")]
        key: NodeKey,
    },
    /// Accept a PASS trace as the golden for its provider/model
    Bless {
        /// Trace id
        trace_id: String,
        /// Replace an existing golden
        #[arg(long)]
        force: bool,
    },
    /// Remove the golden for a provider/model
    Unbless {
        /// Provider
        provider: String,
        /// Model
        model: String,
    },
    /// List active goldens
    Goldens,
    /// Compare every golden against the latest matching record
    Check {
        /// Only consider records from this execution
        #[arg(short, long)]
        execution: Option<String>,
    },
    /// Seal an execution into a snapshot
    Export {
        /// Execution id
        execution_id: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify an exported snapshot
    Verify {
        /// Snapshot file
        file: PathBuf,
    },
    /// Inspect expectation templates and contracts
    #[command(subcommand)]
    Expectations(ExpectationCommands),
}

#[derive(Subcommand)]
enum ExpectationCommands {
    /// List built-in templates
    Templates,
    /// Describe an expectation set
    Describe {
        /// Expectations file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Built-in template (repeatable)
        #[arg(short, long = "template")]
        templates: Vec<String>,
        /// Render as a Markdown document with this title
        #[arg(long)]
        markdown: Option<String>,
    },
}

fn init_tracing(config: &CliConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log.level.clone().into());

    if config.log.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = CliConfig::resolve(
        cli.config.as_deref(),
        Overrides {
            store: cli.store.clone(),
            log_level: cli.log_level.clone(),
            log_json: cli.log_json,
        },
    )?;
    init_tracing(&config);

    match run(cli.command, &config) {
        Ok(outcome) => Ok(exit_code(outcome)),
        Err(report) => match report.downcast_ref::<VigilError>() {
            Some(err) => {
                eprintln!("{} {}", style("error").red().bold(), err.report());
                Ok(ExitCode::from(2))
            }
            None => Err(report),
        },
    }
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Pass => ExitCode::SUCCESS,
        Outcome::Fail => ExitCode::from(1),
    }
}

fn open_store(config: &StoreConfig) -> Result<FileStore> {
    Ok(FileStore::open(config.clone())?)
}

fn emit(output: CommandOutput) -> Result<Outcome> {
    println!("{}", serde_json::to_string_pretty(&output.body)?);
    if let Some(summary) = &output.summary {
        let badge = match output.outcome {
            Outcome::Pass => style("PASS").green().bold(),
            Outcome::Fail => style("FAIL").red().bold(),
        };
        eprintln!("{badge} {summary}");
    }
    Ok(output.outcome)
}

fn run(command: Commands, config: &CliConfig) -> Result<Outcome> {
    match command {
        Commands::Ingest {
            file,
            expectations,
            templates,
            rejudge,
        } => {
            let records = commands::parse_records(&fs::read_to_string(&file)?)?;
            let rules_text = expectations.map(fs::read_to_string).transpose()?;
            let templates = if rules_text.is_none() && templates.is_empty() {
                config.templates.clone()
            } else {
                templates
            };
            let rules = commands::resolve_selection(rules_text.as_deref(), &templates)?;
            let store = open_store(&config.store)?;
            emit(commands::ingest(&store, records, rules, rejudge)?)
        }
        Commands::List { execution } => {
            let store = open_store(&config.store)?;
            let execution = execution.map(ExecutionId::from);
            emit(commands::list(&store, execution.as_ref())?)
        }
        Commands::Show { trace_id } => {
            let store = open_store(&config.store)?;
            emit(commands::show(&store, &TraceId::from(trace_id))?)
        }
        Commands::Graph { execution_id } => {
            let store = open_store(&config.store)?;
            emit(commands::graph(&store, &ExecutionId::from(execution_id))?)
        }
        Commands::Investigate { execution_id } => {
            let store = open_store(&config.store)?;
            emit(commands::investigate(&store, &ExecutionId::from(execution_id))?)
        }
        Commands::Analyze { execution_id, top } => {
            let store = open_store(&config.store)?;
            let top_n = top.or(config.top_n).unwrap_or(DEFAULT_TOP_N);
            emit(commands::analyze(&store, &ExecutionId::from(execution_id), top_n)?)
        }
        Commands::Diff {
            execution_a,
            execution_b,
            key,
        } => {
            let store = open_store(&config.store)?;
            emit(commands::diff(
                &store,
                &ExecutionId::from(execution_a),
                &ExecutionId::from(execution_b),
                key,
            )?)
        }
        Commands::Bless { trace_id, force } => {
            let store = open_store(&config.store)?;
            emit(commands::bless(&store, &TraceId::from(trace_id), force)?)
        }
        Commands::Unbless { provider, model } => {
            let store = open_store(&config.store)?;
            emit(commands::unbless(&store, &GoldenKey::new(provider, model))?)
        }
        Commands::Goldens => {
            let store = open_store(&config.store)?;
            emit(commands::goldens(&store)?)
        }
        Commands::Check { execution } => {
            let store = open_store(&config.store)?;
            let execution = execution.map(ExecutionId::from);
            emit(commands::check(&store, execution.as_ref())?)
        }
        Commands::Export {
            execution_id,
            output,
        } => {
            let store = open_store(&config.store)?;
            let snap = commands::export(&store, &ExecutionId::from(execution_id))?;
            let text = snap.to_json()?;
            match output {
                Some(path) => {
                    fs::write(&path, text)?;
                    eprintln!(
                        "{} {} sealed as {} in {}",
                        style("exported").cyan(),
                        snap.execution_id,
                        snap.digest,
                        path.display()
                    );
                }
                None => println!("{text}"),
            }
            Ok(Outcome::Pass)
        }
        Commands::Verify { file } => emit(commands::verify(&fs::read_to_string(&file)?)?),
        Commands::Expectations(ExpectationCommands::Templates) => emit(commands::templates()?),
        Commands::Expectations(ExpectationCommands::Describe {
            file,
            templates,
            markdown,
        }) => {
            let rules_text = file.map(fs::read_to_string).transpose()?;
            let rules = commands::resolve_expectations(rules_text.as_deref(), &templates)?
                .unwrap_or_default();
            println!("{}", commands::describe_expectations(&rules, markdown.as_deref()));
            Ok(Outcome::Pass)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_diff_key_parses() {
        let cli = Cli::try_parse_from(["vigil", "diff", "a", "b", "--key", "position"]).unwrap();
        let Commands::Diff { key, .. } = cli.command else {
            panic!("expected diff");
        };
        assert_eq!(key, NodeKey::Position);
    }

    #[test]
    fn test_global_store_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["vigil", "goldens", "--store", "x.json"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("x.json")));
    }

    #[test]
    fn test_builtin_templates_are_listed() {
        assert_eq!(TemplateRegistry::builtin().len(), 6);
    }
}
