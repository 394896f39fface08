use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use semgraph_codec::{export_as, import_json, ExportFormat};
use semgraph_core::config::{AppConfig, ExecutionOrder};
use semgraph_core::ontology::{OntologyCatalog, StaticCatalog};
use semgraph_core::store::{keys, KeyValueStore, MemoryStore};
use semgraph_core::types::Workflow;
use semgraph_engine::{ExecutionEngine, ProgressEvent};
use semgraph_graph::validate_workflow;
use semgraph_llm::{
    ConvertOptions, ModeOutcome, OntologyPolicy, OntologySelection, PromptModes, ProviderGateway,
};

#[derive(Parser)]
#[command(
    name = "semgraph",
    version,
    about = "Semantic content graphs executed through language model providers"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every node of a workflow and write the results back
    Run {
        /// Workflow JSON file
        workflow: PathBuf,
        /// Order nodes by their edges instead of declaration order
        #[arg(long)]
        topological: bool,
    },
    /// Check a workflow for structural problems
    Validate {
        workflow: PathBuf,
    },
    /// Export a workflow as json, markdown, yaml or xml
    Export {
        workflow: PathBuf,
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output directory (default: current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Turn free text into a workflow
    Convert {
        /// Text file to convert
        input: PathBuf,
        /// force-framework, novel-category or exclude
        #[arg(long, default_value = "force-framework")]
        policy: String,
        /// Comma-separated ontology clusters shown to the model
        #[arg(long, value_delimiter = ',')]
        clusters: Vec<String>,
        /// Comma-separated ontology type codes shown to the model
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        /// Where to write the workflow JSON (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Rewrite the content of one node
    Enhance {
        workflow: PathBuf,
        #[arg(long)]
        node: String,
        #[arg(long, default_value = "improve")]
        variant: String,
    },
    /// List registered providers and their credential status
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("semgraph=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let store = Arc::new(MemoryStore::new());
    config.seed_store(store.as_ref());
    let gateway = Arc::new(ProviderGateway::from_config(&config, store.clone())?);
    seed_env_keys(&gateway, store.as_ref());

    match cli.command {
        Commands::Run {
            workflow,
            topological,
        } => run_workflow(&config, gateway, &workflow, topological).await,
        Commands::Validate { workflow } => validate(&workflow),
        Commands::Export {
            workflow,
            format,
            out,
        } => export(&workflow, &format, out.as_deref()),
        Commands::Convert {
            input,
            policy,
            clusters,
            types,
            out,
        } => {
            let policy: OntologyPolicy = policy.parse()?;
            let selection = if clusters.is_empty() && types.is_empty() {
                OntologySelection::default()
            } else {
                OntologySelection::Explicit { clusters, types }
            };
            let modes = prompt_modes(&config, gateway)?;
            convert(&modes, &input, ConvertOptions { policy, selection }, out.as_deref()).await
        }
        Commands::Enhance {
            workflow,
            node,
            variant,
        } => {
            let modes = prompt_modes(&config, gateway)?;
            enhance(&modes, &workflow, &node, &variant).await
        }
        Commands::Providers => {
            for provider in gateway.registry().providers() {
                let configured = store.get_non_empty(&keys::api_key(&provider.id)).is_some();
                println!(
                    "{:<12} {:<20} {:<40} {}",
                    provider.id,
                    provider.name,
                    provider.base_url,
                    if configured { "configured" } else { "no key" }
                );
            }
            Ok(())
        }
    }
}

/// `--config`, else `~/.semgraph/config.toml`, else defaults.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    match AppConfig::default_path() {
        Some(path) if path.exists() => {
            info!(path = %path.display(), "Loading config from home directory");
            Ok(AppConfig::load(&path)?)
        }
        _ => Ok(AppConfig::default()),
    }
}

/// `SEMGRAPH_<PROVIDER>_API_KEY` fills in providers the config left empty.
fn seed_env_keys(gateway: &ProviderGateway, store: &dyn KeyValueStore) {
    for provider in gateway.registry().providers() {
        let key = keys::api_key(&provider.id);
        if store.get_non_empty(&key).is_some() {
            continue;
        }
        let var = format!("SEMGRAPH_{}_API_KEY", provider.id.to_ascii_uppercase());
        if let Ok(value) = std::env::var(&var) {
            if !value.trim().is_empty() {
                store.set(&key, value.trim());
            }
        }
    }
}

fn load_catalog(config: &AppConfig) -> anyhow::Result<StaticCatalog> {
    match &config.catalog {
        Some(path) => Ok(StaticCatalog::load(Path::new(path))?),
        None => Ok(StaticCatalog::builtin()),
    }
}

fn prompt_modes(config: &AppConfig, gateway: Arc<ProviderGateway>) -> anyhow::Result<PromptModes> {
    let catalog: Arc<dyn OntologyCatalog> = Arc::new(load_catalog(config)?);
    let registry = gateway.registry().clone();
    let store = gateway.store().clone();
    Ok(PromptModes::new(gateway, registry, store, catalog)
        .with_library(semgraph_llm::prompt_library(config)?)
        .with_sampling(config.sampling.clone()))
}

fn read_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(import_json(&content)?)
}

fn write_workflow(path: &Path, workflow: &Workflow) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(workflow)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

async fn run_workflow(
    config: &AppConfig,
    gateway: Arc<ProviderGateway>,
    path: &Path,
    topological: bool,
) -> anyhow::Result<()> {
    let mut workflow = read_workflow(path)?;
    let registry = gateway.registry().clone();
    let store = gateway.store().clone();
    let mut engine = ExecutionEngine::from_config(config, gateway, registry, store);
    if topological {
        engine = engine.with_order(ExecutionOrder::Topological);
    }

    let summary = engine
        .execute_workflow(&mut workflow, |event| match &event {
            ProgressEvent::NodeError { node_id, error, .. } => {
                eprintln!("[{}] {}: {}", event.kind(), node_id, error);
            }
            _ => eprintln!("[{}] {}", event.kind(), event.message()),
        })
        .await?;

    write_workflow(path, &workflow)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let workflow = read_workflow(path)?;
    let report = validate_workflow(&workflow);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_valid {
        bail!("{} has {} problem(s)", path.display(), report.errors.len());
    }
    Ok(())
}

fn export(path: &Path, format: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let workflow = read_workflow(path)?;
    let format: ExportFormat = format.parse()?;
    let file = export_as(&workflow, format)?;

    let dir = out.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let target = dir.join(&file.filename);
    std::fs::write(&target, &file.content)
        .with_context(|| format!("writing {}", target.display()))?;
    println!("{}", target.display());
    Ok(())
}

async fn convert(
    modes: &PromptModes,
    input: &Path,
    options: ConvertOptions,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let text =
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let graph = match modes.convert_text(&text, &options).await {
        ModeOutcome::Success(graph) => graph,
        ModeOutcome::Failure { error } => bail!(error),
    };
    if let Some(reason) = &graph.error {
        bail!("{}", reason);
    }

    let title = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Converted");
    let workflow = graph.materialize(modes.catalog(), title);
    info!(
        nodes = workflow.nodes.len(),
        edges = workflow.edges.len(),
        "Converted text into workflow"
    );

    match out {
        Some(path) => {
            write_workflow(path, &workflow)?;
            println!("{}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&workflow)?),
    }
    Ok(())
}

async fn enhance(
    modes: &PromptModes,
    path: &Path,
    node_id: &str,
    variant: &str,
) -> anyhow::Result<()> {
    let workflow = read_workflow(path)?;
    let Some(node) = workflow.node(node_id) else {
        bail!("node '{}' not found in {}", node_id, path.display());
    };
    if node.content().trim().is_empty() {
        warn!(node_id = %node.id, "Node has no content to enhance");
    }

    match modes.enhance_node(node.content(), variant).await {
        ModeOutcome::Success(enhancement) => {
            println!("{}", enhancement.enhanced_content);
            Ok(())
        }
        ModeOutcome::Failure { error } => bail!(error),
    }
}
