use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codesift_core::config::Settings;
use codesift_graph::KnowledgeGraph;
use codesift_mcp::classifier::QueryClassifier;
use codesift_mcp::executor::ToolExecutor;
use codesift_mcp::http::{self, AppState};
use codesift_mcp::hybrid::HybridEngine;
use codesift_mcp::registry::ToolRegistry;
use codesift_mcp::tools::{ConfigImpactAnalyzerTool, CrossRepoTracerTool, VectorSearchTool};
use codesift_vector::VectorStore;
use colored::Colorize;
use tracing::info;

#[derive(Parser)]
#[command(name = "codesift")]
#[command(about = "Hybrid code-intelligence query engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP surface.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8088")]
        bind: String,
    },
    /// Run a single query and print the result as JSON.
    Query { text: String },
    /// Build (or rebuild) the knowledge graph from a source tree.
    Index {
        path: String,
        #[arg(long, default_value_t = true)]
        recursive: bool,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn load_settings() -> Result<Settings> {
    Settings::load().context("failed to load configuration")
}

struct Components {
    engine: HybridEngine,
    registry: Arc<ToolRegistry>,
    vector_store: Arc<VectorStore>,
    knowledge_graph: Option<Arc<KnowledgeGraph>>,
}

fn build_components(settings: Settings) -> Result<Components> {
    let vector_store = Arc::new(
        VectorStore::load(settings.vector_store.clone(), settings.llm.clone())
            .context("failed to initialize vector store")?,
    );

    let knowledge_graph = if settings.hybrid.use_knowledge_graph {
        Some(Arc::new(
            KnowledgeGraph::init(std::path::Path::new(&settings.knowledge_graph.data_dir))
                .context("failed to initialize knowledge graph")?,
        ))
    } else {
        None
    };

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(Arc::new(VectorSearchTool::new(vector_store.clone())))
        .context("failed to register vector_search tool")?;
    registry
        .register(Arc::new(ConfigImpactAnalyzerTool::new(
            settings.configimpact.clone(),
            settings.crossrepo.roots.clone(),
        )))
        .context("failed to register config_impact_analyzer tool")?;
    registry
        .register(Arc::new(CrossRepoTracerTool::new(settings.crossrepo.clone())))
        .context("failed to register cross_repo_tracer tool")?;

    let classifier = QueryClassifier::new(settings.llm.clone())?;
    let executor = ToolExecutor::new(registry.clone(), settings.mcp.clone());
    let engine = HybridEngine::new(
        classifier,
        executor,
        knowledge_graph.clone(),
        settings.hybrid.clone(),
        settings.mcp.clone(),
    );

    Ok(Components {
        engine,
        registry,
        vector_store,
        knowledge_graph,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = load_settings()?;

    match cli.command {
        Commands::Serve { bind } => {
            let components = build_components(settings)?;
            let addr: SocketAddr = bind.parse().context("invalid bind address")?;
            let state = Arc::new(AppState {
                engine: components.engine,
                registry: components.registry,
                vector_store: components.vector_store,
                knowledge_graph: components.knowledge_graph,
            });
            http::serve(state, addr).await.context("http server failed")?;
        }
        Commands::Query { text } => {
            let components = build_components(settings)?;
            let result = components.engine.process(&text).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Index { path, recursive } => {
            let data_dir = settings.knowledge_graph.data_dir.clone();
            let graph = KnowledgeGraph::init(std::path::Path::new(&data_dir))
                .context("failed to initialize knowledge graph")?;
            let (entities, relationships) = graph
                .build(std::path::Path::new(&path), recursive)
                .context("failed to build knowledge graph")?;
            info!(entities, relationships, "knowledge graph build complete");
            println!(
                "{} {} entities, {} relationships indexed",
                "done:".green().bold(),
                entities,
                relationships
            );
        }
    }

    Ok(())
}
