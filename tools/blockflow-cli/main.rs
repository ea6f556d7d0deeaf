use blockflow::graph::{BlocklyWorkspace, FlowArtifact, IntoGraph};
use blockflow::prelude::*;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Extracts and runs block-based AI flows saved from the editor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a saved Blockly workspace JSON file
    workspace_path: Option<PathBuf>,

    /// Run a previously saved flow artifact instead of a workspace
    #[arg(long, conflicts_with = "workspace_path")]
    artifact: Option<PathBuf>,

    /// Print the extracted flow and stop without running it
    #[arg(long)]
    extract_only: bool,

    /// Save the extracted flow as a binary artifact
    #[arg(long)]
    save_artifact: Option<PathBuf>,

    /// Deadline for a single model request, in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Retries for transient provider failures
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Disable the ai_sentiment condition's classifier call
    #[arg(long)]
    no_sentiment: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let total_start = Instant::now();

    // --- 1. Load or extract the flow ---
    let extract_start = Instant::now();
    let nodes = match (&cli.artifact, &cli.workspace_path) {
        (Some(path), _) => load_artifact(path),
        (None, Some(path)) => extract_workspace(path),
        (None, None) => exit_with_error("A workspace path or --artifact is required."),
    };
    let extract_duration = extract_start.elapsed();

    println!("\n{}", DisplayFlow { nodes: &nodes });

    if let Some(path) = &cli.save_artifact {
        FlowArtifact::new(nodes.clone())
            .save(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save artifact: {}", e)));
        println!("Saved flow artifact to {}", path.display());
    }

    if cli.extract_only {
        return;
    }

    // --- 2. Providers ---
    let registry = ProviderRegistry::from_env();
    let classifier = if cli.no_sentiment {
        None
    } else {
        match ModelSentimentClassifier::from_registry(&registry) {
            Ok(classifier) => Some(classifier),
            Err(e) => {
                tracing::warn!("Sentiment conditions will evaluate to false: {}", e);
                None
            }
        }
    };
    let config = ModelCallerConfig::new()
        .with_request_timeout(Duration::from_secs(cli.timeout_secs))
        .with_max_retries(cli.max_retries);
    let mut executor = FlowExecutor::new(ModelCaller::new(registry).with_config(config));
    if let Some(classifier) = classifier {
        executor = executor.with_classifier(Arc::new(classifier));
    }

    // --- 3. Run ---
    println!("Running flow...");
    let run_start = Instant::now();
    let run = executor.run(&nodes).await;
    let run_duration = run_start.elapsed();

    println!("\n{}", ResultFormatter::format_results(&run.results));

    println!("\n--- Summary ---");
    println!("Nodes Reported:  {}", run.results.len());
    println!("Variables Set:   {}", run.variables.len());
    println!("Extraction:      {:?}", extract_duration);
    println!("Execution:       {:?}", run_duration);
    println!("Total:           {:?}", total_start.elapsed());
    println!();
}

fn extract_workspace(path: &PathBuf) -> Vec<Node> {
    let json = fs::read_to_string(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read workspace '{}': {}", path.display(), e))
    });
    let graph = BlocklyWorkspace::from_json(&json)
        .and_then(|workspace| workspace.into_graph())
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    Extractor::default()
        .extract(&graph)
        .unwrap_or_else(|e| exit_with_error(&format!("Flow extraction failed: {}", e)))
}

fn load_artifact(path: &PathBuf) -> Vec<Node> {
    let artifact = FlowArtifact::from_file(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to load artifact '{}': {}", path.display(), e))
    });
    artifact.validate().unwrap_or_else(|e| {
        exit_with_error(&format!("Artifact '{}' holds an invalid flow: {}", path.display(), e))
    });
    artifact.nodes
}

fn init_logging(verbose: bool) {
    let default = if verbose { "blockflow=debug" } else { "blockflow=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
