//! Arbor CLI - tree-scoped dependency injection over scene manifests

use clap::{Parser, Subcommand};
use colored::Colorize;

use arbor::{ArborError, Engine, FixSuggestion, Graph, Isolation, Manifest, NodeId, RunStats};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Arbor - tree-scoped dependency injection for component object graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and inject a scene file
    Run {
        /// Path to .arbor.yaml scene file
        file: String,

        /// Allow scope-chain walks to cross context boundaries
        #[arg(long)]
        no_isolation: bool,

        /// Print statistics and diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a scene file (parse, build, configure, check bindings)
    Validate {
        /// Path to .arbor.yaml scene file
        file: String,
    },

    /// Print the node tree with hosts, scopes and contexts
    Inspect {
        /// Path to .arbor.yaml scene file
        file: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { file, no_isolation, json } => run_scene(&file, no_isolation, json),
        Commands::Validate { file } => validate_scene(&file),
        Commands::Inspect { file } => inspect_scene(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load(file: &str) -> Result<Graph, ArborError> {
    Manifest::from_file(file)?.build()
}

fn run_scene(file: &str, no_isolation: bool, json: bool) -> Result<(), ArborError> {
    let mut graph = load(file)?;
    let isolation = if no_isolation { Isolation::Disabled } else { Isolation::Enabled };

    let mut engine = Engine::new();
    let stats = engine.run_all(&mut graph, isolation)?;

    if json {
        let report = serde_json::json!({
            "stats": stats,
            "diagnostics": engine.diagnostics().to_json(),
        });
        println!("{report:#}");
        return Ok(());
    }

    print_diagnostics(&engine);
    if stats.has_failures() {
        println!("{} {}", "✗".red(), stats);
    } else {
        println!("{} {}", "✓".green(), stats);
    }
    Ok(())
}

fn validate_scene(file: &str) -> Result<(), ArborError> {
    let graph = load(file)?;
    let engine = Engine::new();

    let mut total = RunStats::new();
    for &root in graph.roots() {
        total.merge(&engine.check(&graph, root));
    }

    print_diagnostics(&engine);
    if total.invalid_bindings > 0 {
        eprintln!(
            "{} Scene '{}' has {} invalid binding(s)",
            "✗".red(),
            file,
            total.invalid_bindings
        );
        std::process::exit(1);
    }

    println!("{} Scene '{}' is valid", "✓".green(), file);
    println!("  Nodes: {}", graph.node_count());
    println!("  Hosts: {}", graph.host_count());
    println!("  Scopes: {}", total.scopes_processed);
    println!("  Bindings: {}", total.bindings_registered);
    Ok(())
}

fn inspect_scene(file: &str) -> Result<(), ArborError> {
    let graph = load(file)?;
    for &root in graph.roots() {
        print_node(&graph, root, 0);
    }
    Ok(())
}

fn print_node(graph: &Graph, node: NodeId, depth: usize) {
    let indent = "  ".repeat(depth);
    let n = graph.node(node);
    let context = graph.context_of(node);
    let scope_tag = if n.scope.is_some() {
        format!(" {}", "[scope]".cyan())
    } else {
        String::new()
    };
    println!("{indent}{}{} {}", n.name.bold(), scope_tag, context.to_string().dimmed());
    for &host_id in &n.hosts {
        let host = graph.host(host_id);
        println!("{indent}  - {} ({} sites)", host.ty, host.sites().len());
    }
    for &child in &n.children {
        print_node(graph, child, depth + 1);
    }
}

fn print_diagnostics(engine: &Engine) {
    for diag in engine.diagnostics().diagnostics() {
        let node = diag.node.as_deref().unwrap_or("-");
        let line = format!("{:?} at {}", diag.kind, node);
        match diag.severity {
            arbor::Severity::Error => eprintln!("{} {}", "error:".red().bold(), line),
            arbor::Severity::Warning => eprintln!("{} {}", "warning:".yellow(), line),
        }
    }
}
