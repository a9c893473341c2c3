//! Bibliographic Graph Reconciliation CLI
//!
//! Command-line tool for repairing, splitting, deduplicating and reconciling
//! N-Triples catalog exports.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bibgraph_reconcile::{
    process_all, process_dedupe, process_reconcile, process_repair, process_split,
    AuthorityConfig, Config, Pipeline, PipelineError,
};

#[derive(Parser)]
#[command(name = "bibgraph-reconcile")]
#[command(about = "Deduplicate bibliographic RDF and link it to authority files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair local identifiers whose name starts with a digit
    Repair(StageArgs),
    /// Split N-Triples files into one partition per subject type
    Split(StageArgs),
    /// Merge duplicate entities in split partitions
    Dedupe(StageArgs),
    /// Link deduplicated entities to authority URIs
    Reconcile(StageArgs),
    /// Run every stage in order
    Run(StageArgs),
}

#[derive(Args)]
struct StageArgs {
    /// Input file or directory (a stage directory for dedupe/reconcile)
    input: PathBuf,

    /// Output root; each stage writes its own subdirectory
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Namespace of locally minted identifiers to repair
    #[arg(long)]
    namespace: Option<String>,

    /// Reconciliation service endpoint
    #[arg(long)]
    authority_endpoint: Option<String>,

    /// JSON array of authority candidates used instead of a service
    #[arg(long)]
    authority_file: Option<PathBuf>,

    /// Lookup timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Namespace for IRIs minted for unresolved blank nodes
    #[arg(long)]
    mint_namespace: Option<String>,

    /// Worker threads (default: one per core)
    #[arg(short, long)]
    jobs: Option<usize>,
}

/// Load the configuration file and apply command-line overrides
fn load_config(args: &StageArgs) -> Result<Config, PipelineError> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(namespace) = &args.namespace {
        config.local_namespace = Some(namespace.clone());
    }
    if let Some(endpoint) = &args.authority_endpoint {
        match config.authority.as_mut() {
            Some(authority) => authority.endpoint = endpoint.clone(),
            None => config.authority = Some(AuthorityConfig::new(endpoint.clone())),
        }
    }
    if let Some(timeout) = args.timeout {
        match config.authority.as_mut() {
            Some(authority) => authority.timeout_secs = timeout,
            None => tracing::warn!("--timeout has no effect without an authority endpoint"),
        }
    }
    if let Some(path) = &args.authority_file {
        config.authority_file = Some(path.clone());
    }
    if let Some(namespace) = &args.mint_namespace {
        config.mint_namespace = Some(namespace.clone());
    }

    config.validate()?;
    Ok(config)
}

fn init_thread_pool(jobs: Option<usize>) -> Result<(), PipelineError> {
    if let Some(jobs) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|e| PipelineError::Config(format!("cannot start {} workers: {}", jobs, e)))?;
    }
    Ok(())
}

fn report(stage: &str, output: Option<PathBuf>) -> Result<(), PipelineError> {
    match output {
        Some(dir) => {
            eprintln!("Wrote {} output to {}", stage, dir.display());
            Ok(())
        }
        None => Err(PipelineError::StageFailed(stage.to_string())),
    }
}

fn run(command: Commands) -> Result<(), PipelineError> {
    let (stage, args) = match &command {
        Commands::Repair(args) => ("repair", args),
        Commands::Split(args) => ("split", args),
        Commands::Dedupe(args) => ("dedupe", args),
        Commands::Reconcile(args) => ("reconcile", args),
        Commands::Run(args) => ("run", args),
    };

    init_thread_pool(args.jobs)?;
    let config = load_config(args)?;
    let pipeline = Pipeline::new(&config)?;
    let input: &Path = &args.input;
    let output: &Path = &args.output;

    let result = match &command {
        Commands::Repair(_) => process_repair(input, output, &pipeline),
        Commands::Split(_) => process_split(input, output, &pipeline),
        Commands::Dedupe(_) => process_dedupe(input, output, &pipeline),
        Commands::Reconcile(_) => {
            let lookup = config.build_lookup()?;
            process_reconcile(input, output, &pipeline, lookup.as_ref())
        }
        Commands::Run(_) => {
            let lookup = config.build_lookup()?;
            process_all(input, output, &pipeline, lookup.as_ref())
        }
    };

    report(stage, result)
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bibgraph_reconcile=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_failed_stage() {
        let err = report("dedupe", None).unwrap_err();
        assert!(matches!(&err, PipelineError::StageFailed(stage) if stage == "dedupe"));
        assert_eq!(err.to_string(), "dedupe stage failed; see log for details");
        assert!(report("split", Some(PathBuf::from("out/split"))).is_ok());
    }
}
