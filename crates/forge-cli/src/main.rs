//! Forge CLI - Specification-to-project generation
//!
//! Usage:
//!   forge init [path]                 Write a default .forge/config.toml
//!   forge validate                    Check the specification file
//!   forge manifest                    Resolve and print the file layout
//!   forge generate                    Generate a complete project
//!   forge add-feature <description>   Regenerate with an added feature

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use forge_agent::{AnthropicBackend, Model, RetryPolicy, RetryingInvoker};
use forge_core::{read_specification, validate_specification, ForgeConfig, ForgeError};
use forge_orchestrator::{GenerationOutcome, ProjectWorkflow, WorkflowOptions};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about = "Generate software projects from plain-text specifications")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to .forge/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate the specification file
    Validate {
        /// Specification file
        #[arg(long, value_name = "FILE")]
        spec: Option<PathBuf>,
    },

    /// Resolve the file layout and print it as JSON
    Manifest {
        /// Specification file
        #[arg(long, value_name = "FILE")]
        spec: Option<PathBuf>,

        /// Model to use
        #[arg(long, value_enum)]
        model: Option<CliModel>,
    },

    /// Generate a complete project
    Generate {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Add a feature to the specified project
    AddFeature {
        /// Feature description
        description: String,

        #[command(flatten)]
        run: RunArgs,
    },
}

/// Overrides shared by the generating commands
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Specification file
    #[arg(long, value_name = "FILE")]
    spec: Option<PathBuf>,

    /// Base directory for generated projects
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Staging directory for in-flight files
    #[arg(long, value_name = "DIR")]
    staging_dir: Option<PathBuf>,

    /// Maximum review iterations
    #[arg(long)]
    max_review_iterations: Option<usize>,

    /// Model to use
    #[arg(long, value_enum)]
    model: Option<CliModel>,
}

/// CLI-friendly model enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliModel {
    Opus,
    Sonnet,
    Haiku,
}

impl From<CliModel> for Model {
    fn from(m: CliModel) -> Self {
        match m {
            CliModel::Opus => Model::Opus,
            CliModel::Sonnet => Model::Sonnet,
            CliModel::Haiku => Model::Haiku,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        if is_input_error(&e) {
            eprintln!("Nothing was generated; fix the input above and retry.");
        }
        std::process::exit(1);
    }
}

/// Errors raised before any generation happened
fn is_input_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ForgeError>())
        .any(ForgeError::is_input_error)
}

/// Install the fmt subscriber; RUST_LOG wins over the verbosity flag
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { spec } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_validate(&spec.unwrap_or(config.paths.spec_file))
        }
        Commands::Manifest { spec, model } => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_overrides(
                &mut config,
                &RunArgs {
                    spec,
                    model,
                    ..RunArgs::default()
                },
            );
            cmd_manifest(&config, model).await
        }
        Commands::Generate { run } => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_overrides(&mut config, &run);
            cmd_generate(&config, run.model).await
        }
        Commands::AddFeature { description, run } => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_overrides(&mut config, &run);
            cmd_add_feature(&config, run.model, &description).await
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ForgeConfig> {
    match explicit {
        Some(path) => {
            anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
            ForgeConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => ForgeConfig::load_or_default(Path::new(".")).context("Failed to load config"),
    }
}

/// Command-line flags take precedence over the config file
fn apply_overrides(config: &mut ForgeConfig, args: &RunArgs) {
    if let Some(spec) = &args.spec {
        config.paths.spec_file = spec.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.paths.output_dir = output_dir.clone();
    }
    if let Some(staging_dir) = &args.staging_dir {
        config.paths.staging_dir = staging_dir.clone();
    }
    if let Some(max) = args.max_review_iterations {
        config.review.max_iterations = max;
    }
    if let Some(model) = args.model {
        config.models.default = Model::from(model).to_string();
    }
}

fn build_workflow(
    config: &ForgeConfig,
    model: Option<CliModel>,
) -> Result<ProjectWorkflow<AnthropicBackend>> {
    let model = match model {
        Some(model) => Model::from(model),
        None => config
            .models
            .default
            .parse::<Model>()
            .map_err(anyhow::Error::msg)
            .context("Invalid [models] default")?,
    };

    let backend = AnthropicBackend::from_config(model, &config.models)
        .context("Failed to create Anthropic backend")?;
    let invoker = RetryingInvoker::new(backend, RetryPolicy::from(&config.retry));

    info!(model = %model, "Using model");
    Ok(ProjectWorkflow::new(
        invoker,
        WorkflowOptions::from_config(config),
    ))
}

fn read_spec(config: &ForgeConfig) -> Result<String> {
    let path = &config.paths.spec_file;
    read_specification(path)
        .with_context(|| format!("Failed to read specification from {}", path.display()))
}

fn cmd_init(path: &Path) -> Result<()> {
    info!("Initializing Forge in {:?}", path);

    let config_path =
        ForgeConfig::write_default(path).context("Failed to write default config")?;

    println!("Initialized Forge in {:?}", path);
    println!("Created:");
    println!("  {}", config_path.display());

    Ok(())
}

fn cmd_validate(spec_path: &Path) -> Result<()> {
    let spec = read_specification(spec_path)
        .with_context(|| format!("Failed to read specification from {}", spec_path.display()))?;
    validate_specification(&spec).context("Specification is not valid")?;

    println!("Specification OK: {}", spec_path.display());
    Ok(())
}

async fn cmd_manifest(config: &ForgeConfig, model: Option<CliModel>) -> Result<()> {
    let spec = read_spec(config)?;
    let workflow = build_workflow(config, model)?;

    let manifest = workflow.resolve_manifest(&spec).await?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);

    Ok(())
}

async fn cmd_generate(config: &ForgeConfig, model: Option<CliModel>) -> Result<()> {
    let spec = read_spec(config)?;
    validate_specification(&spec).context("Specification is not valid")?;
    let workflow = build_workflow(config, model)?;

    let outcome = workflow
        .execute(&spec)
        .await
        .context("Project generation failed")?;
    print_outcome(&outcome);

    Ok(())
}

async fn cmd_add_feature(
    config: &ForgeConfig,
    model: Option<CliModel>,
    description: &str,
) -> Result<()> {
    let spec = read_spec(config)?;
    validate_specification(&spec).context("Specification is not valid")?;
    let workflow = build_workflow(config, model)?;

    let outcome = workflow
        .add_feature(&spec, description)
        .await
        .context("Feature addition failed")?;
    print_outcome(&outcome);

    Ok(())
}

fn print_outcome(outcome: &GenerationOutcome) {
    println!("Project generated in {}", outcome.output_dir.display());
    if let Some(verdict) = outcome.verdict {
        println!(
            "Review: {} after {} iteration(s)",
            verdict, outcome.review_iterations
        );
    }
    println!("Files:");
    for file in &outcome.files {
        println!("  {}", file);
    }
}
