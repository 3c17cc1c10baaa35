//! SYMBIONT CLI
//!
//! Compiles policy drafts into data-plane artifacts and checks payloads
//! against them. Reads and writes local JSON files only.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use symbiont_integrate::{
    IntegratorConfig, Pipeline, PolicyDraft, PolicyIntegrator, merge, trace_sources,
};
use symbiont_policy::{
    CompilerConfig, ExecutionArtifact, FilterAction, PayloadFilter, PolicyCompiler,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "symbiont=info,symbiont_policy=info,symbiont_integrate=info";

#[derive(Parser)]
#[command(name = "symbiont")]
#[command(about = "SYMBIONT - hierarchical field-level policy compiler", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge, verify and compile drafts into artifacts
    Compile {
        /// JSON array of policy drafts
        #[arg(short, long)]
        drafts: PathBuf,
        /// Integrator config (denylist, receiver schema)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Compiler config
        #[arg(long)]
        compiler_config: Option<PathBuf>,
        /// Extra forbidden field, may repeat
        #[arg(long = "forbid")]
        forbid: Vec<String>,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a JSON payload against an artifact
    Check {
        /// Compiled artifact
        #[arg(short, long)]
        artifact: PathBuf,
        /// JSON payload
        #[arg(short, long)]
        payload: PathBuf,
        /// Reject instead of scrubbing
        #[arg(long)]
        block: bool,
    },
    /// Show which sources proposed each merged field
    Trace {
        /// JSON array of policy drafts
        #[arg(short, long)]
        drafts: PathBuf,
        /// Flow to trace
        #[arg(short, long)]
        flow: String,
    },
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("parsing {}", path.display()))
}

fn compile(
    drafts: &Path,
    config: Option<&Path>,
    compiler_config: Option<&Path>,
    forbid: Vec<String>,
) -> Result<String> {
    let drafts: Vec<PolicyDraft> = read_json(drafts)?;
    let mut config: IntegratorConfig = match config {
        Some(path) => read_json(path)?,
        None => IntegratorConfig::default(),
    };
    config.forbidden_fields.extend(forbid);
    let compiler_config: CompilerConfig = match compiler_config {
        Some(path) => read_json(path)?,
        None => CompilerConfig::default(),
    };

    let pipeline = Pipeline::new(
        PolicyIntegrator::new(config),
        PolicyCompiler::new(compiler_config),
    );
    let flows = pipeline.run(&drafts)?;

    for flow in &flows {
        if let Some(notes) = &flow.policy.notes {
            tracing::warn!(flow_id = %flow.policy.flow_id, notes = %notes, "policy repaired");
        }
        tracing::info!(
            flow_id = %flow.policy.flow_id,
            status = %flow.policy.verification_status,
            fields = flow.artifact.len(),
            fingerprint = %flow.artifact.fingerprint(),
            "compiled flow"
        );
    }

    Ok(serde_json::to_string_pretty(&flows)?)
}

fn check(artifact: &Path, payload: &Path, block: bool) -> Result<String> {
    let text = std::fs::read_to_string(artifact)
        .wrap_err_with(|| format!("reading {}", artifact.display()))?;
    let artifact = ExecutionArtifact::from_json(&text)?;
    let payload: serde_json::Value = read_json(payload)?;

    let action = if block {
        FilterAction::Block
    } else {
        FilterAction::Scrub
    };
    let result = PayloadFilter::new(&artifact).with_action(action).apply(&payload);
    Ok(serde_json::to_string_pretty(&result)?)
}

fn trace(drafts: &Path, flow: &str) -> Result<String> {
    let drafts: Vec<PolicyDraft> = read_json(drafts)?;
    let merged = merge(&drafts)?;
    let policy = merged
        .get(flow)
        .ok_or_else(|| eyre!("flow not found: {flow}"))?;
    Ok(serde_json::to_string_pretty(&trace_sources(policy, &drafts))?)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.json);

    match cli.command {
        Commands::Compile {
            drafts,
            config,
            compiler_config,
            forbid,
            output,
        } => {
            let json = compile(&drafts, config.as_deref(), compiler_config.as_deref(), forbid)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .wrap_err_with(|| format!("writing {}", path.display()))?,
                None => println!("{}", json),
            }
            Ok(())
        }
        Commands::Check {
            artifact,
            payload,
            block,
        } => {
            println!("{}", check(&artifact, &payload, block)?);
            Ok(())
        }
        Commands::Trace { drafts, flow } => {
            println!("{}", trace(&drafts, &flow)?);
            Ok(())
        }
    }
}
