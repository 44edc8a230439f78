//! vsim-infra: synthesize, validate and preview the video similarity deployment.
//!
//! ```text
//! vsim-infra synth --parameters sagemakerEndpoint=Resnet50 > template.yaml
//! vsim-infra validate template.yaml
//! vsim-infra preview template.yaml --collection-endpoint https://abc.us-east-1.aoss.amazonaws.com --api-id a1b2c3
//! vsim-infra serve
//! ```

mod mcp;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vsim_infra::tools::{preview, reference, synth, validate};
use vsim_infra::{Parameters, TemplateFormat};

#[derive(Parser)]
#[command(
    name = "vsim-infra",
    about = "Video similarity deployment topology",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize the stack template.
    Synth {
        /// Deployment parameters as KEY=VALUE (e.g. sagemakerEndpoint=Resnet50).
        #[arg(long = "parameters", value_name = "KEY=VALUE")]
        parameters: Vec<String>,
        /// Stack configuration file (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = TemplateFormat::Yaml)]
        format: TemplateFormat,
        /// Write the template here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a template against the topology's invariants.
    Validate {
        /// Template file (YAML or JSON).
        template: PathBuf,
    },
    /// Resolve the function environment and outputs for given provisioned values.
    Preview {
        /// Template file (YAML or JSON).
        template: PathBuf,
        #[arg(long)]
        collection_endpoint: String,
        #[arg(long)]
        api_id: String,
        #[arg(long, default_value = preview::DEFAULT_REGION)]
        region: String,
        #[arg(long, default_value = preview::DEFAULT_ACCOUNT_ID)]
        account_id: String,
        /// Deploy-time parameter overrides as KEY=VALUE.
        #[arg(long = "parameters", value_name = "KEY=VALUE")]
        parameters: Vec<String>,
    },
    /// Print the HTTP routes and the compute image contract.
    Routes,
    /// Run the MCP server on stdio.
    Serve,
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries templates and the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Synth {
            parameters,
            config,
            format,
            output,
        } => {
            let config = synth::load_config(config.as_deref())?;
            let parameters = Parameters::parse_pairs(&parameters)?;
            let out = synth::synthesize_template(&config, &parameters, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, out)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "template written");
                }
                None => print!("{out}"),
            }
        }
        Command::Validate { template } => {
            let text = read_template(&template)?;
            if let Err(errors) = validate::validate_template(&text) {
                for e in &errors {
                    eprintln!("- {e}");
                }
                bail!("{} validation error(s) in {}", errors.len(), template.display());
            }
            println!("Template is valid.");
        }
        Command::Preview {
            template,
            collection_endpoint,
            api_id,
            region,
            account_id,
            parameters,
        } => {
            let text = read_template(&template)?;
            let request = preview::PreviewRequest {
                collection_endpoint,
                api_id,
                region,
                account_id,
                parameters,
            };
            println!("{}", preview::preview_deployment(&text, &request)?);
        }
        Command::Routes => {
            println!("{}", reference::list_api_routes_json());
            println!("{}", reference::compute_contract_json());
        }
        Command::Serve => mcp::serve().await?,
    }
    Ok(())
}
