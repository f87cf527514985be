use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::api_connection::endpoints::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::api_connection::ModelConfig;
use crate::logging::LogFormat;
use crate::recipe_parser::ValidationPolicy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub model: ModelArgs,

    /// What to do with entries that fail schema validation
    #[arg(long, env = "VALIDATION_POLICY", value_enum, default_value_t = ValidationPolicy::Strict, global = true)]
    pub policy: ValidationPolicy,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    pub ollama_url: String,

    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Upper bound on a single model call, in seconds
    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub timeout_secs: u64,

    #[arg(long, env = "MODEL_TEMPERATURE", global = true)]
    pub temperature: Option<f32>,
}

impl ModelArgs {
    pub fn to_config(&self) -> ModelConfig {
        ModelConfig {
            base_url: self.ollama_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            temperature: self.temperature,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Extract recipes from a saved model reply and print them as JSON
    Extract {
        /// Path to the raw model reply
        #[arg(short, long)]
        reply_file: PathBuf,
    },
    /// Ask the model once and print the extracted recipes
    Generate {
        #[arg(short, long)]
        ingredients: String,
        #[arg(short, long, default_value = "")]
        diet: String,
        #[arg(short, long, default_value = "")]
        allergies: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "RECIPE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "RECIPE_PORT", default_value_t = 5000)]
    pub port: u16,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Reads a saved model reply, refusing empty files.
pub async fn read_reply_file(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read reply file '{}'", path.display()))?;
    if raw.trim().is_empty() {
        bail!("Reply file '{}' is empty", path.display());
    }
    Ok(raw)
}
