//! Daemon configuration: command-line flags with environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use simpl_core::engine::judge::DEFAULT_OPENAI_BASE_URL;
use tracing::Level;

#[derive(Parser, Debug, Clone)]
#[command(name = "simpld")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dead Simpl evaluation service", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "SIMPL_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Directory uploaded datasets are written to
    #[arg(long, env = "SIMPL_UPLOAD_DIR", default_value = "tmp/dead-simpl-uploads")]
    pub upload_dir: PathBuf,

    /// Directory the local engine keeps run artifacts in
    #[arg(long, env = "SIMPL_ARTIFACT_DIR", default_value = "tmp/dead-simpl-artifacts")]
    pub artifact_dir: PathBuf,

    /// SurrealKV directory for persistent state.
    ///
    /// Ignored when a remote database is configured; state is in-memory when
    /// neither is set.
    #[arg(long, env = "SIMPL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Browser origin allowed by CORS
    #[arg(long, env = "SIMPL_CORS_ORIGIN", default_value = "http://localhost:8081")]
    pub cors_origin: String,

    /// Requests per client per minute (0 disables limiting)
    #[arg(long, env = "SIMPL_RATE_LIMIT", default_value_t = 120)]
    pub rate_limit: u32,

    /// Key rate limits on the first `X-Forwarded-For` hop.
    ///
    /// Only set this behind a proxy that overwrites the header.
    #[arg(long, env = "SIMPL_TRUST_FORWARDED")]
    pub trust_forwarded: bool,

    /// OpenAI-compatible base URL for judge models
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    /// API key for judge models
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
