use anyhow::Result;
use clap::Parser;
use simpl_core::init_tracing;
use simpld::{serve, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_tracing(config.json, config.log_level());
    serve(config).await
}
