use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use ircore::EngineConfig;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// JSON file with engine settings (normalization, rocchio alpha/beta)
    #[arg(long)]
    config: Option<String>,
}

fn load_engine_config(path: Option<&str>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
    let config = serde_json::from_str(&text).with_context(|| format!("parse config {path}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let engine_config = load_engine_config(args.config.as_deref())?;
    tracing::info!(?engine_config, "engine configured");
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app: Router = build_app(args.index.clone(), engine_config, admin_token)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
