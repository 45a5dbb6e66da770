//! Server binary: load configuration and mapping lists, build the
//! engine, and serve the plugin routes.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use koral_mapper::config::{expand_pattern, load_list_file, Config, LogLevel};
use koral_mapper::server::{router, AppState};
use koral_mapper::MappingEngine;

/// Fallback listening port when neither config nor CLI set one.
const DEFAULT_PORT: u16 = 5725;

#[derive(Debug, Parser)]
#[command(name = "koral-mapper", about = "KoralQuery tagset and metadata mapping service")]
struct Args {
    /// Main YAML configuration file.
    #[arg(short, long, env = "KORAL_MAPPER_CONFIG")]
    config: Option<PathBuf>,

    /// Additional mapping-list files; glob patterns are expanded, a
    /// pattern without matches is taken literally.
    #[arg(short, long = "mappings")]
    mappings: Vec<String>,

    /// Listening port, overriding the configuration file.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    if let Some(port) = args.port {
        config.port = Some(port);
    }

    init_tracing(config.loglevel);

    for pattern in &args.mappings {
        for path in expand_pattern(pattern) {
            let list = load_list_file(&path)
                .with_context(|| format!("loading mapping list from '{}'", path.display()))?;
            config.lists.push(list);
        }
    }

    let engine = MappingEngine::from_configs(&config.lists)?;
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let state = AppState {
        engine: Arc::new(engine),
        config: Arc::new(config),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "koral-mapper listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn init_tracing(level: Option<LogLevel>) {
    let default = level.map(LogLevel::as_str).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("koral_mapper={default}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
