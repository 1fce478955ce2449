use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rustycontract::{
    config::{manager::ConfigManager, resolver::get_config_path_cwd},
    filewatcher::watcher,
    http::server::MockServer,
};
use tracing::{error, info};

/// Run the mock HTTP server (with optional file-watcher).
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Config file to watch and serve
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Address to bind, overrides the config file
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind, overrides the config file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Disable file-watching
    #[arg(long)]
    pub no_watch: bool,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let cfg = get_config_path_cwd(&args.config);
    info!(cfg = %cfg.display(), watch_enabled = !args.no_watch, "serving configuration");

    let manager = ConfigManager::new(cfg, args.host, args.port)
        .context("failed to load configuration")?;

    let mut watch_handle = if args.no_watch {
        None
    } else {
        match watcher::spawn_watcher(manager.clone()) {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(error = %err, "Failed to start file watcher, serving without reload");
                None
            }
        }
    };

    let addr = manager.address();
    info!(%addr, "starting HTTP server");
    let server = MockServer::bind(&addr, manager.routes_handle())
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    let result = server.run().await;
    if let Some(handle) = watch_handle.as_mut() {
        handle.stop();
    }
    result.context("server error")
}
