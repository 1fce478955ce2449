use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rustycontract::config::{
    compiled::compile_config,
    resolver::{get_config_path_cwd, load_resolved_config},
};
use tracing::info;

/// Validate a configuration without serving or testing it.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Config file to validate
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,
}

pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    let cfg = get_config_path_cwd(&args.config);
    let resolved = load_resolved_config(&cfg).context("failed to load configuration")?;
    let compiled = compile_config(resolved).context("invalid configuration")?;

    for resource in &compiled.resources {
        let patterns = resource.serve_patterns().join(", ");
        println!(
            "{:<10} {} {} [{}]",
            if resource.serve_only() { "serve-only" } else { "tested" },
            resource.method(),
            patterns,
            resource.name()
        );
    }
    info!(
        resources = compiled.resources.len(),
        testable = compiled.testable().count(),
        sources = compiled.sources.len(),
        "configuration is valid"
    );
    Ok(())
}
