use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use sitelens_common::observability::{init_logging, LogConfig};
use sitelens_compare::{build_engine, CompareRequest};
use sitelens_config::{SiteLensConfig, SiteLensConfigLoader};
use std::sync::Arc;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // File is optional; SITELENS__* env overrides win either way
    let mut cfg: SiteLensConfig = SiteLensConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let log_path = init_logging(LogConfig {
        app_name: "sitelens",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    tracing::info!(log = %log_path.display(), config = %cli.config.display(), "sitelens starting");

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            let engine = build_engine(&cfg)?;
            sitelens_server::serve(&cfg, Arc::new(engine)).await
        }
        Command::Compare {
            category,
            sites,
            output,
        } => {
            let engine = build_engine(&cfg)?;
            let report = engine.compare(&CompareRequest::new(sites, category)).await?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "report written");
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Command::Config => {
            print!("{}", cfg.to_redacted_yaml()?);
            Ok(())
        }
    }
}
