use clap::{Parser, Subcommand};
use sitelens_common::WebsiteInput;
use std::path::PathBuf;

/// SiteLens: screenshot websites and rank their design.
#[derive(Debug, Parser)]
#[command(name = "sitelens")]
#[command(version)]
pub struct Cli {
    /// Configuration file; skipped when absent
    #[arg(short, long, default_value = "sitelens.yaml", global = true, env = "SITELENS_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Override `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Compare sites once and print the report as JSON
    Compare {
        #[arg(long, default_value = sitelens_compare::DEFAULT_CATEGORY)]
        category: String,

        /// `Name=URL`, repeatable
        #[arg(long = "site", value_name = "NAME=URL", required = true, value_parser = parse_site)]
        sites: Vec<WebsiteInput>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration with secrets masked
    Config,
}

/// Split `Name=URL` on the first `=`; URLs may carry their own.
pub fn parse_site(raw: &str) -> Result<WebsiteInput, String> {
    let (name, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got {raw:?}"))?;
    let site = WebsiteInput::new(name.trim(), url.trim());
    site.validate().map_err(|e| e.to_string())?;
    Ok(site)
}
