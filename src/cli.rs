//! CLI argument definitions and the end-to-end run path.

use crate::base::BaseDef;
use crate::config::Config;
use crate::error::{BaseError, Result};
use crate::format::render_view;
use crate::table::materialize;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "materialize-base")]
#[command(version, about = "Materialize an Obsidian Base into a Markdown table", long_about = None)]
pub struct Cli {
    /// Path to the .base file
    pub base: PathBuf,

    /// View to materialize (defaults to the base's first view)
    #[arg(long)]
    pub view: Option<String>,

    /// Vault root (otherwise inferred from a .obsidian ancestor)
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Suppress warnings
    #[arg(short, long)]
    pub quiet: bool,
}

/// Load, filter and materialize; returns the full stdout payload.
pub fn run(cli: &Cli) -> Result<String> {
    let config = Config::load()?;
    let vault = config.resolve_vault(cli.vault.as_deref(), &cli.base)?;

    let text = std::fs::read_to_string(&cli.base).map_err(|source| BaseError::Read {
        path: cli.base.clone(),
        source,
    })?;
    let base = BaseDef::from_yaml_str(&text)?;

    let files = vault.load_files(cli.quiet)?;
    let result = materialize(&base, cli.view.as_deref(), &files)?;
    Ok(render_view(&result.view_name, &result.rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["materialize-base", "x.base", "--view=My view", "--quiet"]);
        assert_eq!(cli.base, PathBuf::from("x.base"));
        assert_eq!(cli.view.as_deref(), Some("My view"));
        assert!(cli.quiet);
        assert!(cli.vault.is_none());
    }
}
