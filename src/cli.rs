//! Command-line overrides layered on top of the configuration file.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};

use crate::config::{ConfigFile, SourceConfig};
use crate::ui::theme::Theme;

const MAX_FETCH_TIMEOUT_SECS: u64 = 600;

/// Random menu picker for the terminal.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "menu-roulette", about = "Can't decide what to eat? Spin the menu.", version)]
pub struct Cli {
    /// Configuration file (defaults to ~/.local/menu-roulette/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma or newline separated list of names to pick from
    #[arg(long)]
    pub text: Option<String>,

    /// Title shown before the first pick
    #[arg(long)]
    pub title: Option<String>,

    /// Column id to sample from each record (repeatable)
    #[arg(long = "field", action = ArgAction::Append, value_name = "ID")]
    pub fields: Vec<String>,

    /// JSON file with table records, used instead of the configured source
    #[arg(long, value_name = "PATH")]
    pub records: Option<PathBuf>,

    /// Give up on a record fetch after this many seconds (0 waits forever)
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,

    /// Color theme preset
    #[arg(long)]
    pub theme: Option<String>,

    /// Seed for reproducible picks
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the resolved candidate list and exit
    #[arg(long, default_value_t = false)]
    pub list_candidates: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.fetch_timeout_secs {
            if secs > MAX_FETCH_TIMEOUT_SECS {
                bail!("--fetch-timeout-secs must be at most {MAX_FETCH_TIMEOUT_SECS}");
            }
        }
        if let Some(theme) = &self.theme {
            if Theme::from_name(theme).is_none() {
                bail!(
                    "unknown theme '{theme}' (available: {})",
                    Theme::preset_keys().join(", ")
                );
            }
        }
        if self.fields.iter().any(|field| field.trim().is_empty()) {
            bail!("--field must not be empty");
        }
        Ok(())
    }

    /// Apply the overrides to a loaded configuration.
    pub fn apply(&self, config: &mut ConfigFile) {
        if let Some(text) = &self.text {
            config.params.text = Some(text.clone());
        }
        if let Some(title) = &self.title {
            config.params.title = Some(title.clone());
        }
        if !self.fields.is_empty() {
            config.params.fields = self.fields.clone();
        }
        if let Some(path) = &self.records {
            config.source = Some(SourceConfig::File { path: path.clone() });
        }
        if let Some(secs) = self.fetch_timeout_secs {
            config.fetch_timeout_secs = secs;
        }
        if let Some(theme) = &self.theme {
            config.theme = theme.clone();
        }
    }
}
