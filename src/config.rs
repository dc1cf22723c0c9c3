//! On-disk configuration: which table to read, which columns to sample, and the
//! display parameters. Lives next to the log file under `~/.local/menu-roulette`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::format::{FieldDescriptor, FieldKind, OptionEntry, OptionSet};
use crate::resolver::MenuResolver;
use crate::source::{CommandSource, JsonFileSource, RecordSource};

pub const DEFAULT_TITLE: &str = "What should we eat today?";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_THEME: &str = "nord";

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct TableRef {
    #[serde(default, alias = "worksheetId")]
    pub table_id: String,
    #[serde(default, alias = "viewId")]
    pub view_id: Option<String>,
}

/// Column definition as exported by the host.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColumnConfig {
    #[serde(alias = "controlId")]
    pub id: String,
    #[serde(alias = "type")]
    pub kind: u32,
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl ColumnConfig {
    pub fn descriptor(&self) -> FieldDescriptor {
        let descriptor = FieldDescriptor::new(self.id.clone(), FieldKind::from_code(self.kind));
        if self.options.is_empty() {
            descriptor
        } else {
            descriptor.with_options(self.options.iter().cloned().collect::<OptionSet>())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Params {
    /// Column ids to sample from each record.
    #[serde(default, alias = "field")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Free-form list typed by the operator; wins over everything else.
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    File { path: PathBuf },
    Command { command: String },
}

impl SourceConfig {
    pub fn build(&self) -> Arc<dyn RecordSource> {
        match self {
            SourceConfig::File { path } => Arc::new(JsonFileSource::new(path.clone())),
            SourceConfig::Command { command } => Arc::new(CommandSource::new(command.clone())),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub table: TableRef,
    #[serde(default, alias = "controls")]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            table: TableRef::default(),
            columns: Vec::new(),
            params: Params::default(),
            source: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            theme: default_theme(),
        }
    }
}

impl ConfigFile {
    /// Load the file, writing the defaults first if it does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("Unable to read {}", path.display()))?;
            let parsed: ConfigFile = serde_json::from_str(&data)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            Ok(parsed)
        } else {
            let default = Self::default();
            default.save(path)?;
            Ok(default)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).with_context(|| format!("Unable to write {}", path.display()))?;
        Ok(())
    }

    pub fn title(&self) -> &str {
        self.params
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    /// Descriptors for the selected fields. Ids without a column definition are skipped.
    pub fn field_descriptors(&self) -> Vec<FieldDescriptor> {
        self.params
            .fields
            .iter()
            .filter_map(|id| {
                let column = self.columns.iter().find(|column| &column.id == id);
                if column.is_none() {
                    tracing::debug!(field = %id, "selected field has no column definition");
                }
                column.map(ColumnConfig::descriptor)
            })
            .collect()
    }

    pub fn resolver(&self) -> MenuResolver {
        MenuResolver::new(
            self.params.text.clone(),
            self.field_descriptors(),
            self.table.table_id.clone(),
            self.table.view_id.clone(),
        )
    }

    pub fn record_source(&self) -> Option<Arc<dyn RecordSource>> {
        self.source.as_ref().map(SourceConfig::build)
    }
}

pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_file_name: &'static str,
}

impl AppPaths {
    pub fn new(config_override: Option<&Path>) -> Result<Self> {
        let config_dir = match config_override.and_then(Path::parent) {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            Some(_) => PathBuf::from("."),
            None => {
                let home = dirs::home_dir().context("Unable to determine home directory")?;
                home.join(".local/menu-roulette")
            }
        };
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Unable to create {}", config_dir.display()))?;
        let config_file = match config_override {
            Some(path) => path.to_path_buf(),
            None => config_dir.join("config.json"),
        };
        Ok(Self {
            config_dir,
            config_file,
            log_file_name: "menu-roulette.log",
        })
    }

    pub fn log_file(&self) -> PathBuf {
        self.config_dir.join(self.log_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_EXPORT: &str = r#"{
        "table": { "worksheetId": "orders", "viewId": "v1" },
        "controls": [
            { "controlId": "dish", "type": 2 },
            { "controlId": "tag", "type": 11, "options": [ { "key": "k1", "value": "Spicy" } ] },
            { "controlId": "cook", "type": 26 }
        ],
        "params": { "field": ["tag", "missing", "dish"] },
        "source": { "kind": "command", "command": "cat rows.json" }
    }"#;

    #[test]
    fn accepts_host_field_names() {
        let config: ConfigFile = serde_json::from_str(HOST_EXPORT).unwrap();
        assert_eq!(config.table.table_id, "orders");
        assert_eq!(config.table.view_id.as_deref(), Some("v1"));
        assert_eq!(config.columns.len(), 3);
        assert_eq!(config.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(
            config.source,
            Some(SourceConfig::Command {
                command: "cat rows.json".into()
            })
        );
    }

    #[test]
    fn descriptors_follow_selected_field_order() {
        let config: ConfigFile = serde_json::from_str(HOST_EXPORT).unwrap();
        let descriptors = config.field_descriptors();
        let ids: Vec<_> = descriptors.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["tag", "dish"]);
        assert_eq!(descriptors[0].kind, FieldKind::Choice);
        assert!(descriptors[0].options.is_some());
        assert_eq!(descriptors[1].kind, FieldKind::Other(2));
        assert!(descriptors[1].options.is_none());
    }

    #[test]
    fn title_falls_back_to_default() {
        let mut config = ConfigFile::default();
        assert_eq!(config.title(), DEFAULT_TITLE);
        config.params.title = Some("   ".into());
        assert_eq!(config.title(), DEFAULT_TITLE);
        config.params.title = Some("Lunch?".into());
        assert_eq!(config.title(), "Lunch?");
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let mut config = ConfigFile::default();
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(15)));
        config.fetch_timeout_secs = 0;
        assert_eq!(config.fetch_timeout(), None);
    }

    #[test]
    fn load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, ConfigFile::default());
        assert!(path.exists());

        let mut changed = loaded.clone();
        changed.params.text = Some("Tacos, Pho".into());
        changed.save(&path).unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap(), changed);
    }

    #[test]
    fn load_reports_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid configuration"));
    }

    #[test]
    fn paths_follow_config_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picker.json");
        let paths = AppPaths::new(Some(&path)).unwrap();
        assert_eq!(paths.config_file, path);
        assert_eq!(paths.log_file(), dir.path().join("menu-roulette.log"));
    }
}
