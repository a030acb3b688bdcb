// ⚙️ Settings - one explicit configuration value built at startup
//
// Everything that used to be a process-wide setting lives here and is passed
// by reference into the components that need it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codes::{CodeMappings, CodeTable};

pub const CODE_TABLE_FILE: &str = "transaction_codes.json";
pub const CODE_MAPPING_FILE: &str = "code_mapping.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Directory holding `transaction_codes.json` and `code_mapping.json`
    pub config_dir: PathBuf,

    /// Outer reconciliation attempts before giving up
    pub max_attempts: u32,

    /// Pause after a remap before re-reading the branch
    pub settle_delay_ms: u64,

    /// Approve code remaps without asking
    pub auto_approve: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from("clearing.db"),
            config_dir: PathBuf::from("config"),
            max_attempts: 3,
            settle_delay_ms: 500,
            auto_approve: false,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;

        let settings: Settings =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Settings file if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Settings::default())
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn code_table_path(&self) -> PathBuf {
        self.config_dir.join(CODE_TABLE_FILE)
    }

    pub fn code_mapping_path(&self) -> PathBuf {
        self.config_dir.join(CODE_MAPPING_FILE)
    }

    pub fn load_code_table(&self) -> Result<CodeTable> {
        CodeTable::from_file(self.code_table_path())
    }

    pub fn load_code_mappings(&self) -> Result<CodeMappings> {
        CodeMappings::from_file(self.code_mapping_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.settle_delay(), Duration::from_millis(500));
        assert!(!settings.auto_approve);
        assert_eq!(
            settings.code_table_path(),
            PathBuf::from("config").join(CODE_TABLE_FILE)
        );
    }

    #[test]
    fn test_partial_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"max_attempts": 5, "auto_approve": true}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert!(settings.auto_approve);
        assert_eq!(settings.settle_delay_ms, 500);
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_loads_code_files_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CODE_TABLE_FILE),
            r#"{"21": {"description": "Credit", "type": "credit"}}"#,
        )
        .unwrap();

        let settings = Settings {
            config_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };

        assert_eq!(settings.load_code_table().unwrap().len(), 1);
        assert!(settings.load_code_mappings().unwrap().is_empty());
    }
}
