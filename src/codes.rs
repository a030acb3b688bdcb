// 🏷️ Transaction Codes - reference table + operator remapping table
// Both are read-only once loaded; the reconciliation run only looks things up.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Description shown for a code the table does not know
pub const UNKNOWN_DESCRIPTION: &str = "Unknown";

// ============================================================================
// CODE TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionClass {
    #[serde(alias = "CREDIT", alias = "cr", alias = "CR")]
    Credit,
    #[serde(alias = "DEBIT", alias = "dr", alias = "DR")]
    Debit,
}

impl TransactionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionClass::Credit => "credit",
            TransactionClass::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub description: String,
    #[serde(rename = "type")]
    pub class: TransactionClass,
}

/// Transaction code → {description, class}
///
/// Loaded from `transaction_codes.json`:
/// ```json
/// { "21": { "description": "Salary credit", "type": "credit" } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    entries: HashMap<String, CodeEntry>,
}

impl CodeTable {
    pub fn new() -> Self {
        CodeTable::default()
    }

    /// Load the table from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read code table: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: HashMap<String, CodeEntry> =
            serde_json::from_str(content).context("Failed to parse code table JSON")?;

        Ok(CodeTable { entries })
    }

    /// Builder used mostly by tests and fixtures
    pub fn with_code(mut self, code: &str, description: &str, class: TransactionClass) -> Self {
        self.entries.insert(
            code.to_string(),
            CodeEntry {
                description: description.to_string(),
                class,
            },
        );
        self
    }

    /// `None` when the code is absent; never an error
    pub fn lookup(&self, code: &str) -> Option<&CodeEntry> {
        self.entries.get(code)
    }

    pub fn class_of(&self, code: &str) -> Option<TransactionClass> {
        self.lookup(code).map(|entry| entry.class)
    }

    pub fn describe(&self, code: &str) -> &str {
        self.lookup(code)
            .map(|entry| entry.description.as_str())
            .unwrap_or(UNKNOWN_DESCRIPTION)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// CODE MAPPINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMapping {
    pub old_code: String,
    pub new_code: String,
}

/// Operator-maintained old → new code remaps (`code_mapping.json`)
#[derive(Debug, Clone, Default)]
pub struct CodeMappings {
    mappings: Vec<CodeMapping>,
}

impl CodeMappings {
    pub fn new(mappings: Vec<CodeMapping>) -> Self {
        CodeMappings { mappings }
    }

    /// A missing file means "no mappings", not a failure
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(CodeMappings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read code mapping: {:?}", path))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        // BTreeMap keeps the mapping order stable across runs
        let raw: BTreeMap<String, String> =
            serde_json::from_str(content).context("Failed to parse code mapping JSON")?;

        Ok(CodeMappings {
            mappings: raw
                .into_iter()
                .map(|(old_code, new_code)| CodeMapping { old_code, new_code })
                .collect(),
        })
    }

    pub fn all(&self) -> &[CodeMapping] {
        &self.mappings
    }

    /// Mappings whose old code is one of `codes`
    pub fn applicable<'a, I>(&self, codes: I) -> Vec<CodeMapping>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let wanted: Vec<&String> = codes.into_iter().collect();
        self.mappings
            .iter()
            .filter(|m| wanted.iter().any(|code| **code == m.old_code))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
