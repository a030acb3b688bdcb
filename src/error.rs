// 🚨 Clearing Errors - failure taxonomy for reconciliation runs
//
// Truncated trailing records never show up here: the segmenter absorbs them.
// Everything below stops the affected pass and is reported to the operator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClearingError {
    /// Unknown transaction codes with no applicable entry in the mapping table
    #[error("unresolved transaction codes {codes:?}: no applicable code mapping")]
    UnresolvedCodes { codes: Vec<String> },

    /// The operator refused (or never confirmed) the proposed remap
    #[error("code remap for {codes:?} was not confirmed by the operator")]
    MappingDeclined { codes: Vec<String> },

    /// The healing loop did not converge within its attempt budget
    #[error(
        "branch {branch_code} still has unknown codes {codes:?} after {attempts} attempts"
    )]
    RetryBudgetExceeded {
        branch_code: String,
        attempts: u32,
        codes: Vec<String>,
    },

    /// Connection or transaction failure against the relational store
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClearingError {
    /// Codes carried by the error, if any
    pub fn codes(&self) -> &[String] {
        match self {
            ClearingError::UnresolvedCodes { codes }
            | ClearingError::MappingDeclined { codes }
            | ClearingError::RetryBudgetExceeded { codes, .. } => codes,
            _ => &[],
        }
    }
}

pub type ClearingResult<T> = std::result::Result<T, ClearingError>;
