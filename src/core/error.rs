use std::path::PathBuf;

use thiserror::Error;

use super::types::{Entity, Variable};

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("missing input file: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data in {context}: {reason}")]
    InvalidData { context: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid household input: {0}")]
    InvalidInput(String),

    #[error("unknown reform ID(s): {}", ids.join(", "))]
    UnknownReform { ids: Vec<String> },

    #[error("length mismatch: {left} values vs {right} {what}")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("weight at index {index} must be finite and >= 0, got {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("samples carry different weights; difference requires identical weights")]
    WeightMismatch,

    #[error("input for {variable} has {actual} entries, expected {expected} ({entity})")]
    InputLength {
        variable: Variable,
        entity: Entity,
        expected: usize,
        actual: usize,
    },

    #[error("reform {reform_id} failed in {year}: {source}")]
    Reform {
        reform_id: String,
        year: i32,
        #[source]
        source: Box<BudgetError>,
    },
}

impl BudgetError {
    pub fn invalid_data(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_missing_file(&self) -> bool {
        match self {
            Self::MissingFile { .. } => true,
            Self::Reform { source, .. } => source.is_missing_file(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BudgetError>;
