use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiVolumeError {
    #[error("Catalog file not found: {0}")]
    MissingCatalogFile(String),

    #[error("Invalid catalog {file}: {details}")]
    InvalidCatalog { file: String, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KpiVolumeError>;

/// Why a single formula could not produce a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Syntax error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Catalog record has no value for '{0}'")]
    MissingCatalogField(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result is not a finite number")]
    NonFinite,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to evaluate formula '{formula}': {source}")]
pub struct FormulaEvaluationError {
    pub formula: String,
    #[source]
    pub source: FormulaError,
}
