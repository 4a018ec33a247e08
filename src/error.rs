use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum XrefError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid element kind: {0}")]
    InvalidKind(String),

    #[error("failed to parse gene-reaction rule '{rule}': {message}")]
    GprParse { rule: String, message: String },

    #[error("duplicate namespace prefix in registry: {0}")]
    DuplicatePrefix(String),

    #[error("failed to read registry at {0}")]
    #[diagnostic(help("download the identifiers.org registry dump or set `registry` in gem-xref.json"))]
    RegistryRead(PathBuf),

    #[error("failed to parse registry: {0}")]
    RegistryParse(String),

    #[error("failed to read cross-reference table at {0}")]
    XrefTableRead(PathBuf),

    #[error("failed to parse cross-reference table: {0}")]
    XrefTableParse(String),

    #[error("missing config file gem-xref.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read model at {0}")]
    ModelRead(PathBuf),

    #[error("failed to parse model: {0}")]
    ModelParse(String),

    #[error("failed to write model: {0}")]
    ModelWrite(String),

    #[error("reaction not found in model: {0}")]
    ReactionNotFound(String),
}
