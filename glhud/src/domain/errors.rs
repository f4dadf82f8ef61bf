//! Structured error types for glhud
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No loader library matching {0} is mapped in this process")]
    LoaderNotMapped(String),

    #[error("Failed to parse ELF image {library}: {error}")]
    ElfParseFailed { library: String, error: String },

    #[error("Symbol {symbol} not found in dynamic symbol table of {library}")]
    SymbolNotFound { symbol: &'static str, library: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to open {0} through the real loader")]
    LibraryOpenFailed(String),

    #[error("Driver library is missing required symbol {0}")]
    SymbolMissing(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read overlay config {path}: {source}")]
    Unreadable { path: String, source: std::io::Error },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
