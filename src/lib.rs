pub mod auth;
pub mod config;
pub mod crypto;
pub mod deadman;
pub mod io;
pub mod platform;
pub mod ui;
pub mod wipe;

// Re-export the main entry points for convenience
pub use auth::{AuthGate, GateOutcome};
pub use config::{Config, WipeAlgorithm};

use thiserror::Error;

/// Crate-wide error taxonomy. The UI only ever sees summary text derived
/// from these; raw diagnostics go to the log.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("configuration not found: {0}")]
    ConfigMissing(String),

    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("credential reference malformed: {0}")]
    Credential(String),

    #[error("authentication backend failed: {0}")]
    AuthBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("platform facility failed: {0}")]
    Platform(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod lib_tests;
