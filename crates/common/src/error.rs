//! Universal error types for cairn.

use thiserror::Error;

/// Top-level error type for all cairn operations.
#[derive(Debug, Error)]
pub enum CairnError {
    #[error("Upstream error ({source_name}): {message}")]
    Upstream {
        source_name: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet {address}: {message}")]
    Wallet { address: String, message: String },

    #[error("All wallet fetches failed")]
    AllWalletsFailed,

    #[error("{0}")]
    Other(String),
}

pub type CairnResult<T> = Result<T, CairnError>;

impl From<serde_json::Error> for CairnError {
    fn from(e: serde_json::Error) -> Self {
        CairnError::Parse(e.to_string())
    }
}

impl CairnError {
    /// Tag an error with the wallet address it occurred for.
    pub fn for_wallet(self, address: &str) -> Self {
        CairnError::Wallet {
            address: address.to_string(),
            message: self.to_string(),
        }
    }
}
