use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the local key pair and the secrets encrypted with it.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to generate key pair: {0}")]
    KeyGeneration(#[source] rsa::Error),

    #[error("key file '{}' is missing; run `parley --reset` to re-enter your credentials", .path.display())]
    KeyMissing { path: PathBuf },

    #[error("key file '{}' is not a valid PEM key ({reason}); run `parley --reset` to re-enter your credentials", .path.display())]
    InvalidKey { path: PathBuf, reason: String },

    #[error("failed to encrypt secret: {0}")]
    Encryption(#[source] rsa::Error),

    #[error("stored secret could not be decrypted ({reason}); run `parley --reset` to re-enter your credentials")]
    Decryption { reason: String },

    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CredentialError {
    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        Self::Decryption {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("failed to access config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file '{}' is malformed ({source}); run `parley --reset` to re-enter your credentials", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not determine a per-user config directory; set PARLEY_CONFIG_DIR")]
    NoConfigDir,

    #[error("no API key available; pass --api-key, set API_KEY, or enter one when prompted")]
    MissingApiKey,

    #[error("failed to read API key from terminal: {0}")]
    Prompt(#[source] io::Error),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the persisted state is unusable and only a reset recovers it.
    pub fn needs_reset(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. }
                | Self::Credential(
                    CredentialError::Decryption { .. }
                        | CredentialError::KeyMissing { .. }
                        | CredentialError::InvalidKey { .. }
                )
        )
    }
}
