use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;

use crate::model::chain::RegistryError;
use crate::model::ChainRegistry;

pub const PRIVATE_KEY_VAR: &str = "DEPOSIT_FLOW_PRIVATE_KEY";
pub const PRIVATE_KEY_FILE_VAR: &str = "DEPOSIT_FLOW_PRIVATE_KEY_FILE";
pub const ACCESS_TOKEN_VAR: &str = "DEPOSIT_FLOW_ACCESS_TOKEN";
pub const CHAINS_VAR: &str = "DEPOSIT_FLOW_CHAINS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DEPOSIT_FLOW_PRIVATE_KEY or DEPOSIT_FLOW_PRIVATE_KEY_FILE required")]
    MissingPrivateKey,

    #[error("failed to read private key from {}: {source}", path.display())]
    PrivateKeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("DEPOSIT_FLOW_ACCESS_TOKEN not set; sign in first")]
    MissingAccessToken,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Settings taken from the environment.
#[derive(Clone, Default)]
pub struct RuntimeConfig {
    /// Hex private key, with or without `0x`.
    pub private_key: Option<String>,
    pub access_token: Option<String>,
    /// JSON file of chain descriptors replacing the built-in table.
    pub chains_path: Option<PathBuf>,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("chains_path", &self.chains_path)
            .finish()
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let private_key = match var(PRIVATE_KEY_VAR) {
            Some(pk) => Some(pk),
            None => match var(PRIVATE_KEY_FILE_VAR) {
                Some(path) => Some(read_key_file(Path::new(&path))?),
                None => None,
            },
        };

        Ok(RuntimeConfig {
            private_key,
            access_token: var(ACCESS_TOKEN_VAR),
            chains_path: var(CHAINS_VAR).map(PathBuf::from),
        })
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, ConfigError> {
        let key = self.private_key.as_deref().ok_or(ConfigError::MissingPrivateKey)?;
        key.trim_start_matches("0x")
            .parse()
            .map_err(|e| ConfigError::InvalidPrivateKey(format!("{e}")))
    }

    pub fn wallet_address(&self) -> Result<Address, ConfigError> {
        Ok(self.signer()?.address())
    }

    /// Commands that touch a wallet or the network need a signed-in user.
    pub fn require_access(&self) -> Result<&str, ConfigError> {
        self.access_token
            .as_deref()
            .ok_or(ConfigError::MissingAccessToken)
    }

    /// The configured chain table, or the built-in one.
    pub fn registry(&self) -> Result<ChainRegistry, ConfigError> {
        match &self.chains_path {
            Some(path) => Ok(ChainRegistry::load(path)?),
            None => Ok(ChainRegistry::builtin()),
        }
    }
}

fn read_key_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ConfigError::PrivateKeyFile {
            path: path.to_path_buf(),
            source,
        })
}
