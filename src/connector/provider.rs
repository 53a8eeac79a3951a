//! The narrow EIP-1193 surface the rest of the crate depends on.
//!
//! Every concrete wallet is adapted to [`Eip1193Provider`] at a single point of
//! contact. Nothing outside `connector` sees raw provider responses.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

/// Identifies one provider instance. Listener bookkeeping is keyed on this.
pub type ProviderId = u64;

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique [`ProviderId`].
pub fn next_provider_id() -> ProviderId {
    NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed)
}

/// EIP-1193 error codes the connector distinguishes.
pub mod codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    /// `wallet_switchEthereumChain` on a chain the wallet has never seen.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const INTERNAL: i64 = -32603;
}

/// Raw error as reported by the provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        ProviderError {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, message)
    }
}

/// Notifications pushed by the provider, in emit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New chain id as a hex string.
    ChainChanged(String),
    /// Accounts now exposed to the application. Empty means locked or revoked.
    AccountsChanged(Vec<String>),
    Disconnect,
}

#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Generic JSON-RPC passthrough (`provider.request({ method, params })`).
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Receive provider events. Each call creates a new listener; dropping the
    /// receiver removes it.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// `eth_requestAccounts`: prompts the user and returns exposed addresses.
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let value = self.request("eth_requestAccounts", json!([])).await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::internal(format!("eth_requestAccounts: {e}")))
    }

    /// `eth_chainId`: current chain as a hex string.
    async fn chain_id(&self) -> Result<String, ProviderError> {
        let value = self.request("eth_chainId", json!([])).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::internal(format!("eth_chainId returned {value}")))
    }
}
