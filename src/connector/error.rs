use thiserror::Error;

use super::provider::{codes, ProviderError};
use crate::model::ChainId;

/// Connector failures, normalized from raw provider errors. Callers match on
/// these and never on provider error shapes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("request was rejected in the wallet: {0}")]
    UserRejected(String),

    #[error("chain {0} is not supported")]
    UnsupportedChain(ChainId),

    #[error("no wallet provider is available")]
    ProviderUnavailable,

    #[error("the wallet did not expose any account")]
    NoAccounts,

    #[error("wallet RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("the wallet session was reset while connecting")]
    SessionReset,

    #[error("unexpected wallet response: {0}")]
    InvalidResponse(String),
}

impl ConnectorError {
    /// Map a raw provider error. `chain` is the chain the failing request was
    /// about, used when the wallet reports it does not know that chain.
    pub(crate) fn from_provider(err: ProviderError, chain: Option<ChainId>) -> Self {
        match (err.code, chain) {
            (codes::USER_REJECTED, _) => ConnectorError::UserRejected(err.message),
            (codes::UNRECOGNIZED_CHAIN, Some(chain)) => ConnectorError::UnsupportedChain(chain),
            (codes::DISCONNECTED, _) => ConnectorError::ProviderUnavailable,
            (code, _) => ConnectorError::Rpc {
                code,
                message: err.message,
            },
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, ConnectorError::UserRejected(_))
    }
}

impl From<ProviderError> for ConnectorError {
    fn from(err: ProviderError) -> Self {
        ConnectorError::from_provider(err, None)
    }
}
