use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use thiserror::Error;

use crate::evm::IERC20;
use crate::model::ChainDescriptor;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("invalid RPC URL for {chain}: {reason}")]
    InvalidRpcUrl { chain: String, reason: String },

    #[error("{call} failed: {reason}")]
    Rpc { call: &'static str, reason: String },

    #[error("{call} timed out after {secs}s")]
    Timeout { call: &'static str, secs: u64 },
}

/// Token metadata and raw balance as read from the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub raw: U256,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
}

/// Read-only on-chain lookups used by the balance fetcher.
#[async_trait]
pub trait BalanceSource: Send + Sync + 'static {
    async fn token_balance(
        &self,
        chain: &ChainDescriptor,
        token: Address,
        wallet: Address,
    ) -> Result<TokenInfo, BalanceError>;

    async fn native_balance(&self, chain: &ChainDescriptor, wallet: Address) -> Result<U256, BalanceError>;
}

// ── JSON-RPC source ──────────────────────────────────────────────────

/// Queries the chain's public RPC endpoint directly, independent of the
/// wallet, so balances can be shown before a wallet is connected.
#[derive(Debug, Default, Clone)]
pub struct RpcBalanceSource;

/// Create an alloy HTTP provider for a given chain.
pub fn create_provider(chain: &ChainDescriptor) -> Result<impl Provider + Clone, BalanceError> {
    let url = chain.rpc_url.parse().map_err(|e| BalanceError::InvalidRpcUrl {
        chain: chain.id.to_string(),
        reason: format!("{e}"),
    })?;
    Ok(ProviderBuilder::new().connect_http(url))
}

async fn with_timeout<T, E: std::fmt::Display>(
    call: &'static str,
    fut: impl IntoFuture<Output = Result<T, E>>,
) -> Result<T, BalanceError> {
    match tokio::time::timeout(RPC_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BalanceError::Rpc {
            call,
            reason: e.to_string(),
        }),
        Err(_) => Err(BalanceError::Timeout {
            call,
            secs: RPC_TIMEOUT.as_secs(),
        }),
    }
}

#[async_trait]
impl BalanceSource for RpcBalanceSource {
    async fn token_balance(
        &self,
        chain: &ChainDescriptor,
        token: Address,
        wallet: Address,
    ) -> Result<TokenInfo, BalanceError> {
        let provider = create_provider(chain)?;
        let erc20 = IERC20::new(token, &provider);

        let balance_call = erc20.balanceOf(wallet);
        let decimals_call = erc20.decimals();
        let symbol_call = erc20.symbol();
        let name_call = erc20.name();
        let (raw, decimals, symbol, name) = tokio::try_join!(
            with_timeout("balanceOf()", balance_call.call()),
            with_timeout("decimals()", decimals_call.call()),
            with_timeout("symbol()", symbol_call.call()),
            with_timeout("name()", name_call.call()),
        )?;

        Ok(TokenInfo {
            raw,
            decimals,
            symbol,
            name,
        })
    }

    async fn native_balance(&self, chain: &ChainDescriptor, wallet: Address) -> Result<U256, BalanceError> {
        let provider = create_provider(chain)?;
        with_timeout("eth_getBalance", provider.get_balance(wallet)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out() {
        let stalled = std::future::pending::<Result<U256, String>>();
        let err = with_timeout("balanceOf()", stalled).await.unwrap_err();
        assert_eq!(
            err,
            BalanceError::Timeout {
                call: "balanceOf()",
                secs: 10
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_inside_the_limit_succeeds() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(9)).await;
            Ok::<_, String>(18u8)
        };
        assert_eq!(with_timeout("decimals()", slow).await, Ok(18));
    }

    #[tokio::test]
    async fn call_error_keeps_its_message() {
        let failing = async { Err::<u8, _>("execution reverted") };
        assert_eq!(
            with_timeout("decimals()", failing).await,
            Err(BalanceError::Rpc {
                call: "decimals()",
                reason: "execution reverted".into()
            })
        );
    }
}
