use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use serde_json::json;

use deposit_flow::balance::{BalanceFetcher, BalanceState, RpcBalanceSource};
use deposit_flow::config::RuntimeConfig;
use deposit_flow::evm::parse_address;
use deposit_flow::model::{ChainDescriptor, NetworkKey};

/// Entry point for the `balance` command.
/// Reads a native or ERC-20 balance over the network's public RPC and prints it
/// as a JSON object.
pub fn run(network: NetworkKey, token: Option<&str>, wallet: Option<&str>) -> Result<()> {
    let config = RuntimeConfig::from_env()?;
    config.require_access()?;

    let registry = config.registry().context("loading chain registry")?;
    let chain = registry
        .by_key(network)
        .ok_or_else(|| anyhow!("network {network} is not in the chain registry"))?
        .clone();

    let token = token.map(parse_cli_address).transpose()?;
    let wallet = match wallet {
        Some(w) => parse_cli_address(w)?,
        None => config
            .wallet_address()
            .context("no --wallet given and no key configured")?,
    };

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    let state = rt.block_on(query_async(&chain, token, wallet))?;

    if let Some(err) = &state.error {
        anyhow::bail!("balance query failed: {err}");
    }

    let result = json!({
        "network": chain.id,
        "chain_id": chain.chain_id,
        "wallet": wallet.to_checksum(None),
        "token": token.map(|t| t.to_checksum(None)),
        "symbol": state.symbol,
        "name": state.name,
        "decimals": state.decimals,
        "balance": state.balance,
        "raw": state.raw.map(|r| r.to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn query_async(chain: &ChainDescriptor, token: Option<Address>, wallet: Address) -> Result<BalanceState> {
    let fetcher = BalanceFetcher::new(Arc::new(RpcBalanceSource));
    let mut updates = fetcher.subscribe();
    fetcher.fetch(Some(chain), token, Some(wallet));

    let state = updates
        .wait_for(|s| !s.loading)
        .await
        .map_err(|_| anyhow!("balance fetcher stopped"))?
        .clone();
    Ok(state)
}

pub(crate) fn parse_cli_address(s: &str) -> Result<Address> {
    parse_address(s.trim()).ok_or_else(|| anyhow!("'{s}' is not a 0x-prefixed 20-byte address"))
}
