use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use deposit_flow::config::RuntimeConfig;
use deposit_flow::connector::local::LocalSignerProvider;
use deposit_flow::connector::{Connector, WalletKind};
use deposit_flow::model::NetworkKey;

/// Entry point for the `sign` command: connect the local wallet and print a
/// `personal_sign` signature.
pub fn run(message: &str, network: NetworkKey) -> Result<()> {
    run_with(&RuntimeConfig::from_env()?, message, network)
}

fn run_with(config: &RuntimeConfig, message: &str, network: NetworkKey) -> Result<()> {
    config.require_access()?;
    let signer = config.signer()?;
    let registry = Arc::new(config.registry().context("loading chain registry")?);
    let chain = registry
        .by_key(network)
        .ok_or_else(|| anyhow!("network {network} is not in the chain registry"))?
        .clone();

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(async {
        let connector = Connector::new(WalletKind::Injected, registry.clone());
        connector.attach(Arc::new(LocalSignerProvider::new(signer, registry.clone(), chain.clone())));
        let connected = connector.connect(chain.chain_id).await.context("connecting wallet")?;
        let signature = connector.sign_message(message).await.context("signing message")?;

        println!("address:   {}", connected.address.to_checksum(None));
        println!("signature: {signature}");
        Ok(())
    })
}
