use anyhow::{Context, Result};

use deposit_flow::config::RuntimeConfig;

/// Print the chain registry, either as a table or as JSON.
pub fn run(json: bool) -> Result<()> {
    let config = RuntimeConfig::from_env()?;
    let registry = config.registry().context("loading chain registry")?;

    if json {
        let chains: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&chains)?);
        return Ok(());
    }

    println!("{:<12} {:>10}  {:<8} {:<26} EXPLORER", "NETWORK", "CHAIN ID", "NATIVE", "NAME");
    for chain in registry.iter() {
        println!(
            "{:<12} {:>10}  {:<8} {:<26} {}",
            chain.id.as_str(),
            chain.chain_id.as_u64(),
            chain.native_symbol,
            chain.name,
            chain.explorer_url,
        );
    }
    Ok(())
}
