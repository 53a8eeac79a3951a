use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// EVM chain id. Providers carry these as `0x`-prefixed hex strings, so that is
/// the canonical text form in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid chain id '{0}'")]
pub struct ParseChainIdError(pub String);

impl FromStr for ChainId {
    type Err = ParseChainIdError;

    /// Accepts `0x38`, `0X38` and plain decimal `56`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16),
            Some(_) => return Err(ParseChainIdError(s.to_string())),
            None => s.parse::<u64>(),
        };
        parsed
            .map(ChainId)
            .map_err(|_| ParseChainIdError(s.to_string()))
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The fixed set of networks the application knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKey {
    Ethereum,
    Sepolia,
    BscMainnet,
    BscTestnet,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
}

impl NetworkKey {
    pub const ALL: [NetworkKey; 8] = [
        NetworkKey::Ethereum,
        NetworkKey::Sepolia,
        NetworkKey::BscMainnet,
        NetworkKey::BscTestnet,
        NetworkKey::Polygon,
        NetworkKey::Arbitrum,
        NetworkKey::Optimism,
        NetworkKey::Base,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkKey::Ethereum => "ethereum",
            NetworkKey::Sepolia => "sepolia",
            NetworkKey::BscMainnet => "bsc_mainnet",
            NetworkKey::BscTestnet => "bsc_testnet",
            NetworkKey::Polygon => "polygon",
            NetworkKey::Arbitrum => "arbitrum",
            NetworkKey::Optimism => "optimism",
            NetworkKey::Base => "base",
        }
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkKey {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        match wanted.as_str() {
            "bsc" => return Ok(NetworkKey::BscMainnet),
            "mainnet" => return Ok(NetworkKey::Ethereum),
            _ => {}
        }
        NetworkKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| RegistryError::UnknownNetwork(s.to_string()))
    }
}

/// Static description of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub id: NetworkKey,
    pub chain_id: ChainId,
    /// Human-readable name shown to the wallet when the chain has to be added.
    pub name: String,
    pub rpc_url: String,
    /// Block explorer root, without a trailing slash.
    pub explorer_url: String,
    pub native_symbol: String,
    pub native_decimals: u8,
}

impl ChainDescriptor {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    fn builtin(
        id: NetworkKey,
        chain_id: u64,
        name: &str,
        rpc_url: &str,
        explorer_url: &str,
        native_symbol: &str,
    ) -> Self {
        ChainDescriptor {
            id,
            chain_id: ChainId(chain_id),
            name: name.into(),
            rpc_url: rpc_url.into(),
            explorer_url: explorer_url.into(),
            native_symbol: native_symbol.into(),
            native_decimals: 18,
        }
    }
}

// ── Built-in table ───────────────────────────────────────────────────

fn builtin_chains() -> Vec<ChainDescriptor> {
    use NetworkKey::*;
    vec![
        ChainDescriptor::builtin(Ethereum, 1, "Ethereum Mainnet", "https://eth.llamarpc.com", "https://etherscan.io", "ETH"),
        ChainDescriptor::builtin(Sepolia, 11155111, "Sepolia", "https://rpc.sepolia.org", "https://sepolia.etherscan.io", "ETH"),
        ChainDescriptor::builtin(BscMainnet, 56, "BNB Smart Chain", "https://bsc-dataseed.binance.org", "https://bscscan.com", "BNB"),
        ChainDescriptor::builtin(BscTestnet, 97, "BNB Smart Chain Testnet", "https://data-seed-prebsc-1-s1.binance.org:8545", "https://testnet.bscscan.com", "tBNB"),
        ChainDescriptor::builtin(Polygon, 137, "Polygon", "https://polygon-rpc.com", "https://polygonscan.com", "POL"),
        ChainDescriptor::builtin(Arbitrum, 42161, "Arbitrum One", "https://arb1.arbitrum.io/rpc", "https://arbiscan.io", "ETH"),
        ChainDescriptor::builtin(Optimism, 10, "OP Mainnet", "https://mainnet.optimism.io", "https://optimistic.etherscan.io", "ETH"),
        ChainDescriptor::builtin(Base, 8453, "Base", "https://mainnet.base.org", "https://basescan.org", "ETH"),
    ]
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("chain id {chain_id} is used by both {first} and {second}")]
    DuplicateChainId {
        chain_id: ChainId,
        first: NetworkKey,
        second: NetworkKey,
    },

    #[error("network {0} is listed twice")]
    DuplicateNetwork(NetworkKey),

    #[error("unknown network '{0}'")]
    UnknownNetwork(String),

    #[error("reading chain registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing chain registry: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable lookup table of supported networks, keyed both ways.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
    by_chain_id: HashMap<ChainId, usize>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainDescriptor>) -> Result<Self, RegistryError> {
        let mut by_chain_id = HashMap::with_capacity(chains.len());
        for (idx, chain) in chains.iter().enumerate() {
            if chains[..idx].iter().any(|c| c.id == chain.id) {
                return Err(RegistryError::DuplicateNetwork(chain.id));
            }
            if let Some(&prev) = by_chain_id.get(&chain.chain_id) {
                let first: &ChainDescriptor = &chains[prev];
                return Err(RegistryError::DuplicateChainId {
                    chain_id: chain.chain_id,
                    first: first.id,
                    second: chain.id,
                });
            }
            by_chain_id.insert(chain.chain_id, idx);
        }
        Ok(ChainRegistry { chains, by_chain_id })
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Self {
        let chains = builtin_chains();
        let by_chain_id = chains
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.chain_id, idx))
            .collect();
        ChainRegistry { chains, by_chain_id }
    }

    /// Parse a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let chains: Vec<ChainDescriptor> = serde_json::from_str(json)?;
        Self::new(chains)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<&ChainDescriptor> {
        self.by_chain_id.get(&chain_id).map(|&idx| &self.chains[idx])
    }

    pub fn by_key(&self, key: NetworkKey) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.id == key)
    }

    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.by_chain_id.contains_key(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_parses_hex_and_decimal() {
        assert_eq!("0x38".parse::<ChainId>().unwrap(), ChainId(56));
        assert_eq!("56".parse::<ChainId>().unwrap(), ChainId(56));
        assert_eq!(ChainId(56).to_string(), "0x38");
        assert!("0x".parse::<ChainId>().is_err());
        assert!("bsc".parse::<ChainId>().is_err());
    }

    #[test]
    fn builtin_registry_has_unique_chain_ids() {
        let builtin = ChainRegistry::builtin();
        assert!(ChainRegistry::new(builtin.iter().cloned().collect()).is_ok());
        assert_eq!(builtin.by_chain_id(ChainId(0x38)).unwrap().id, NetworkKey::BscMainnet);
    }

    #[test]
    fn duplicate_chain_id_is_rejected() {
        let mut chains: Vec<_> = ChainRegistry::builtin().iter().cloned().collect();
        chains[1].chain_id = chains[0].chain_id;
        assert!(matches!(
            ChainRegistry::new(chains),
            Err(RegistryError::DuplicateChainId { .. })
        ));
    }

    #[test]
    fn registry_loads_from_json() {
        let json = r#"[{
            "id": "bsc_testnet",
            "chain_id": "0x61",
            "name": "BSC Testnet",
            "rpc_url": "http://localhost:8545",
            "explorer_url": "https://testnet.bscscan.com/",
            "native_symbol": "tBNB",
            "native_decimals": 18
        }]"#;
        let registry = ChainRegistry::from_json(json).unwrap();
        let chain = registry.by_key(NetworkKey::BscTestnet).unwrap();
        assert_eq!(chain.chain_id, ChainId(97));
        assert_eq!(chain.tx_url("0xabc"), "https://testnet.bscscan.com/tx/0xabc");
    }

    #[test]
    fn network_key_aliases() {
        assert_eq!("bsc".parse::<NetworkKey>().unwrap(), NetworkKey::BscMainnet);
        assert_eq!("bsc-testnet".parse::<NetworkKey>().unwrap(), NetworkKey::BscTestnet);
        assert!("solana".parse::<NetworkKey>().is_err());
    }
}
