use alloy::primitives::{Address, U256};

use super::chain::ChainDescriptor;

/// An ERC-20 token with its decimals as resolved right before a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCurrency {
    pub address: Address,
    pub decimals: u8,
}

/// One deposit, ready to broadcast. The orchestrator holds at most one of
/// these per flow and moves it into the connector, so it cannot be sent twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub to_address: Address,
    pub network: ChainDescriptor,
    pub token: TokenCurrency,
    /// Decimal string as entered by the user.
    pub amount: String,
    /// `amount` scaled by `10^token.decimals`.
    pub base_units: U256,
}

/// Hash returned by the node when a transaction is broadcast. Kept as the
/// provider's hex string rather than a fixed-width type so whatever the wallet
/// returns is shown back to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(String);

impl TxHash {
    /// Accepts `0x`-prefixed, non-empty hex.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix("0x")?;
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(TxHash(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
