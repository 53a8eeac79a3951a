pub mod amount;
pub mod chain;
pub mod intent;

pub use chain::{ChainDescriptor, ChainId, ChainRegistry, NetworkKey};
pub use intent::{TokenCurrency, TransactionIntent, TxHash};
