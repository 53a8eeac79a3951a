//! Chain-aware wallet connection and token-deposit orchestration over an
//! EIP-1193 wallet provider.

pub mod balance;
pub mod config;
pub mod connector;
pub mod deposit;
pub mod evm;
pub mod model;
pub mod notify;
pub mod watcher;
