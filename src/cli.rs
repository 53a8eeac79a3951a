use clap::{Parser, Subcommand};

use deposit_flow::model::NetworkKey;

/// Connect a wallet to the required network and deposit ERC-20 tokens.
#[derive(Parser)]
#[command(name = "deposit-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the networks in the chain registry
    Chains {
        /// Output as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a native or ERC-20 balance
    Balance {
        /// Network to query (e.g. ethereum, bsc, base)
        #[arg(long)]
        network: NetworkKey,

        /// ERC-20 contract address; native currency when omitted
        #[arg(long)]
        token: Option<String>,

        /// Wallet to query; defaults to the configured key's address
        #[arg(long)]
        wallet: Option<String>,
    },

    /// Deposit tokens to an address on a required network
    Deposit {
        /// Network the deposit must happen on
        #[arg(long)]
        network: NetworkKey,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// ERC-20 contract address
        #[arg(long)]
        token: String,

        /// Amount in whole tokens (e.g. "1.5")
        #[arg(long)]
        amount: String,

        /// Network the wallet starts on; defaults to --network
        #[arg(long)]
        start_network: Option<NetworkKey>,
    },

    /// Sign a message with the configured key (personal_sign)
    Sign {
        /// Message to sign
        message: String,

        /// Network the wallet is connected on
        #[arg(long, default_value = "ethereum")]
        network: NetworkKey,
    },
}
