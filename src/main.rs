use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod list_chains;
mod query;
mod sign;
mod transfer;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("setting default subscriber failed: {e}"))?;

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Chains { json } => list_chains::run(json),
        cli::Command::Balance {
            network,
            token,
            wallet,
        } => query::run(network, token.as_deref(), wallet.as_deref()),
        cli::Command::Deposit {
            network,
            to,
            token,
            amount,
            start_network,
        } => transfer::run(&transfer::TransferArgs {
            network,
            to,
            token,
            amount,
            start_network,
        }),
        cli::Command::Sign { message, network } => sign::run(&message, network),
    }
}
