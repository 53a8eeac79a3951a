use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use deposit_flow::config::RuntimeConfig;
use deposit_flow::connector::local::LocalSignerProvider;
use deposit_flow::connector::{Connector, WalletKind};
use deposit_flow::deposit::{DepositFlow, DepositForm, DepositStage, DepositTarget};
use deposit_flow::evm::short_addr;
use deposit_flow::model::NetworkKey;
use deposit_flow::notify::TracingNotifier;
use deposit_flow::watcher::NetworkWatcher;

use crate::query::parse_cli_address;

const STAGE_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_STEPS: usize = 8;

pub struct TransferArgs {
    pub network: NetworkKey,
    pub to: String,
    pub token: String,
    pub amount: String,
    pub start_network: Option<NetworkKey>,
}

/// Entry point for the `deposit` command.
/// Walks one deposit flow from wallet connection to a broadcast transaction
/// using the configured key as the wallet.
pub fn run(args: &TransferArgs) -> Result<()> {
    let config = RuntimeConfig::from_env()?;
    config.require_access()?;
    let signer = config.signer()?;
    let registry = Arc::new(config.registry().context("loading chain registry")?);

    let required = registry
        .by_key(args.network)
        .ok_or_else(|| anyhow!("network {} is not in the chain registry", args.network))?
        .clone();
    let start_key = args.start_network.unwrap_or(args.network);
    let start = registry
        .by_key(start_key)
        .ok_or_else(|| anyhow!("network {start_key} is not in the chain registry"))?
        .clone();

    let target = DepositTarget {
        to_address: parse_cli_address(&args.to)?,
        network: required,
    };
    let form = DepositForm {
        token_address: args.token.clone(),
        amount: args.amount.clone(),
    };

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(async {
        let connector = Arc::new(Connector::new(WalletKind::Injected, registry.clone()));
        connector.attach(Arc::new(LocalSignerProvider::new(signer, registry.clone(), start)));

        let watcher = NetworkWatcher::new(registry.clone());
        watcher.attach(&connector);

        let flow = DepositFlow::open(target, connector.clone(), Arc::new(TracingNotifier));
        let result = drive(&flow, &form).await;
        watcher.detach();
        result
    })
}

async fn drive(flow: &DepositFlow, form: &DepositForm) -> Result<()> {
    let mut stages = flow.stages();

    for _ in 0..MAX_STEPS {
        let stage = flow.stage();
        info!(?stage, "deposit stage");
        match stage {
            DepositStage::ConnectWallet => {
                let connected = flow.connect_wallet().await?;
                info!(address = %short_addr(&connected.address), chain = %connected.chain_id, "connected");
            }
            DepositStage::SwitchNetwork => {
                flow.switch_network().await?;
                tokio::time::timeout(STAGE_TIMEOUT, stages.wait_for(|s| *s != DepositStage::SwitchNetwork))
                    .await
                    .context("wallet did not report the new network")?
                    .map_err(|_| anyhow!("deposit flow stopped"))?;
            }
            DepositStage::Deposit => {
                flow.submit(form).await?;
            }
            DepositStage::Loading | DepositStage::WaitingTransaction => {
                tokio::time::timeout(STAGE_TIMEOUT, stages.changed())
                    .await
                    .context("timed out waiting for the deposit flow")?
                    .map_err(|_| anyhow!("deposit flow stopped"))?;
            }
            DepositStage::ConfirmTransaction => {
                let confirmation = flow
                    .confirmation()
                    .ok_or_else(|| anyhow!("no transaction recorded"))?;
                println!("transaction: {}", confirmation.tx_hash);
                println!("explorer:    {}", confirmation.explorer_url);
                flow.close();
                return Ok(());
            }
            DepositStage::Closed => bail!("deposit flow was closed"),
        }
    }
    bail!("deposit did not complete after {MAX_STEPS} steps")
}
