//! Deposit orchestrator: drives one token deposit from wallet connection to a
//! broadcast transaction.
//!
//! The stage is never stored. It is re-derived by [`derive_stage`] from the
//! connector's live session and the flow's transaction progress, both on
//! demand and whenever the session changes, so results of calls that raced
//! with an account or chain switch cannot leave the flow in a stale stage.

pub mod form;
pub mod stage;

use std::sync::Arc;

use alloy::primitives::Address;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::connector::{Connected, ConnectionSession, Connector, ConnectorError, TokenTransfer};
use crate::evm::short_hex;
use crate::model::amount::to_base_units;
use crate::model::{ChainDescriptor, ChainId, TokenCurrency, TransactionIntent, TxHash};
use crate::notify::{Notification, Notifier, Severity};

pub use form::{DepositForm, FieldErrors};
pub use stage::{derive_stage, DepositStage, TxProgress};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("invalid input: {0}")]
    Fields(FieldErrors),

    #[error("deposit flow is closed")]
    Closed,

    #[error("not available in stage {0:?}")]
    WrongStage(DepositStage),

    #[error("a deposit is already being submitted")]
    InFlight,

    #[error("broadcast failed: {0}")]
    Broadcast(ConnectorError),
}

/// Where the deposit goes. Fixed for the lifetime of the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositTarget {
    pub to_address: Address,
    pub network: ChainDescriptor,
}

/// What the ConfirmTransaction stage shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    /// Truncated for display; copy `tx_hash` for the full value.
    pub display_hash: String,
    pub explorer_url: String,
}

#[derive(Debug, Default)]
struct FlowState {
    tx: TxProgress,
    closed: bool,
}

pub struct DepositFlow {
    target: DepositTarget,
    connector: Arc<Connector>,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<FlowState>>,
    stage: Arc<watch::Sender<DepositStage>>,
    refresher: JoinHandle<()>,
}

impl DepositFlow {
    /// Open a flow. Must be called inside a tokio runtime: a task re-derives
    /// the stage on every session change until the flow is closed or dropped.
    pub fn open(target: DepositTarget, connector: Arc<Connector>, notifier: Arc<dyn Notifier>) -> Self {
        let (stage, _) = watch::channel(DepositStage::Loading);
        let stage = Arc::new(stage);
        let state = Arc::new(Mutex::new(FlowState::default()));

        let refresher = tokio::spawn(refresh_on_session_change(
            connector.clone(),
            state.clone(),
            stage.clone(),
            target.network.chain_id,
        ));

        info!(to = %target.to_address, network = %target.network.id, "deposit flow opened");
        DepositFlow {
            target,
            connector,
            notifier,
            state,
            stage,
            refresher,
        }
    }

    pub fn target(&self) -> &DepositTarget {
        &self.target
    }

    pub fn required_chain_id(&self) -> ChainId {
        self.target.network.chain_id
    }

    /// Current stage, derived from the live session.
    pub fn stage(&self) -> DepositStage {
        let session = self.connector.snapshot();
        flow_stage(&session, self.required_chain_id(), &self.state.lock())
    }

    /// Stage as a change-notifying channel. Starts at `Loading` until the
    /// first evaluation has run.
    pub fn stages(&self) -> watch::Receiver<DepositStage> {
        self.stage.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // ── ConnectWallet ──

    pub async fn connect_wallet(&self) -> Result<Connected, FlowError> {
        self.expect_stage(DepositStage::ConnectWallet)?;
        let result = self.connector.connect(self.required_chain_id()).await;
        self.publish();
        result.map_err(|e| {
            self.notify(Severity::Destructive, "Failed to connect wallet", e.to_string());
            FlowError::Connector(e)
        })
    }

    // ── SwitchNetwork ──

    /// Ask the wallet to switch. The stage moves on when the wallet reports
    /// the new chain, not when this returns.
    pub async fn switch_network(&self) -> Result<(), FlowError> {
        self.expect_stage(DepositStage::SwitchNetwork)?;
        let chain_id = self.required_chain_id();
        let result = match self.connector.registry().by_chain_id(chain_id) {
            Some(chain) => self.connector.switch_network(chain).await,
            None => Err(ConnectorError::UnsupportedChain(chain_id)),
        };
        result.map_err(|e| {
            self.notify(Severity::Destructive, "Failed to switch network", e.to_string());
            FlowError::Connector(e)
        })
    }

    // ── Deposit ──

    /// Validate the form, resolve the token's decimals and broadcast the
    /// transfer. At most one submit per flow reaches the connector.
    pub async fn submit(&self, form: &DepositForm) -> Result<TxHash, FlowError> {
        self.expect_stage(DepositStage::Deposit)?;
        let valid = form::validate(form).map_err(FlowError::Fields)?;

        {
            let mut state = self.state.lock();
            if state.tx != TxProgress::Idle {
                return Err(FlowError::InFlight);
            }
            state.tx = TxProgress::Preparing;
        }

        let intent = match self.prepare(valid).await {
            Ok(intent) => intent,
            Err(e) => {
                self.state.lock().tx = TxProgress::Idle;
                self.publish();
                return Err(e);
            }
        };

        {
            let mut state = self.state.lock();
            if state.closed {
                state.tx = TxProgress::Idle;
                return Err(FlowError::Closed);
            }
            state.tx = TxProgress::Broadcasting;
        }
        self.publish();
        self.broadcast(intent).await
    }

    async fn prepare(&self, valid: form::ValidDeposit) -> Result<TransactionIntent, FlowError> {
        let decimals = match self.connector.get_token_decimals(valid.token).await {
            Ok(decimals) => decimals,
            Err(e) => {
                self.notify(Severity::Destructive, "Could not read token", e.to_string());
                return Err(FlowError::Fields(FieldErrors::token_address(format!(
                    "could not read token decimals: {e}"
                ))));
            }
        };

        let base_units = to_base_units(&valid.amount, decimals)
            .map_err(|e| FlowError::Fields(FieldErrors::amount(form::amount_message(&e))))?;

        // The flow may have been closed, or the wallet moved, while decimals
        // were being read.
        self.expect_stage(DepositStage::Deposit)?;

        Ok(TransactionIntent {
            to_address: self.target.to_address,
            network: self.target.network.clone(),
            token: TokenCurrency {
                address: valid.token,
                decimals,
            },
            amount: valid.amount,
            base_units,
        })
    }

    async fn broadcast(&self, intent: TransactionIntent) -> Result<TxHash, FlowError> {
        debug!(token = %intent.token.address, amount = %intent.amount, "broadcasting deposit");
        let transfer = TokenTransfer {
            to_address: intent.to_address,
            amount: intent.base_units,
            token: intent.token,
        };

        match self.connector.send_token(transfer).await {
            Ok(hash) => {
                self.set_tx(TxProgress::Broadcast(hash.clone()));
                self.notify(
                    Severity::Success,
                    "Transaction sent",
                    format!("{} {} on {}", intent.amount, short_hex(&intent.token.address.to_string()), intent.network.name),
                );
                Ok(hash)
            }
            Err(e) => {
                self.notify(Severity::Destructive, "Transaction failed", e.to_string());
                self.state.lock().tx = TxProgress::Idle;
                self.terminate();
                Err(FlowError::Broadcast(e))
            }
        }
    }

    // ── ConfirmTransaction ──

    pub fn confirmation(&self) -> Option<Confirmation> {
        match &self.state.lock().tx {
            TxProgress::Broadcast(hash) => Some(Confirmation {
                tx_hash: hash.clone(),
                display_hash: short_hex(hash.as_str()),
                explorer_url: self.target.network.tx_url(hash.as_str()),
            }),
            _ => None,
        }
    }

    /// End the flow. Any unsent intent is discarded. A transfer already
    /// handed to the wallet keeps running and its hash is still recorded.
    pub fn close(&self) {
        self.terminate();
        info!("deposit flow closed");
    }

    // ── Internals ──

    fn expect_stage(&self, expected: DepositStage) -> Result<(), FlowError> {
        if self.is_closed() {
            return Err(FlowError::Closed);
        }
        let stage = self.stage();
        if stage != expected {
            return Err(FlowError::WrongStage(stage));
        }
        Ok(())
    }

    fn set_tx(&self, tx: TxProgress) {
        self.state.lock().tx = tx;
        self.publish();
    }

    fn terminate(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            if state.tx == TxProgress::Preparing {
                state.tx = TxProgress::Idle;
            }
        }
        self.refresher.abort();
        self.publish();
    }

    fn publish(&self) {
        publish_stage(&self.connector, &self.state, &self.stage, self.required_chain_id());
    }

    fn notify(&self, severity: Severity, title: &str, description: String) {
        self.notifier
            .notify(Notification::new(severity, title, description));
    }
}

impl Drop for DepositFlow {
    fn drop(&mut self) {
        self.refresher.abort();
    }
}

fn publish_stage(
    connector: &Connector,
    state: &Mutex<FlowState>,
    stage: &watch::Sender<DepositStage>,
    required_chain_id: ChainId,
) {
    let session = connector.snapshot();
    let next = flow_stage(&session, required_chain_id, &state.lock());
    stage.send_if_modified(|current| {
        let changed = *current != next;
        if changed {
            debug!(from = ?*current, to = ?next, "deposit stage");
        }
        *current = next;
        changed
    });
}

/// A closed flow only reports stages for a transfer that is still in flight
/// or already broadcast.
fn flow_stage(session: &ConnectionSession, required_chain_id: ChainId, state: &FlowState) -> DepositStage {
    match (&state.tx, state.closed) {
        (TxProgress::Idle | TxProgress::Preparing, true) => DepositStage::Closed,
        (tx, _) => derive_stage(session, required_chain_id, tx),
    }
}

async fn refresh_on_session_change(
    connector: Arc<Connector>,
    state: Arc<Mutex<FlowState>>,
    stage: Arc<watch::Sender<DepositStage>>,
    required_chain_id: ChainId,
) {
    let mut session = connector.session();
    loop {
        session.borrow_and_update();
        publish_stage(&connector, &state, &stage, required_chain_id);
        if session.changed().await.is_err() {
            break;
        }
    }
}
