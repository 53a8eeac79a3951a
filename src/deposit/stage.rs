use crate::connector::ConnectionSession;
use crate::model::{ChainId, TxHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositStage {
    Loading,
    ConnectWallet,
    SwitchNetwork,
    Deposit,
    WaitingTransaction,
    ConfirmTransaction,
    /// The flow was closed with nothing left in flight.
    Closed,
}

/// Where the flow's single transaction is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TxProgress {
    #[default]
    Idle,
    /// Submit accepted, token decimals being resolved. Still shown as Deposit.
    Preparing,
    /// `send_token` issued and not yet resolved.
    Broadcasting,
    Broadcast(TxHash),
}

/// The stage of a deposit flow. Pure: depends only on its arguments.
///
/// A recorded hash wins over everything, so a network or account change after
/// broadcast cannot rewind the flow.
pub fn derive_stage(session: &ConnectionSession, required_chain_id: ChainId, tx: &TxProgress) -> DepositStage {
    match tx {
        TxProgress::Broadcast(_) => return DepositStage::ConfirmTransaction,
        TxProgress::Broadcasting => return DepositStage::WaitingTransaction,
        TxProgress::Idle | TxProgress::Preparing => {}
    }
    if !session.is_connected || session.account.is_none() {
        return DepositStage::ConnectWallet;
    }
    if session.current_chain_id != Some(required_chain_id) {
        return DepositStage::SwitchNetwork;
    }
    DepositStage::Deposit
}
