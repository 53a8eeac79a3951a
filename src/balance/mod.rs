//! Balance fetcher with last-write-wins cancellation.
//!
//! Each fetcher is one logical slot (one balance shown somewhere). Starting a
//! query bumps the slot's generation and aborts the previous task; a task only
//! commits its result if its generation is still current, checked under the
//! same lock that issues new generations. A superseded query can therefore
//! never overwrite a newer one, however late it resolves.

pub mod source;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::amount::normalize;
use crate::model::ChainDescriptor;

pub use source::{BalanceError, BalanceSource, RpcBalanceSource, TokenInfo};

/// What to read the balance of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Native,
    Token(Address),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceQuery {
    pub network: ChainDescriptor,
    pub asset: Asset,
    pub wallet_address: Address,
}

/// What a consumer renders. All fields are `None` when there is nothing to
/// show, either because the query was short-circuited or because it failed;
/// `error` tells the two apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceState {
    /// Display string, `raw / 10^decimals`.
    pub balance: Option<String>,
    /// Untouched on-chain integer.
    pub raw: Option<U256>,
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl BalanceState {
    fn loaded(info: TokenInfo) -> Self {
        BalanceState {
            balance: Some(normalize(info.raw, info.decimals)),
            raw: Some(info.raw),
            decimals: Some(info.decimals),
            symbol: Some(info.symbol),
            name: Some(info.name),
            loading: false,
            error: None,
        }
    }

    fn failed(error: &BalanceError) -> Self {
        BalanceState {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct Slot {
    generation: u64,
    query: Option<BalanceQuery>,
    task: Option<JoinHandle<()>>,
}

pub struct BalanceFetcher {
    source: Arc<dyn BalanceSource>,
    state: Arc<watch::Sender<BalanceState>>,
    slot: Arc<Mutex<Slot>>,
}

impl BalanceFetcher {
    pub fn new(source: Arc<dyn BalanceSource>) -> Self {
        let (state, _) = watch::channel(BalanceState::default());
        BalanceFetcher {
            source,
            state: Arc::new(state),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Balance of `token_address`, or of the native currency when no token is
    /// given. Missing network or wallet yields an empty result with no network
    /// call.
    pub fn fetch(
        &self,
        network: Option<&ChainDescriptor>,
        token_address: Option<Address>,
        wallet_address: Option<Address>,
    ) {
        match token_address {
            Some(token) => self.fetch_token(network, Some(token), wallet_address),
            None => self.fetch_native(network, wallet_address),
        }
    }

    /// ERC-20 balance. Any missing parameter yields an empty result with no
    /// network call.
    pub fn fetch_token(
        &self,
        network: Option<&ChainDescriptor>,
        token_address: Option<Address>,
        wallet_address: Option<Address>,
    ) {
        let query = match (network, token_address, wallet_address) {
            (Some(network), Some(token), Some(wallet)) => Some(BalanceQuery {
                network: network.clone(),
                asset: Asset::Token(token),
                wallet_address: wallet,
            }),
            _ => None,
        };
        self.start(query);
    }

    /// Native currency balance.
    pub fn fetch_native(&self, network: Option<&ChainDescriptor>, wallet_address: Option<Address>) {
        let query = match (network, wallet_address) {
            (Some(network), Some(wallet)) => Some(BalanceQuery {
                network: network.clone(),
                asset: Asset::Native,
                wallet_address: wallet,
            }),
            _ => None,
        };
        self.start(query);
    }

    /// Run the last query again, e.g. after a failure.
    pub fn refetch(&self) {
        let query = self.slot.lock().query.clone();
        self.start(query);
    }

    pub fn snapshot(&self) -> BalanceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BalanceState> {
        self.state.subscribe()
    }

    /// Abort whatever is in flight without starting anything new.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        self.state.send_modify(|s| s.loading = false);
    }

    fn start(&self, query: Option<BalanceQuery>) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(previous) = slot.task.take() {
            previous.abort();
        }
        slot.query = query.clone();

        let Some(query) = query else {
            self.state.send_replace(BalanceState::default());
            return;
        };

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let source = self.source.clone();
        let state = self.state.clone();
        let slot_ref = self.slot.clone();
        slot.task = Some(tokio::spawn(async move {
            let next = match run_query(source.as_ref(), &query).await {
                Ok(info) => BalanceState::loaded(info),
                Err(e) => {
                    warn!(network = %query.network.id, error = %e, "balance query failed");
                    BalanceState::failed(&e)
                }
            };

            let mut slot = slot_ref.lock();
            if slot.generation != generation {
                debug!(generation, "dropping superseded balance result");
                return;
            }
            slot.task = None;
            state.send_replace(next);
        }));
    }
}

impl Drop for BalanceFetcher {
    fn drop(&mut self) {
        if let Some(task) = self.slot.lock().task.take() {
            task.abort();
        }
    }
}

async fn run_query(source: &dyn BalanceSource, query: &BalanceQuery) -> Result<TokenInfo, BalanceError> {
    match query.asset {
        Asset::Token(token) => {
            source
                .token_balance(&query.network, token, query.wallet_address)
                .await
        }
        Asset::Native => {
            let raw = source
                .native_balance(&query.network, query.wallet_address)
                .await?;
            Ok(TokenInfo {
                raw,
                decimals: query.network.native_decimals,
                symbol: query.network.native_symbol.clone(),
                name: query.network.name.clone(),
            })
        }
    }
}
