//! Wallet connector: one session with one provider, and the operations the
//! deposit flow needs on top of it.

pub mod error;
pub mod local;
pub mod provider;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::hex;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::evm::IERC20;
use crate::model::{ChainDescriptor, ChainId, ChainRegistry, TokenCurrency, TxHash};

pub use error::ConnectorError;
pub use provider::{codes, Eip1193Provider, ProviderError, ProviderEvent, ProviderId};

// ── Session ──────────────────────────────────────────────────────────

/// Live relationship with the wallet, as last reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSession {
    pub is_connected: bool,
    pub account: Option<Address>,
    pub current_chain_id: Option<ChainId>,
}

/// Kinds of wallet the application can hold a session with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletKind {
    /// Browser-extension style EVM wallet speaking EIP-1193.
    Injected,
}

impl WalletKind {
    pub fn name(self) -> &'static str {
        match self {
            WalletKind::Injected => "MetaMask",
        }
    }
}

/// Result of a successful [`Connector::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connected {
    pub wallet_kind: &'static str,
    pub address: Address,
    pub chain_id: ChainId,
}

/// ERC-20 transfer request. `amount` is already in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub to_address: Address,
    pub amount: U256,
    pub token: TokenCurrency,
}

// ── Connector ────────────────────────────────────────────────────────

/// Owns the [`ConnectionSession`] for one wallet kind. Everything else reads
/// the session through [`Connector::session`] and acts through the methods
/// below; the session has no other writer.
pub struct Connector {
    kind: WalletKind,
    registry: Arc<ChainRegistry>,
    provider: RwLock<Option<Arc<dyn Eip1193Provider>>>,
    session: watch::Sender<ConnectionSession>,
    /// Bumped on every session reset. A connect only commits if it is
    /// unchanged since the connect started.
    epoch: AtomicU64,
}

impl Connector {
    pub fn new(kind: WalletKind, registry: Arc<ChainRegistry>) -> Self {
        let (session, _) = watch::channel(ConnectionSession::default());
        Connector {
            kind,
            registry,
            provider: RwLock::new(None),
            session,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> WalletKind {
        self.kind
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    /// A provider became available. Starts a fresh, disconnected session.
    pub fn attach(&self, provider: Arc<dyn Eip1193Provider>) {
        info!(wallet = self.kind.name(), provider_id = provider.id(), "wallet provider attached");
        *self.provider.write() = Some(provider);
        self.reset_session();
    }

    /// The provider went away. The session is reset.
    pub fn detach(&self) {
        if self.provider.write().take().is_some() {
            info!(wallet = self.kind.name(), "wallet provider detached");
        }
        self.reset_session();
    }

    pub fn provider(&self) -> Option<Arc<dyn Eip1193Provider>> {
        self.provider.read().clone()
    }

    fn is_current(&self, id: ProviderId) -> bool {
        self.provider.read().as_ref().is_some_and(|p| p.id() == id)
    }

    fn require_provider(&self) -> Result<Arc<dyn Eip1193Provider>, ConnectorError> {
        self.provider().ok_or(ConnectorError::ProviderUnavailable)
    }

    // ── Read-only state ──

    /// Change-notifying view of the session.
    pub fn session(&self) -> watch::Receiver<ConnectionSession> {
        self.session.subscribe()
    }

    pub fn snapshot(&self) -> ConnectionSession {
        self.session.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session.borrow().is_connected
    }

    pub fn account(&self) -> Option<Address> {
        self.session.borrow().account
    }

    pub fn current_chain_id(&self) -> Option<ChainId> {
        self.session.borrow().current_chain_id
    }

    fn reset_session(&self) {
        self.session.send_if_modified(|s| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            let changed = *s != ConnectionSession::default();
            *s = ConnectionSession::default();
            changed
        });
    }

    // ── Operations ──

    /// Request account access and make sure the wallet sits on
    /// `required_chain_id`, switching if needed. The session is written only
    /// once every step has succeeded.
    pub async fn connect(&self, required_chain_id: ChainId) -> Result<Connected, ConnectorError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let provider = self.require_provider()?;

        let accounts = provider.request_accounts().await?;
        let first = accounts.first().ok_or(ConnectorError::NoAccounts)?;
        let address: Address = first
            .parse()
            .map_err(|_| ConnectorError::InvalidResponse(format!("bad account '{first}'")))?;

        let required = self
            .registry
            .by_chain_id(required_chain_id)
            .ok_or(ConnectorError::UnsupportedChain(required_chain_id))?;

        let live = parse_chain_id(&provider.chain_id().await?)?;
        if live != required_chain_id {
            debug!(from = %live, to = %required_chain_id, "wallet on wrong chain, requesting switch");
            self.switch_with(&provider, required).await?;
        }

        // The switch may already have landed; take whatever the wallet says now.
        let chain_id = parse_chain_id(&provider.chain_id().await?)?;

        // Serialized with `reset_session` by the session channel's lock.
        let committed = self.session.send_if_modified(|s| {
            if self.epoch.load(Ordering::SeqCst) != epoch || !self.is_current(provider.id()) {
                return false;
            }
            *s = ConnectionSession {
                is_connected: true,
                account: Some(address),
                current_chain_id: Some(chain_id),
            };
            true
        });
        if !committed {
            debug!(wallet = self.kind.name(), %address, "session reset during connect, dropping result");
            return Err(ConnectorError::SessionReset);
        }
        info!(wallet = self.kind.name(), %address, %chain_id, "wallet connected");

        Ok(Connected {
            wallet_kind: self.kind.name(),
            address,
            chain_id,
        })
    }

    /// Drop the session. Programmatic revocation is best-effort and not awaited.
    pub fn disconnect(&self) {
        self.reset_session();
        let Some(provider) = self.provider() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let params = json!([{ "eth_accounts": {} }]);
            if let Err(e) = provider.request("wallet_revokePermissions", params).await {
                debug!(error = %e, "wallet_revokePermissions not honoured");
            }
        });
    }

    /// Ask the wallet to switch chains. The new chain is observed through
    /// `chainChanged`, not through this call.
    pub async fn switch_network(&self, chain: &ChainDescriptor) -> Result<(), ConnectorError> {
        let provider = self.require_provider()?;
        self.switch_with(&provider, chain).await
    }

    async fn switch_with(
        &self,
        provider: &Arc<dyn Eip1193Provider>,
        chain: &ChainDescriptor,
    ) -> Result<(), ConnectorError> {
        let params = json!([{ "chainId": chain.chain_id.to_hex() }]);
        match provider.request("wallet_switchEthereumChain", params.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.code == codes::UNRECOGNIZED_CHAIN => {
                info!(chain = %chain.id, "wallet does not know chain, adding it");
                provider
                    .request("wallet_addEthereumChain", add_chain_params(chain))
                    .await
                    .map_err(|e| ConnectorError::from_provider(e, Some(chain.chain_id)))?;
                provider
                    .request("wallet_switchEthereumChain", params)
                    .await
                    .map(|_| ())
                    .map_err(|e| ConnectorError::from_provider(e, Some(chain.chain_id)))
            }
            Err(e) => Err(ConnectorError::from_provider(e, Some(chain.chain_id))),
        }
    }

    /// `personal_sign` with the connected account.
    pub async fn sign_message(&self, message: &str) -> Result<String, ConnectorError> {
        let provider = self.require_provider()?;
        let account = self.account().ok_or(ConnectorError::NoAccounts)?;
        let params = json!([hex::encode_prefixed(message.as_bytes()), account.to_checksum(None)]);
        let value = provider.request("personal_sign", params).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConnectorError::InvalidResponse(format!("personal_sign returned {value}")))
    }

    /// Broadcast an ERC-20 `transfer`. Returns as soon as the node accepts the
    /// transaction; confirmation is not awaited.
    pub async fn send_token(&self, transfer: TokenTransfer) -> Result<TxHash, ConnectorError> {
        let provider = self.require_provider()?;
        let from = self.account().ok_or(ConnectorError::NoAccounts)?;

        let data = IERC20::transferCall {
            to: transfer.to_address,
            amount: transfer.amount,
        }
        .abi_encode();
        let params = json!([{
            "from": from.to_checksum(None),
            "to": transfer.token.address.to_checksum(None),
            "data": hex::encode_prefixed(data),
        }]);

        let value = provider.request("eth_sendTransaction", params).await?;
        let hash = value
            .as_str()
            .and_then(TxHash::parse)
            .ok_or_else(|| ConnectorError::InvalidResponse(format!("eth_sendTransaction returned {value}")))?;
        info!(
            token = %transfer.token.address,
            to = %transfer.to_address,
            amount = %transfer.amount,
            tx = %hash,
            "token transfer broadcast"
        );
        Ok(hash)
    }

    /// Read `decimals()` from a token contract through the wallet.
    pub async fn get_token_decimals(&self, token: Address) -> Result<u8, ConnectorError> {
        let provider = self.require_provider()?;
        let data = IERC20::decimalsCall {}.abi_encode();
        let params = json!([{ "to": token.to_checksum(None), "data": hex::encode_prefixed(data) }, "latest"]);

        let value = provider.request("eth_call", params).await?;
        let raw = value
            .as_str()
            .and_then(|s| hex::decode(s).ok())
            .ok_or_else(|| ConnectorError::InvalidResponse(format!("eth_call returned {value}")))?;
        IERC20::decimalsCall::abi_decode_returns(&raw)
            .map_err(|e| ConnectorError::InvalidResponse(format!("decimals(): {e}")))
    }

    // ── Provider events ──

    /// Fold one provider event into the session. Called by the network
    /// watcher's subscription, in provider emit order.
    pub(crate) fn apply_event(&self, event: &ProviderEvent) {
        match event {
            ProviderEvent::ChainChanged(raw) => match parse_chain_id(raw) {
                Ok(chain_id) => {
                    self.session.send_if_modified(|s| {
                        let changed = s.current_chain_id != Some(chain_id);
                        s.current_chain_id = Some(chain_id);
                        changed
                    });
                }
                Err(e) => warn!(raw = %raw, error = %e, "ignoring chainChanged"),
            },
            ProviderEvent::AccountsChanged(accounts) => {
                let account = match accounts.first().map(|a| a.parse::<Address>()) {
                    Some(Ok(account)) => Some(account),
                    Some(Err(_)) => {
                        warn!(accounts = ?accounts, "ignoring accountsChanged");
                        return;
                    }
                    None => None,
                };
                self.session.send_if_modified(|s| {
                    if !s.is_connected {
                        return false;
                    }
                    let before = s.clone();
                    match account {
                        Some(account) => s.account = Some(account),
                        None => *s = ConnectionSession::default(),
                    }
                    *s != before
                });
            }
            ProviderEvent::Disconnect => self.reset_session(),
        }
    }
}

fn parse_chain_id(raw: &str) -> Result<ChainId, ConnectorError> {
    raw.parse()
        .map_err(|_| ConnectorError::InvalidResponse(format!("bad chain id '{raw}'")))
}

fn add_chain_params(chain: &ChainDescriptor) -> Value {
    json!([{
        "chainId": chain.chain_id.to_hex(),
        "chainName": chain.name,
        "rpcUrls": [chain.rpc_url],
        "blockExplorerUrls": [chain.explorer_url],
        "nativeCurrency": {
            "name": chain.native_symbol,
            "symbol": chain.native_symbol,
            "decimals": chain.native_decimals,
        },
    }])
}

// ── Wallets ──────────────────────────────────────────────────────────

/// One connector per wallet kind.
#[derive(Default)]
pub struct Wallets {
    connectors: HashMap<WalletKind, Arc<Connector>>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector for `kind`, created on first use.
    pub fn connector(&mut self, kind: WalletKind, registry: &Arc<ChainRegistry>) -> Arc<Connector> {
        self.connectors
            .entry(kind)
            .or_insert_with(|| Arc::new(Connector::new(kind, registry.clone())))
            .clone()
    }

    pub fn get(&self, kind: WalletKind) -> Option<&Arc<Connector>> {
        self.connectors.get(&kind)
    }
}
