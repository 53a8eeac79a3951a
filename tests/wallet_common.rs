#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch, Notify};

use deposit_flow::balance::{BalanceError, BalanceSource, TokenInfo};
use deposit_flow::connector::provider::next_provider_id;
use deposit_flow::connector::{codes, Eip1193Provider, ProviderError, ProviderEvent, ProviderId};
use deposit_flow::model::{ChainDescriptor, ChainRegistry};
use deposit_flow::notify::{Notification, Notifier};

pub const WALLET: &str = "0x00000000000000000000000000000000000000aa";
pub const OTHER_WALLET: &str = "0x00000000000000000000000000000000000000bb";
pub const TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";

pub fn registry() -> Arc<ChainRegistry> {
    Arc::new(ChainRegistry::builtin())
}

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

/// Wait until `pred` holds for the channel's value, failing the test after a second.
pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T
where
    T: Clone,
{
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(pred))
        .await
        .expect("timed out waiting for watch value")
        .expect("watch sender dropped")
        .clone()
}

/// Let spawned tasks run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ── Mock EIP-1193 provider ───────────────────────────────────────────

struct MockState {
    accounts: Vec<String>,
    chain_id: String,
    /// Chains the wallet knows; switching to anything else fails with 4902.
    known_chains: HashSet<String>,
    /// Whether a successful switch changes the chain (and emits chainChanged).
    apply_switch: bool,
    account_error: Option<ProviderError>,
    switch_error: Option<ProviderError>,
    decimals: Result<u8, ProviderError>,
    send_result: Result<String, ProviderError>,
}

/// Scripted wallet. Records every request and can hold any method until
/// released.
pub struct MockProvider {
    id: ProviderId,
    events: broadcast::Sender<ProviderEvent>,
    state: Mutex<MockState>,
    calls: Mutex<Vec<(String, Value)>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockProvider {
    pub fn new(chain_id: &str) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        let known_chains = ChainRegistry::builtin()
            .iter()
            .map(|c| c.chain_id.to_hex())
            .collect();
        Arc::new(MockProvider {
            id: next_provider_id(),
            events,
            state: Mutex::new(MockState {
                accounts: vec![WALLET.to_string()],
                chain_id: chain_id.to_string(),
                known_chains,
                apply_switch: true,
                account_error: None,
                switch_error: None,
                decimals: Ok(18),
                send_result: Ok("0xdeadbeef".to_string()),
            }),
            calls: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
        })
    }

    // ── Scripting ──

    pub fn set_accounts(&self, accounts: &[&str]) {
        self.state.lock().accounts = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn set_chain(&self, chain_id: &str) {
        self.state.lock().chain_id = chain_id.to_string();
    }

    pub fn forget_chain(&self, chain_id: &str) {
        self.state.lock().known_chains.remove(chain_id);
    }

    pub fn set_apply_switch(&self, apply: bool) {
        self.state.lock().apply_switch = apply;
    }

    pub fn fail_accounts(&self, err: ProviderError) {
        self.state.lock().account_error = Some(err);
    }

    pub fn fail_switch(&self, err: ProviderError) {
        self.state.lock().switch_error = Some(err);
    }

    pub fn set_decimals(&self, decimals: Result<u8, ProviderError>) {
        self.state.lock().decimals = decimals;
    }

    pub fn set_send_result(&self, result: Result<&str, ProviderError>) {
        self.state.lock().send_result = result.map(str::to_string);
    }

    /// Hold every `method` request until [`MockProvider::release`].
    pub fn hold(&self, method: &str) {
        self.gates
            .lock()
            .insert(method.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, method: &str) {
        if let Some(gate) = self.gates.lock().remove(method) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    /// Push an event to every listener, like the wallet would.
    pub fn emit(&self, event: ProviderEvent) {
        if let ProviderEvent::ChainChanged(chain) = &event {
            self.set_chain(chain);
        }
        let _ = self.events.send(event);
    }

    // ── Inspection ──

    pub fn receiver_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Wait until `method` has been requested at least `n` times.
    pub async fn wait_for_calls(&self, method: &str, n: usize) {
        for _ in 0..1000 {
            if self.count(method) >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("{method} was not called {n} times");
    }

    fn switch(&self, params: &Value) -> Result<Value, ProviderError> {
        let chain = params[0]["chainId"].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock();
        if let Some(err) = state.switch_error.clone() {
            return Err(err);
        }
        if !state.known_chains.contains(&chain) {
            return Err(ProviderError::new(codes::UNRECOGNIZED_CHAIN, format!("unrecognized chain {chain}")));
        }
        if state.apply_switch && state.chain_id != chain {
            state.chain_id = chain.clone();
            drop(state);
            let _ = self.events.send(ProviderEvent::ChainChanged(chain));
        }
        Ok(Value::Null)
    }
}

#[async_trait]
impl Eip1193Provider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls.lock().push((method.to_string(), params.clone()));

        let gate = self.gates.lock().get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                let state = self.state.lock();
                match &state.account_error {
                    Some(err) => Err(err.clone()),
                    None => Ok(json!(state.accounts)),
                }
            }
            "eth_chainId" => Ok(json!(self.state.lock().chain_id)),
            "wallet_switchEthereumChain" => self.switch(&params),
            "wallet_addEthereumChain" => {
                let chain = params[0]["chainId"].as_str().unwrap_or_default().to_string();
                self.state.lock().known_chains.insert(chain);
                Ok(Value::Null)
            }
            "wallet_revokePermissions" => Ok(Value::Null),
            "personal_sign" => Ok(json!("0x5167")),
            "eth_call" => self
                .state
                .lock()
                .decimals
                .clone()
                .map(|d| json!(format!("0x{:064x}", d))),
            "eth_sendTransaction" => self.state.lock().send_result.clone().map(|h| json!(h)),
            other => Err(ProviderError::new(codes::UNSUPPORTED_METHOD, format!("{other} not supported"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

// ── Recording notifier ───────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

// ── Mock balance source ──────────────────────────────────────────────

/// Balance source with scripted answers. Token lookups can be held per token
/// to control the order in which in-flight queries resolve.
#[derive(Default)]
pub struct MockBalanceSource {
    tokens: Mutex<HashMap<Address, Result<TokenInfo, BalanceError>>>,
    gates: Mutex<HashMap<Address, Arc<Notify>>>,
    native: Mutex<U256>,
    token_calls: Mutex<Vec<Address>>,
    native_calls: Mutex<usize>,
}

impl MockBalanceSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_token(&self, token: Address, result: Result<TokenInfo, BalanceError>) {
        self.tokens.lock().insert(token, result);
    }

    pub fn set_native(&self, raw: U256) {
        *self.native.lock() = raw;
    }

    pub fn hold(&self, token: Address) {
        self.gates.lock().insert(token, Arc::new(Notify::new()));
    }

    pub fn release(&self, token: Address) {
        if let Some(gate) = self.gates.lock().remove(&token) {
            gate.notify_one();
        }
    }

    pub fn token_calls(&self) -> Vec<Address> {
        self.token_calls.lock().clone()
    }

    pub fn native_calls(&self) -> usize {
        *self.native_calls.lock()
    }
}

pub fn token_info(raw: u64, decimals: u8, symbol: &str) -> TokenInfo {
    TokenInfo {
        raw: U256::from(raw),
        decimals,
        symbol: symbol.to_string(),
        name: format!("{symbol} Token"),
    }
}

#[async_trait]
impl BalanceSource for MockBalanceSource {
    async fn token_balance(
        &self,
        _chain: &ChainDescriptor,
        token: Address,
        _wallet: Address,
    ) -> Result<TokenInfo, BalanceError> {
        self.token_calls.lock().push(token);
        let gate = self.gates.lock().get(&token).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.tokens
            .lock()
            .get(&token)
            .cloned()
            .unwrap_or_else(|| {
                Err(BalanceError::Rpc {
                    call: "balanceOf()",
                    reason: "no such token".into(),
                })
            })
    }

    async fn native_balance(&self, _chain: &ChainDescriptor, _wallet: Address) -> Result<U256, BalanceError> {
        *self.native_calls.lock() += 1;
        Ok(*self.native.lock())
    }
}
