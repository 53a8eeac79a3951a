//! EIP-1193 provider backed by an operator-supplied key and a JSON-RPC node.
//!
//! Stands in for a browser extension when the flow is driven from the CLI:
//! account access is granted without a prompt, chain switches are limited to
//! chains in the registry, and anything it does not handle itself is forwarded
//! to the node of the current chain.

use std::sync::Arc;

use alloy::hex;
use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

use super::provider::{codes, next_provider_id, Eip1193Provider, ProviderError, ProviderEvent, ProviderId};
use crate::model::{ChainDescriptor, ChainId, ChainRegistry};

const EVENT_CAPACITY: usize = 64;

pub struct LocalSignerProvider {
    id: ProviderId,
    signer: PrivateKeySigner,
    registry: Arc<ChainRegistry>,
    current: Mutex<ChainDescriptor>,
    events: broadcast::Sender<ProviderEvent>,
}

impl LocalSignerProvider {
    pub fn new(signer: PrivateKeySigner, registry: Arc<ChainRegistry>, initial: ChainDescriptor) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        LocalSignerProvider {
            id: next_provider_id(),
            signer,
            registry,
            current: Mutex::new(initial),
            events,
        }
    }

    pub fn current_chain(&self) -> ChainDescriptor {
        self.current.lock().clone()
    }

    fn rpc_url(&self) -> Result<alloy::transports::http::reqwest::Url, ProviderError> {
        let chain = self.current_chain();
        chain
            .rpc_url
            .parse()
            .map_err(|e| ProviderError::internal(format!("invalid RPC URL for {}: {e}", chain.id)))
    }

    fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let raw = params
            .get(0)
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::new(-32602, "missing chainId"))?;
        let chain_id: ChainId = raw
            .parse()
            .map_err(|_| ProviderError::new(-32602, format!("invalid chainId '{raw}'")))?;
        let target = self
            .registry
            .by_chain_id(chain_id)
            .cloned()
            .ok_or_else(|| ProviderError::new(codes::UNRECOGNIZED_CHAIN, format!("Unrecognized chain ID {raw}")))?;

        let changed = {
            let mut current = self.current.lock();
            let changed = current.chain_id != target.chain_id;
            *current = target;
            changed
        };
        if changed {
            // No listeners is fine.
            let _ = self.events.send(ProviderEvent::ChainChanged(chain_id.to_hex()));
        }
        Ok(Value::Null)
    }

    async fn personal_sign(&self, params: &Value) -> Result<Value, ProviderError> {
        let message = params
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::new(-32602, "missing message"))?;
        let bytes = hex::decode(message).unwrap_or_else(|_| message.as_bytes().to_vec());
        let signature = self
            .signer
            .sign_message(&bytes)
            .await
            .map_err(|e| ProviderError::internal(format!("signing failed: {e}")))?;
        Ok(json!(hex::encode_prefixed(signature.as_bytes())))
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        let tx_json = params
            .get(0)
            .cloned()
            .ok_or_else(|| ProviderError::new(-32602, "missing transaction"))?;
        let tx: TransactionRequest = serde_json::from_value(tx_json)
            .map_err(|e| ProviderError::new(-32602, format!("invalid transaction: {e}")))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .connect_http(self.rpc_url()?);
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ProviderError::internal(e.to_string()))?;
        Ok(json!(pending.tx_hash().to_string()))
    }

    async fn forward(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        debug!(method, "forwarding to node");
        let provider = ProviderBuilder::new().connect_http(self.rpc_url()?);
        provider
            .raw_request::<_, Value>(method.to_string().into(), params)
            .await
            .map_err(|e| ProviderError::internal(e.to_string()))
    }
}

#[async_trait]
impl Eip1193Provider for LocalSignerProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                Ok(json!([self.signer.address().to_checksum(None)]))
            }
            "eth_chainId" => Ok(json!(self.current_chain().chain_id.to_hex())),
            "wallet_switchEthereumChain" => self.switch_chain(&params),
            "wallet_addEthereumChain" => Err(ProviderError::new(
                codes::UNSUPPORTED_METHOD,
                "local signer only serves registry chains",
            )),
            "wallet_revokePermissions" => Ok(Value::Null),
            "personal_sign" => self.personal_sign(&params).await,
            "eth_sendTransaction" => self.send_transaction(&params).await,
            _ => self.forward(method, params).await,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NetworkKey;

    fn provider() -> LocalSignerProvider {
        let registry = Arc::new(ChainRegistry::builtin());
        let initial = registry.by_key(NetworkKey::Ethereum).unwrap().clone();
        LocalSignerProvider::new(PrivateKeySigner::random(), registry, initial)
    }

    #[tokio::test]
    async fn switch_emits_chain_changed() {
        let provider = provider();
        let mut events = provider.subscribe();

        provider
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0x38" }]))
            .await
            .unwrap();

        assert_eq!(events.recv().await.unwrap(), ProviderEvent::ChainChanged("0x38".into()));
        assert_eq!(provider.chain_id().await.unwrap(), "0x38");
    }

    #[tokio::test]
    async fn unknown_chain_reports_4902() {
        let provider = provider();
        let err = provider
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0x7a69" }]))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::UNRECOGNIZED_CHAIN);
    }

    #[tokio::test]
    async fn exposes_signer_account() {
        let provider = provider();
        let accounts = provider.request_accounts().await.unwrap();
        assert_eq!(accounts, vec![provider.signer.address().to_checksum(None)]);
    }
}
