//! Network watcher: forwards provider events into the connector session and
//! tracks whether the wallet sits on any chain the registry knows.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::connector::{Connector, ConnectionSession, ProviderEvent, ProviderId};
use crate::model::ChainRegistry;

/// An installed provider listener. Dropping it removes the listener.
pub struct Subscription {
    provider_id: ProviderId,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct NetworkWatcher {
    registry: Arc<ChainRegistry>,
    supported: Arc<watch::Sender<bool>>,
    subscription: Mutex<Option<Subscription>>,
}

impl NetworkWatcher {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        let (supported, _) = watch::channel(false);
        NetworkWatcher {
            registry,
            supported: Arc::new(supported),
            subscription: Mutex::new(None),
        }
    }

    /// Listen to the connector's current provider. Installs at most one
    /// listener per provider instance: calling this again for the same
    /// provider does nothing, a different provider replaces the old listener.
    /// Returns whether a new listener was installed.
    pub fn attach(&self, connector: &Arc<Connector>) -> bool {
        let mut slot = self.subscription.lock();
        let Some(provider) = connector.provider() else {
            *slot = None;
            self.publish(&connector.snapshot());
            return false;
        };
        if slot.as_ref().is_some_and(|s| s.provider_id == provider.id()) {
            return false;
        }

        // Replace first so the old listener is gone before the new one exists.
        *slot = None;
        let events = provider.subscribe();
        let session = connector.session();
        self.publish(&session.borrow());

        let task = tokio::spawn(forward_events(
            Arc::downgrade(connector),
            events,
            session,
            self.registry.clone(),
            self.supported.clone(),
        ));
        debug!(provider_id = provider.id(), "network watcher attached");
        *slot = Some(Subscription {
            provider_id: provider.id(),
            task,
        });
        true
    }

    /// Remove the listener, if any.
    pub fn detach(&self) {
        if let Some(sub) = self.subscription.lock().take() {
            debug!(provider_id = sub.provider_id, "network watcher detached");
            sub.unsubscribe();
        }
    }

    pub fn attached_to(&self) -> Option<ProviderId> {
        self.subscription.lock().as_ref().map(Subscription::provider_id)
    }

    /// Whether the wallet's live chain is any chain in the registry.
    pub fn is_supported(&self) -> bool {
        *self.supported.borrow()
    }

    pub fn supported(&self) -> watch::Receiver<bool> {
        self.supported.subscribe()
    }

    fn publish(&self, session: &ConnectionSession) {
        publish_supported(&self.registry, &self.supported, session);
    }
}

fn publish_supported(registry: &ChainRegistry, tx: &watch::Sender<bool>, session: &ConnectionSession) {
    let supported = session
        .current_chain_id
        .is_some_and(|chain_id| registry.contains(chain_id));
    tx.send_if_modified(|current| {
        let changed = *current != supported;
        *current = supported;
        changed
    });
}

async fn forward_events(
    connector: Weak<Connector>,
    mut events: broadcast::Receiver<ProviderEvent>,
    mut session: watch::Receiver<ConnectionSession>,
    registry: Arc<ChainRegistry>,
    supported: Arc<watch::Sender<bool>>,
) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(connector) = connector.upgrade() else { break };
                match event {
                    Ok(event) => {
                        debug!(?event, "provider event");
                        connector.apply_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "provider events dropped, resyncing chain id");
                        if let Some(provider) = connector.provider() {
                            match provider.chain_id().await {
                                Ok(chain_id) => connector.apply_event(&ProviderEvent::ChainChanged(chain_id)),
                                Err(e) => warn!(error = %e, "chain id resync failed"),
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                publish_supported(&registry, &supported, &session.borrow_and_update());
            }
        }
    }
    debug!("provider event stream ended");
}
