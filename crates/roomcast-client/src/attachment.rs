//! Shared attachment plumbing

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use roomcast_core::NegotiationState;
use roomcast_signaling::{PluginChannel, SubscriptionId};

use crate::error::{ClientError, Result};

/// Bound on awaiting a single negotiation transition.
pub(crate) const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn opaque_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Event-subscription ids held by one attachment, released as a single
/// batch on teardown. Releasing closes the subscription channels,
/// which is what terminates the attachment's event task.
#[derive(Debug)]
pub(crate) struct SubscriptionBag {
    ids: Mutex<Vec<SubscriptionId>>,
}

impl SubscriptionBag {
    pub fn new() -> Self {
        Self {
            ids: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, id: SubscriptionId) {
        self.ids.lock().push(id);
    }

    pub fn release(&self, channel: &Arc<dyn PluginChannel>) {
        for id in self.ids.lock().drain(..) {
            channel.unsubscribe(id);
        }
    }
}

/// Wait until the negotiation state satisfies `done`, failing fast on
/// `Failed` and bounding the wait with [`NEGOTIATION_TIMEOUT`].
pub(crate) async fn await_state(
    rx: &mut watch::Receiver<NegotiationState>,
    what: &'static str,
    done: impl Fn(&NegotiationState) -> bool,
) -> Result<()> {
    let wait = async {
        loop {
            {
                let state = rx.borrow_and_update();
                if done(&state) {
                    return Ok(());
                }
                if let NegotiationState::Failed(reason) = &*state {
                    return Err(ClientError::Negotiation(reason.clone()));
                }
                if *state == NegotiationState::Detached {
                    return Err(ClientError::Negotiation(format!(
                        "attachment detached before {}",
                        what
                    )));
                }
            }
            if rx.changed().await.is_err() {
                return Err(ClientError::Negotiation(format!(
                    "attachment closed before {}",
                    what
                )));
            }
        }
    };

    match tokio::time::timeout(NEGOTIATION_TIMEOUT, wait).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(what)),
    }
}
