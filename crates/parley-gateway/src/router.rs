use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use parley_db::Database;
use parley_types::frames::GatewayFrame;
use parley_types::models::Message;

use crate::registry::{Registry, SendOutcome};

#[derive(Debug, Error)]
pub enum RouteError {
    /// Persistence failed; nothing was delivered.
    #[error("message store failure: {0}")]
    Store(#[source] anyhow::Error),
}

/// What happened on the live-delivery leg. The message is durable in the
/// store in every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Pushed to the recipient's live connection
    Delivered,
    /// Recipient has no live connection; retrievable via history only
    Offline,
    /// A connection was registered but the push failed. At-most-once: no
    /// retry, no escalation.
    SendFailed,
}

#[derive(Debug)]
pub struct RouteReceipt {
    pub message: Message,
    pub delivery: Delivery,
}

/// Bridges persistence and live delivery for one inbound message:
/// persist first, then push to the recipient's registered connection if
/// one exists. Shared by the WebSocket session loop and the HTTP send
/// handler.
#[derive(Clone)]
pub struct Router {
    db: Arc<Database>,
    registry: Registry,
}

impl Router {
    pub fn new(db: Arc<Database>, registry: Registry) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Persist the message, then attempt exactly one live delivery.
    /// Persistence failure is the only error; delivery problems are
    /// reported in the receipt so the caller picks its own policy.
    pub async fn route(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<RouteReceipt, RouteError> {
        // Run the blocking SQLite insert off the async runtime
        let db = self.db.clone();
        let sender = sender_id.to_string();
        let recipient = recipient_id.to_string();
        let body = content.to_string();
        let row = tokio::task::spawn_blocking(move || db.insert_message(&sender, &recipient, &body))
            .await
            .map_err(|e| RouteError::Store(anyhow::anyhow!("insert task panicked: {e}")))?
            .map_err(RouteError::Store)?;

        let message = row.into_message();

        let delivery = match self
            .registry
            .send_to(recipient_id, GatewayFrame::Message(message.clone()))
            .await
        {
            SendOutcome::Sent => {
                debug!("message {} delivered live to {}", message.id, recipient_id);
                Delivery::Delivered
            }
            SendOutcome::Offline => {
                debug!("{} offline, message {} stored only", recipient_id, message.id);
                Delivery::Offline
            }
            SendOutcome::Closed => {
                warn!(
                    "live delivery of message {} to {} failed, connection hung up",
                    message.id, recipient_id
                );
                Delivery::SendFailed
            }
        };

        Ok(RouteReceipt { message, delivery })
    }
}
