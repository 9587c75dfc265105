use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use parley_types::frames::GatewayFrame;

/// Unique id for one registered connection. Lets a session prove it still
/// owns its registry entry before removing it.
pub type ConnId = Uuid;

/// Result of pushing a frame to a user's live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame handed to the session's send task
    Sent,
    /// No live connection registered for this user
    Offline,
    /// An entry existed but its session has already hung up
    Closed,
}

/// Process-wide map of username -> live connection, shared by every
/// session task. The registry holds only the sending half of each
/// session's frame channel; the session loop owns the socket itself.
///
/// At most one entry per username: `register` overwrites so routing
/// always targets the most recent connection, and `unregister` removes
/// an entry only when the caller's conn id still owns it.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<String, (ConnId, mpsc::UnboundedSender<GatewayFrame>)>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `username`, displacing any previous one.
    /// Returns the connection id and the receiving half for the session's
    /// send task.
    pub async fn register(
        &self,
        username: &str,
    ) -> (ConnId, mpsc::UnboundedReceiver<GatewayFrame>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .write()
            .await
            .insert(username.to_string(), (conn_id, tx));
        (conn_id, rx)
    }

    /// Remove the entry for `username`, but only if `conn_id` still owns
    /// it. A displaced session exiting late must not evict its
    /// replacement.
    pub async fn unregister(&self, username: &str, conn_id: ConnId) {
        let mut map = self.inner.write().await;
        if let Some((stored, _)) = map.get(username) {
            if *stored == conn_id {
                map.remove(username);
            }
        }
    }

    /// Push a frame to `username`'s live connection, if any. Never blocks
    /// and never errors; the outcome tells the caller what happened.
    pub async fn send_to(&self, username: &str, frame: GatewayFrame) -> SendOutcome {
        let map = self.inner.read().await;
        match map.get(username) {
            Some((_, tx)) => {
                if tx.send(frame).is_ok() {
                    SendOutcome::Sent
                } else {
                    SendOutcome::Closed
                }
            }
            None => SendOutcome::Offline,
        }
    }

    pub async fn is_connected(&self, username: &str) -> bool {
        self.inner.read().await.contains_key(username)
    }

    pub async fn online_users(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_frame() -> GatewayFrame {
        GatewayFrame::Ready {
            username: "alice".into(),
        }
    }

    #[tokio::test]
    async fn send_to_offline_user_does_not_error() {
        let registry = Registry::new();
        assert_eq!(
            registry.send_to("ghost", text_frame()).await,
            SendOutcome::Offline
        );
    }

    #[tokio::test]
    async fn register_delivers_to_receiver() {
        let registry = Registry::new();
        let (_conn, mut rx) = registry.register("alice").await;

        assert_eq!(
            registry.send_to("alice", text_frame()).await,
            SendOutcome::Sent
        );
        assert!(matches!(rx.recv().await, Some(GatewayFrame::Ready { .. })));
    }

    #[tokio::test]
    async fn reconnect_overwrites_previous_entry() {
        let registry = Registry::new();
        let (_old_conn, mut old_rx) = registry.register("alice").await;
        let (_new_conn, mut new_rx) = registry.register("alice").await;

        assert_eq!(
            registry.send_to("alice", text_frame()).await,
            SendOutcome::Sent
        );
        // The new connection receives; the displaced channel gets nothing
        // and its sender side is gone.
        assert!(new_rx.recv().await.is_some());
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_unregister_cannot_evict_replacement() {
        let registry = Registry::new();
        let (old_conn, _old_rx) = registry.register("alice").await;
        let (_new_conn, _new_rx) = registry.register("alice").await;

        // The displaced session exits late and tries to clean up.
        registry.unregister("alice", old_conn).await;
        assert!(registry.is_connected("alice").await);
    }

    #[tokio::test]
    async fn owner_unregister_removes_entry() {
        let registry = Registry::new();
        let (conn, _rx) = registry.register("alice").await;
        registry.unregister("alice", conn).await;
        assert!(!registry.is_connected("alice").await);
        assert_eq!(
            registry.send_to("alice", text_frame()).await,
            SendOutcome::Offline
        );
    }

    #[tokio::test]
    async fn send_to_hung_up_session_reports_closed() {
        let registry = Registry::new();
        let (_conn, rx) = registry.register("alice").await;
        drop(rx);
        assert_eq!(
            registry.send_to("alice", text_frame()).await,
            SendOutcome::Closed
        );
    }
}
