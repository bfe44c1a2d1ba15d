//! One-shot readiness gate for backends that come up asynchronously.

use super::{GatewayError, GatewayResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Opens once and stays open. Waiters park on a watch channel instead of
/// polling the backend.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadinessGate {
    /// A closed gate
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A gate that is already open
    pub fn opened() -> Self {
        let gate = Self::new();
        gate.mark_ready();
        gate
    }

    pub fn mark_ready(&self) {
        self.tx.send_if_modified(|ready| !std::mem::replace(ready, true));
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the gate opens
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Wait with a deadline; a backend that never comes up is unreachable
    pub async fn wait_timeout(&self, timeout: Duration) -> GatewayResult<()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| {
                GatewayError::Unavailable("Backend did not become ready in time".to_string())
            })
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opened_gate_resolves_immediately() {
        let gate = ReadinessGate::opened();
        assert!(gate.is_ready());
        gate.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_released_on_mark_ready() {
        let gate = ReadinessGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_timeout(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        gate.mark_ready();

        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_reports_unavailable() {
        let gate = ReadinessGate::new();
        let result = gate.wait_timeout(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
    }
}
