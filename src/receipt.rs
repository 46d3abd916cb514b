use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};

use crate::error::{ConnError, ServerError};

type Outcome = Result<(), ServerError>;

/// Pending receipt confirmations for one client.
///
/// A confirmed send registers its token here before the frame is written, so
/// a RECEIPT that races ahead of the caller still finds its entry. The read
/// loop resolves entries; the waiter consumes them. Each token has at most
/// one live entry.
#[derive(Default)]
pub struct ReceiptRegistry {
    pending: Mutex<HashMap<String, oneshot::Sender<Outcome>>>,
    // set under the `pending` lock once the read loop is gone
    closed: AtomicBool,
}

/// The waiting half of a registered receipt.
#[derive(Debug)]
pub struct PendingReceipt {
    token: String,
    rx: oneshot::Receiver<Outcome>,
}

impl ReceiptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for `token`.
    ///
    /// Fails with [`ConnError::DuplicateReceipt`] while another caller is
    /// still waiting on the same token. An entry whose waiter has gone away
    /// is replaced. After [`ReceiptRegistry::close`] nothing can resolve a
    /// receipt any more, so registration fails with
    /// [`ConnError::ConnectionClosed`].
    pub async fn register(&self, token: &str) -> Result<PendingReceipt, ConnError> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnError::ConnectionClosed);
        }
        if let Some(existing) = pending.get(token) {
            if !existing.is_closed() {
                return Err(ConnError::DuplicateReceipt(token.to_string()));
            }
        }
        pending.insert(token.to_string(), tx);
        Ok(PendingReceipt {
            token: token.to_string(),
            rx,
        })
    }

    /// Resolve the entry for `token` successfully. Returns `false` when no
    /// entry matched.
    pub async fn fulfill(&self, token: &str) -> bool {
        self.resolve(token, Ok(())).await
    }

    /// Resolve the entry for `token` with a broker ERROR.
    pub async fn fail(&self, token: &str, err: ServerError) -> bool {
        self.resolve(token, Err(err)).await
    }

    async fn resolve(&self, token: &str, outcome: Outcome) -> bool {
        let sender = {
            let mut pending = self.pending.lock().await;
            pending.remove(token)
        };
        match sender {
            // the waiter may have given up already; that is not an error
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `token` without resolving it.
    pub async fn remove(&self, token: &str) {
        self.pending.lock().await.remove(token);
    }

    /// Drop every entry and refuse new ones. Waiters observe
    /// [`ConnError::ConnectionClosed`].
    pub async fn close(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().await;
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().collect()
        };
        drop(drained);
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Wait for `receipt` to be resolved.
    ///
    /// With a `timeout`, the entry is removed when it expires and
    /// [`ConnError::ReceiptTimeout`] is returned.
    pub async fn wait(
        &self,
        receipt: PendingReceipt,
        timeout: Option<Duration>,
    ) -> Result<(), ConnError> {
        let PendingReceipt { token, mut rx } = receipt;
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut rx).await {
                Ok(received) => received,
                Err(_) => {
                    // `rx` outlives the removal: the entry removed is ours
                    self.remove(&token).await;
                    drop(rx);
                    tracing::warn!(receipt = %token, "receipt timed out");
                    return Err(ConnError::ReceiptTimeout(token));
                }
            },
            None => rx.await,
        };
        match received {
            Ok(Ok(())) => Ok(()),
            Ok(Err(server)) => Err(ConnError::Server(server)),
            Err(_) => Err(ConnError::ConnectionClosed),
        }
    }
}
