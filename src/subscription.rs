use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, Semaphore};

use crate::frame::Frame;
use crate::message::Message;

/// Subscription acknowledgement modes as defined by STOMP 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(AckMode::Auto),
            "client" => Ok(AckMode::Client),
            "client-individual" => Ok(AckMode::ClientIndividual),
            other => Err(format!("unknown ack mode '{}'", other)),
        }
    }
}

/// Callback invoked once per delivered message.
pub type Handler = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Box an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |msg| f(msg).boxed())
}

struct Entry {
    id: String,
    destination: String,
    ack: AckMode,
    handler: Handler,
}

/// Live subscriptions of one client and the dispatch of inbound MESSAGEs to
/// their handlers.
///
/// Each handler call runs on its own task. A semaphore bounds how many run at
/// once; the permit is taken inside the task so the read loop never waits on
/// a slow handler.
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    limiter: Arc<Semaphore>,
}

impl SubscriptionRegistry {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            limiter: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    /// Allocate a subscription id unique within this registry.
    pub fn next_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("sub-{}", n)
    }

    pub async fn insert(&self, id: String, destination: String, ack: AckMode, handler: Handler) {
        tracing::debug!(subscription = %id, %destination, ack = ack.as_str(), "subscribed");
        self.entries.lock().await.push(Entry {
            id,
            destination,
            ack,
            handler,
        });
    }

    /// Remove the entry with `id`. Returns `false` when there was none.
    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.iter().position(|e| e.id == id) {
            Some(idx) => {
                let entry = entries.swap_remove(idx);
                tracing::debug!(subscription = %id, destination = %entry.destination, "unsubscribed");
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.lock().await.iter().any(|e| e.id == id)
    }

    /// Hand a MESSAGE frame to every handler registered under its
    /// `subscription` header. Returns how many handler tasks were spawned.
    pub async fn dispatch(&self, frame: Frame) -> usize {
        let message = Message::from(frame);
        let Some(sub_id) = message.subscription().map(str::to_string) else {
            tracing::warn!(destination = ?message.destination(), "MESSAGE without subscription header dropped");
            return 0;
        };

        let handlers: Vec<(Handler, AckMode)> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|e| e.id == sub_id)
                .map(|e| (e.handler.clone(), e.ack))
                .collect()
        };

        if handlers.is_empty() {
            tracing::debug!(subscription = %sub_id, "no handler for MESSAGE");
            return 0;
        }

        let spawned = handlers.len();
        for (handler, ack) in handlers {
            let msg = message.clone();
            let limiter = self.limiter.clone();
            let sub_id = sub_id.clone();
            tokio::spawn(async move {
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return;
                };
                let run = AssertUnwindSafe(async move { handler(msg).await });
                if run.catch_unwind().await.is_err() {
                    // outside auto mode the broker keeps the message pending
                    tracing::warn!(
                        subscription = %sub_id,
                        ack = ack.as_str(),
                        "subscription handler panicked"
                    );
                }
            });
        }
        spawned
    }
}
