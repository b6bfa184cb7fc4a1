//! Request correlation: id allocation and the pending-response table.

use crate::jsonrpc::RpcResponse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, oneshot};

/// Tracks in-flight requests and routes responses back to their callers.
///
/// The table is the single source of truth for "is this response expected":
/// an id is present from [`register`](Self::register) until exactly one of
/// response delivery or timeout removal. A response arriving after removal
/// finds no entry and is dropped, so at most one resolution ever happens
/// per id.
pub(crate) struct RequestTracker {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<RpcResponse>>>,
}

impl RequestTracker {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh id and register a pending slot for it.
    ///
    /// Ids are decimal renderings of an atomic counter: unique and
    /// monotonically increasing for the life of the tracker, safe under
    /// concurrent callers.
    pub(crate) async fn register(&self) -> (String, oneshot::Receiver<RpcResponse>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        (id, rx)
    }

    /// Route a response to its waiting caller and drop the table entry.
    ///
    /// Responses without an id (server-initiated notifications) and
    /// responses whose id is not in the table (late arrivals, duplicates)
    /// are logged and dropped — never fatal.
    pub(crate) async fn complete(&self, resp: RpcResponse) {
        let Some(id) = resp.id.clone() else {
            tracing::debug!("Ignoring server message without id");
            return;
        };
        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(resp);
            }
            None => tracing::warn!("Dropping response for unknown request id {id}"),
        }
    }

    /// Remove a pending entry without resolving it (timeout cleanup).
    pub(crate) async fn forget(&self, id: &str) {
        self.pending.lock().await.remove(id);
    }

    /// Drop every pending entry, rejecting all waiting callers at once.
    ///
    /// Called when the transport closes so callers fail promptly instead of
    /// waiting out their individual timeouts.
    pub(crate) async fn fail_all(&self) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            tracing::warn!("Transport closed with {} requests in flight", pending.len());
        }
        pending.clear();
    }

    pub(crate) async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
