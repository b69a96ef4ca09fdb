//! Coalescing of requests that wait on the same asynchronous answer.
//!
//! A handler that needs information arriving later as an event (for example
//! which account a nick is identified to) attaches a waiter for a key. Only
//! the first waiter for an outstanding key needs to issue the request; the
//! event that carries the answer resolves every waiter at once and clears the
//! key.
//!
//! ```rust,ignore
//! let pending = table.attach(nick.to_string());
//! if pending.needs_request() {
//!     transport.identify(&nick).await?;
//! }
//! tokio::spawn(async move {
//!     if let Ok(account) = pending.resolved().await { /* reply */ }
//! });
//!
//! // later, in the hook for the answer:
//! table.resolve(&nick, account);
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// The key was cancelled or the table dropped before an answer arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request was cancelled before an answer arrived")]
pub struct Cancelled;

/// A table of pending waiters keyed by `K`.
#[derive(Debug)]
pub struct CorrelationTable<K, V> {
    waiters: Mutex<HashMap<K, Vec<oneshot::Sender<V>>>>,
}

impl<K, V> Default for CorrelationTable<K, V> {
    fn default() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> CorrelationTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a waiter for `key`.
    pub fn attach(&self, key: K) -> Pending<V> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters.lock();
        let list = waiters.entry(key).or_default();
        let first = list.is_empty();
        list.push(tx);
        Pending { rx, first }
    }

    /// Resolves every waiter of `key` with `value` and clears the key.
    ///
    /// Returns how many waiters were still listening.
    pub fn resolve<Q>(&self, key: &Q, value: V) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let senders = self.waiters.lock().remove(key).unwrap_or_default();
        senders
            .into_iter()
            .map(|tx| tx.send(value.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    /// Drops every waiter of `key`; they observe [`Cancelled`].
    pub fn cancel<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.waiters.lock().remove(key).map_or(0, |senders| senders.len())
    }

    /// Whether `key` has waiters.
    pub fn is_pending<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.waiters.lock().contains_key(key)
    }

    /// Number of keys with waiters.
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }
}

/// One waiter attached to a [`CorrelationTable`].
#[derive(Debug)]
pub struct Pending<V> {
    rx: oneshot::Receiver<V>,
    first: bool,
}

impl<V> Pending<V> {
    /// `true` for the first waiter of an outstanding key, which is the one
    /// that should issue the request.
    pub fn needs_request(&self) -> bool {
        self.first
    }

    /// Waits for the answer.
    pub async fn resolved(self) -> Result<V, Cancelled> {
        self.rx.await.map_err(|_| Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_waiters_coalesce_and_all_resolve() {
        let table: CorrelationTable<String, Option<String>> = CorrelationTable::new();

        let first = table.attach("alan".to_string());
        let second = table.attach("alan".to_string());
        let other = table.attach("grace".to_string());
        assert!(first.needs_request());
        assert!(!second.needs_request());
        assert!(other.needs_request());

        assert_eq!(table.resolve("alan", Some("alan".to_string())), 2);
        assert!(!table.is_pending("alan"));
        assert_eq!(first.resolved().await, Ok(Some("alan".to_string())));
        assert_eq!(second.resolved().await, Ok(Some("alan".to_string())));

        // Resolved keys start over.
        assert!(table.attach("alan".to_string()).needs_request());
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_without_waiters_is_a_noop() {
        let table: CorrelationTable<String, u32> = CorrelationTable::new();
        assert_eq!(table.resolve("nobody", 1), 0);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_notifies_waiters() {
        let table: CorrelationTable<String, u32> = CorrelationTable::new();
        let pending = table.attach("alan".to_string());
        assert_eq!(table.cancel("alan"), 1);
        assert_eq!(pending.resolved().await, Err(Cancelled));
    }
}
