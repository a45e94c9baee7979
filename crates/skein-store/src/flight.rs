//! In-process coordination for check-then-act sequences.
//!
//! The remote service has no compare-and-swap, so two callers that both see
//! "absent" will both create. Within one process that race is closed here:
//!
//! - [`SingleFlight`] collapses concurrent calls for the same key into one
//!   execution and hands its result to every waiter.
//! - [`NameLocks`] serializes read-modify-write sequences per name.
//!
//! Neither helps against other processes writing the same remote tree.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, OwnedMutexGuard};

/// Collapses concurrent identical calls into one.
///
/// The first caller for a key becomes the leader and runs its future; callers
/// arriving while it is in flight subscribe to the leader's result instead of
/// running their own. If the leader is cancelled before finishing, its waiters
/// compete again and one of them becomes the new leader.
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, broadcast::Sender<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` for `key`, or wait for the call already in flight.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        loop {
            let waiter = {
                let mut calls = self.lock();
                match calls.get(&key) {
                    Some(tx) => Some(tx.subscribe()),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        calls.insert(key.clone(), tx);
                        None
                    }
                }
            };
            match waiter {
                // An error means the leader went away without a result.
                Some(mut rx) => {
                    if let Ok(value) = rx.recv().await {
                        return value;
                    }
                }
                None => break,
            }
        }

        let flight = Flight {
            owner: self,
            key: Some(key),
        };
        let value = f().await;
        flight.complete(value.clone());
        value
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, broadcast::Sender<V>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Leader's registration; deregisters on drop so a cancelled leader never
/// strands its key.
struct Flight<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    owner: &'a SingleFlight<K, V>,
    key: Option<K>,
}

impl<K, V> Flight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn complete(mut self, value: V) {
        if let Some(key) = self.key.take() {
            if let Some(tx) = self.owner.lock().remove(&key) {
                // No receivers is fine: nobody was waiting.
                let _ = tx.send(value);
            }
        }
    }
}

impl<K, V> Drop for Flight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.owner.lock().remove(&key);
        }
    }
}

/// Per-name async mutexes.
///
/// Entries are never evicted; the key space is the set of top-level shard
/// names, which the shard scheme keeps small.
#[derive(Default)]
pub struct NameLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_calls_share_one_execution() {
        let flight = Arc::new(SingleFlight::<String, usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let runs = runs.clone();
            tasks.push(tokio::spawn(async move {
                flight
                    .run("key".to_string(), || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        runs.fetch_add(1, Ordering::SeqCst) + 100
                    })
                    .await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), 100);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let flight = SingleFlight::<&'static str, &'static str>::new();
        let (a, b) = tokio::join!(
            flight.run("a", || async { "A" }),
            flight.run("b", || async { "B" }),
        );
        assert_eq!((a, b), ("A", "B"));
    }

    #[tokio::test]
    async fn sequential_calls_run_again() {
        let flight = SingleFlight::<u8, u32>::new();
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            flight
                .run(1, || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    7
                })
                .await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_leader_hands_over() {
        let flight = Arc::new(SingleFlight::<u8, &'static str>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(1, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        "leader"
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flight.in_flight(), 1);

        let follower = {
            let flight = flight.clone();
            tokio::spawn(async move { flight.run(1, || async { "follower" }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        assert_eq!(follower.await.unwrap(), "follower");
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn name_locks_serialize_same_name() {
        let locks = Arc::new(NameLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let (locks, inside, max_inside) = (locks.clone(), inside.clone(), max_inside.clone());
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("aa").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn name_locks_do_not_block_other_names() {
        let locks = NameLocks::new();
        let _a = locks.lock("aa").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("bb")).await;
        assert!(b.is_ok());
    }
}
