//! Single-flight execution keyed by an arbitrary value.
//!
//! Concurrent callers asking for the same key share one execution of the
//! work and all observe its outcome. Outcomes are not retained: once the
//! work finishes and the callers have collected it, the next call for the
//! key runs the work again. Caching is the caller's business.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

/// Deduplicates concurrent executions per key.
///
/// If the caller running the work is cancelled, one of the remaining
/// callers takes over and runs its own copy of the work.
pub struct SingleFlight<K, V> {
    in_flight: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key` unless a run is already in flight, in which case
    /// wait for that run and return its outcome.
    ///
    /// The boolean is `true` when this caller's own `work` produced the value.
    pub async fn run<W, Fut>(&self, key: K, work: W) -> (V, bool)
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(
                in_flight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let mut led = false;
        let value = cell
            .get_or_init(|| {
                led = true;
                work()
            })
            .await
            .clone();

        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(&key);
        }

        (value, led)
    }

    /// Number of keys with work currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
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
