use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;

/// Collapses concurrent calls for the same key into one execution; every
/// caller receives a clone of the same output.
pub struct SingleFlight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    in_flight: DashMap<K, Shared<BoxFuture<'static, V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Run `make()` unless a call for `key` is already in flight, in which
    /// case await that one instead.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let flight = make().boxed().shared();
                entry.insert(flight.clone());
                flight
            }
        };

        let output = flight.clone().await;

        // A later flight for the same key may already be registered
        self.in_flight
            .remove_if(&key, |_, current| current.ptr_eq(&flight));

        output
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let flights: SingleFlight<&str, usize> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = || {
            let calls = calls.clone();
            flights.run("session-1", move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                calls.fetch_add(1, Ordering::SeqCst) + 1
            })
        };

        let results = futures::future::join_all((0..10).map(|_| run())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == 1));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        assert_eq!(flights.run(1, || async { 1 }).await, 1);
        assert_eq!(flights.run(1, || async { 2 }).await, 2);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();

        let (a, b) = tokio::join!(
            flights.run(1, || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                10
            }),
            flights.run(2, || async { 20 })
        );

        assert_eq!((a, b), (10, 20));
    }
}
