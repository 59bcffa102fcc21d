use core_types::{Symbol, TradeMode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// The serialization key: every ledger-affecting operation for the same
/// `(symbol, mode)` runs under one mutex, while different keys proceed
/// in parallel. Live and simulated traffic never block each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub symbol: Symbol,
    pub mode: TradeMode,
}

/// A map of per-key async mutexes, grown on first use.
///
/// The outer std mutex only guards the map itself and is never held
/// across an await; the per-key mutex is held for the whole
/// price-decide-order span of one signal.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the mutex for `key`, waiting if another signal for the
    /// same key is in flight. The guard releases on drop, on every exit
    /// path.
    pub async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap();
            Arc::clone(map.entry(key).or_default())
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(symbol: &str, mode: TradeMode) -> LockKey {
        LockKey {
            symbol: Symbol(symbol.to_string()),
            mode,
        }
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());

        let guard = locks.acquire(key("BTCUSDT", TradeMode::Live)).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                locks.acquire(key("BTCUSDT", TradeMode::Live)).await;
            })
        };

        // The second acquire must still be pending while we hold the guard.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_modes_do_not_contend() {
        let locks = KeyedLocks::new();

        let _live = locks.acquire(key("BTCUSDT", TradeMode::Live)).await;
        // Completes immediately despite the held live lock.
        let _sim = locks.acquire(key("BTCUSDT", TradeMode::Simulated)).await;
    }
}
