//! Per-scope serialization for position rewrites
//!
//! Every read-modify-write of positions holds the lock of the scope it
//! touches for the whole transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A positional scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Items of one list
    List(String),
    /// Subscriptions of one user
    User(String),
}

type LockMap = HashMap<Scope, Arc<AsyncMutex<()>>>;

/// Held scope locks; released on drop.
///
/// Releasing also evicts map entries nobody else holds or waits on, so the
/// map stays bounded by the scopes currently in use.
pub struct ScopeGuard {
    held: Vec<(Scope, OwnedMutexGuard<()>)>,
    map: Arc<Mutex<LockMap>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let scopes: Vec<Scope> = self.held.drain(..).map(|(scope, _guard)| scope).collect();

        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        for scope in scopes {
            // Waiters clone the Arc under this same map lock
            if map.get(&scope).is_some_and(|m| Arc::strong_count(m) == 1) {
                map.remove(&scope);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct ScopeLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a single scope
    pub async fn lock(&self, scope: Scope) -> ScopeGuard {
        self.lock_all(vec![scope]).await
    }

    /// Lock several scopes in sorted order so two callers can't deadlock
    pub async fn lock_all(&self, mut scopes: Vec<Scope>) -> ScopeGuard {
        scopes.sort();
        scopes.dedup();

        let mutexes: Vec<(Scope, Arc<AsyncMutex<()>>)> = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            scopes
                .into_iter()
                .map(|scope| {
                    let mutex = map.entry(scope.clone()).or_default().clone();
                    (scope, mutex)
                })
                .collect()
        };

        let mut guard = ScopeGuard {
            held: Vec::with_capacity(mutexes.len()),
            map: Arc::clone(&self.inner),
        };
        for (scope, mutex) in mutexes {
            guard.held.push((scope, mutex.lock_owned().await));
        }

        guard
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_scope_is_exclusive() {
        let locks = ScopeLocks::new();
        let guard = locks.lock(Scope::List("l1".into())).await;

        let contender = locks.clone();
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            contender.lock(Scope::List("l1".into())),
        )
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let acquired = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock(Scope::List("l1".into())),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_scopes_do_not_block() {
        let locks = ScopeLocks::new();
        let _list = locks.lock(Scope::List("l1".into())).await;

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock_all(vec![Scope::User("u1".into()), Scope::List("l2".into())]),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_scopes_collapse() {
        let locks = ScopeLocks::new();
        let acquired = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock_all(vec![Scope::List("l1".into()), Scope::List("l1".into())]),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_released_scopes_are_evicted() {
        let locks = ScopeLocks::new();

        let guard = locks
            .lock_all(vec![Scope::List("l1".into()), Scope::User("u1".into())])
            .await;
        assert_eq!(locks.tracked(), 2);
        drop(guard);
        assert_eq!(locks.tracked(), 0);

        for n in 0..100 {
            let _guard = locks.lock(Scope::List(format!("l{}", n))).await;
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = ScopeLocks::new();
        let first = locks.lock(Scope::List("l1".into())).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.lock(Scope::List("l1".into())).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter holds a clone, so releasing must not evict the entry
        drop(first);
        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.tracked(), 0);
    }
}
