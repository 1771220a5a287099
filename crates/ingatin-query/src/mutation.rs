// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordering driver for optimistic mutations.

use std::future::Future;

use ingatin_core::IngatinError;
use tracing::warn;

use crate::client::QueryClient;
use crate::key::QueryKey;
use crate::transaction::OptimisticTransaction;

/// Runs one mutation against the cache.
///
/// 1. Opens a transaction over `keys` (cancel + snapshot).
/// 2. Applies `optimistic` before the request is created.
/// 3. Awaits the request.
/// 4. On failure rolls back, then returns the error.
/// 5. Invalidates every key whatever the outcome.
pub async fn run_mutation<R, O, Q, Fut>(
    client: &QueryClient,
    keys: Vec<QueryKey>,
    optimistic: O,
    request: Q,
) -> Result<R, IngatinError>
where
    O: FnOnce(&OptimisticTransaction),
    Q: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, IngatinError>>,
{
    let mut tx = OptimisticTransaction::begin(client, keys);
    optimistic(&tx);

    let outcome = request().await;
    if let Err(e) = &outcome {
        warn!(error = %e, "mutation failed, rolling back");
        tx.rollback();
    }
    tx.settle();
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test]
    async fn transform_runs_before_request() {
        let client = QueryClient::new();
        let key = QueryKey::from(["users"]);
        client.set_data(key.clone(), vec![1u32]);

        let seen = Arc::new(AtomicBool::new(false));
        let observed = {
            let client = client.clone();
            let key = key.clone();
            let seen = seen.clone();
            move || async move {
                seen.store(
                    client.get_data::<Vec<u32>>(&key) == Some(vec![1, 2]),
                    Ordering::SeqCst,
                );
                Ok::<_, IngatinError>(())
            }
        };

        run_mutation(
            &client,
            vec![key.clone()],
            |tx| {
                tx.apply::<Vec<u32>, _>(&key, |v| {
                    let mut v = v.clone();
                    v.push(2);
                    v
                });
            },
            observed,
        )
        .await
        .unwrap();

        assert!(seen.load(Ordering::SeqCst));
        assert_eq!(client.get_data::<Vec<u32>>(&key), Some(vec![1, 2]));
        assert!(client.is_invalidated(&key));
    }

    #[tokio::test]
    async fn failure_rolls_back_and_returns_error() {
        let client = QueryClient::new();
        let key = QueryKey::from(["users"]);
        client.set_data(key.clone(), vec![1u32, 2]);

        let err = run_mutation(
            &client,
            vec![key.clone()],
            |tx| {
                tx.apply::<Vec<u32>, _>(&key, |_| Vec::new());
            },
            || async { Err::<(), _>(IngatinError::remote("permission denied for table users")) },
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "remote error: permission denied for table users");
        assert_eq!(client.get_data::<Vec<u32>>(&key), Some(vec![1, 2]));
        assert!(client.is_invalidated(&key));
    }
}
