use alloy_primitives::{Address, Bytes, B256};
use anyhow::{anyhow, Result};
use log::warn;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::evm::rpc::{RpcClient, RpcError, TxReceipt};

/// Delay before retrying on the next endpoint
const RETRY_DELAY: Duration = Duration::from_millis(900);

/// An ordered list of read-only RPC endpoints with a rotating cursor.
/// Public endpoints flake routinely; a transient failure rotates to the
/// next endpoint and retries exactly once, anything else propagates.
pub struct ReadProviderPool {
    endpoints: Vec<Arc<RpcClient>>,
    index: AtomicUsize,
}

impl ReadProviderPool {
    pub fn new(urls: &[String]) -> Result<Self> {
        if urls.is_empty() {
            return Err(anyhow!("at least one read RPC endpoint is required"));
        }

        Ok(Self {
            endpoints: urls.iter().map(|u| Arc::new(RpcClient::new(u))).collect(),
            index: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The endpoint reads currently go to
    pub fn current(&self) -> Arc<RpcClient> {
        self.endpoints[self.index.load(Ordering::Relaxed) % self.endpoints.len()].clone()
    }

    /// Advance to the next endpoint, wrapping at the end of the list
    pub fn rotate(&self) -> Arc<RpcClient> {
        let next = (self.index.load(Ordering::Relaxed) + 1) % self.endpoints.len();
        self.index.store(next, Ordering::Relaxed);
        self.endpoints[next].clone()
    }

    /// Run `op` on the current endpoint; on a transient failure rotate once,
    /// wait briefly, and retry once. Never more than one automatic retry.
    async fn with_failover<T, F, Fut>(&self, op: F) -> Result<T, RpcError>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let provider = self.current();
        match op(provider.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => {
                warn!(
                    "transient failure on {}: {}; rotating read provider",
                    provider.url(),
                    e
                );
                let next = self.rotate();
                tokio::time::sleep(RETRY_DELAY).await;
                op(next).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.with_failover(|client| {
            let data = data.clone();
            async move { client.eth_call(to, &data).await }
        })
        .await
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        self.with_failover(|client| async move { client.chain_id().await })
            .await
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcError> {
        self.with_failover(|client| async move { client.transaction_receipt(hash).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> ReadProviderPool {
        let urls: Vec<String> = (0..n).map(|i| format!("http://rpc{}.example", i)).collect();
        ReadProviderPool::new(&urls).unwrap()
    }

    #[test]
    fn rejects_empty_endpoint_list() {
        assert!(ReadProviderPool::new(&[]).is_err());
    }

    #[test]
    fn rotate_cycles_through_all_endpoints() {
        let pool = pool_of(3);
        let first = pool.current().url().to_string();

        let mut seen = vec![first.clone()];
        for _ in 0..2 {
            seen.push(pool.rotate().url().to_string());
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);

        // after N rotations we are back at the first endpoint
        assert_eq!(pool.rotate().url(), first);
    }
}
