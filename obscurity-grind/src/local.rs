//! In-process key search.
//!
//! Walks the curve from a random start point, one generator addition per
//! attempt, until the compressed key's X coordinate starts with the target
//! chunk. Practical only for small chunks; real grinds use a
//! [`ProcessFactory`](crate::ProcessFactory).

use async_trait::async_trait;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, NonZeroScalar, ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use tracing::debug;

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{KeySearcher, SearcherFactory};
use obscurity_core::types::{Difficulty, FoundKey, GrindTarget};

/// Opens in-process searchers.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFactory {
    max_attempts: Option<u64>,
}

impl LocalFactory {
    /// Creates a factory whose searchers never give up.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes each search fail after `max_attempts` keys.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

#[async_trait]
impl SearcherFactory for LocalFactory {
    type Searcher = LocalSearcher;

    async fn spawn(&self, worker_id: usize, difficulty: Difficulty) -> Result<LocalSearcher> {
        debug!(worker = worker_id, bits = difficulty.bits(), "Opened in-process searcher");
        Ok(LocalSearcher {
            worker_id,
            max_attempts: self.max_attempts,
        })
    }
}

/// A key search running on the blocking thread pool.
#[derive(Debug)]
pub struct LocalSearcher {
    worker_id: usize,
    max_attempts: Option<u64>,
}

#[async_trait]
impl KeySearcher for LocalSearcher {
    async fn search(&mut self, target: &GrindTarget) -> Result<FoundKey> {
        let worker = self.worker_id;
        let max_attempts = self.max_attempts;
        let chunk = target.chunk.clone();

        let found = tokio::task::spawn_blocking(move || search_blocking(&chunk, max_attempts))
            .await
            .map_err(|e| ObscurityError::WorkerCrashed {
                worker,
                reason: e.to_string(),
            })?;

        found.ok_or_else(|| ObscurityError::WorkerCrashed {
            worker,
            reason: format!("no match for {} within {:?} attempts", target.as_hex(), max_attempts),
        })
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Searches for a key whose compressed X coordinate starts with `prefix`.
///
/// Returns `None` once `max_attempts` keys have been tried.
pub fn search_blocking(prefix: &[u8], max_attempts: Option<u64>) -> Option<FoundKey> {
    let mut scalar: Scalar = *NonZeroScalar::random(&mut OsRng);
    let mut point = ProjectivePoint::GENERATOR * scalar;
    let mut attempts = 0u64;

    loop {
        if max_attempts.is_some_and(|max| attempts >= max) {
            return None;
        }
        attempts += 1;

        let encoded = AffinePoint::from(point).to_encoded_point(true);
        let public_key = encoded.as_bytes();
        if public_key[1..].starts_with(prefix) {
            return Some(FoundKey {
                private_key: hex::encode(scalar.to_bytes()),
                public_key: hex::encode(public_key),
                attempts,
            });
        }

        scalar += Scalar::ONE;
        point += ProjectivePoint::GENERATOR;
        if bool::from(scalar.is_zero()) {
            scalar = *NonZeroScalar::random(&mut OsRng);
            point = ProjectivePoint::GENERATOR * scalar;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::SecretKey;

    fn derive_public(private_key: &str) -> Vec<u8> {
        let secret = SecretKey::from_slice(&hex::decode(private_key).unwrap()).unwrap();
        secret.public_key().to_encoded_point(true).as_bytes().to_vec()
    }

    #[test]
    fn test_found_key_is_consistent() {
        let found = search_blocking(&[0xab], None).unwrap();
        let pk = hex::decode(&found.public_key).unwrap();

        assert_eq!(pk.len(), 33);
        assert_eq!(pk[1], 0xab);
        assert!(found.attempts >= 1);
        assert_eq!(derive_public(&found.private_key), pk);
    }

    #[test]
    fn test_gives_up() {
        assert!(search_blocking(&[0x5a; 32], Some(16)).is_none());
    }

    #[tokio::test]
    async fn test_searcher_interface() {
        let mut searcher = LocalFactory::new().spawn(0, Difficulty::default()).await.unwrap();
        let target = GrindTarget::new(0, vec![0x42]);

        let found = searcher.search(&target).await.unwrap();
        assert!(target.matches_public_key(&hex::decode(&found.public_key).unwrap()));
        searcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_max_attempts_reported_as_worker_failure() {
        let mut searcher = LocalFactory::new()
            .with_max_attempts(4)
            .spawn(7, Difficulty::default())
            .await
            .unwrap();
        let err = searcher.search(&GrindTarget::new(0, vec![0; 32])).await.unwrap_err();
        assert!(matches!(err, ObscurityError::WorkerCrashed { worker: 7, .. }));
    }
}
