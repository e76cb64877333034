//! Run-wide concurrency throttle.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;

/// Bounds how many nodes of a run execute at once.
///
/// Clones share the same slots.
#[derive(Debug, Clone)]
pub struct Throttle {
  semaphore: Arc<Semaphore>,
  limit: usize,
}

/// A held throttle slot, released on drop.
#[derive(Debug)]
pub struct ThrottlePermit {
  _permit: OwnedSemaphorePermit,
}

impl Throttle {
  /// Create a throttle with `limit` slots. A limit of zero is raised to one.
  pub fn new(limit: usize) -> Self {
    let limit = limit.max(1);
    Self {
      semaphore: Arc::new(Semaphore::new(limit)),
      limit,
    }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  /// Slots not currently held.
  pub fn available(&self) -> usize {
    self.semaphore.available_permits()
  }

  /// Wait for a slot, giving up if `cancel` fires first.
  pub async fn acquire(
    &self,
    cancel: &CancellationToken,
  ) -> Result<ThrottlePermit, OrchestratorError> {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
      permit = self.semaphore.clone().acquire_owned() => permit
        .map(|permit| ThrottlePermit { _permit: permit })
        // The semaphore is never closed while a run holds the throttle
        .map_err(|_| OrchestratorError::Cancelled),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_permits_are_released_on_drop() {
    let throttle = Throttle::new(2);
    let cancel = CancellationToken::new();

    let first = throttle.acquire(&cancel).await.unwrap();
    let _second = throttle.acquire(&cancel).await.unwrap();
    assert_eq!(throttle.available(), 0);

    drop(first);
    assert_eq!(throttle.available(), 1);
  }

  #[tokio::test]
  async fn test_waiter_blocks_until_slot_frees() {
    let throttle = Throttle::new(1);
    let cancel = CancellationToken::new();
    let held = throttle.acquire(&cancel).await.unwrap();

    let waiter = {
      let throttle = throttle.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move { throttle.acquire(&cancel).await.map(|_| ()) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(held);
    assert!(waiter.await.unwrap().is_ok());
  }

  #[tokio::test]
  async fn test_cancel_aborts_pending_acquire() {
    let throttle = Throttle::new(1);
    let cancel = CancellationToken::new();
    let _held = throttle.acquire(&cancel).await.unwrap();

    let waiter = {
      let throttle = throttle.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move { throttle.acquire(&cancel).await.map(|_| ()) })
    };

    cancel.cancel();
    assert!(matches!(
      waiter.await.unwrap(),
      Err(OrchestratorError::Cancelled)
    ));
  }

  #[tokio::test]
  async fn test_zero_limit_is_raised() {
    assert_eq!(Throttle::new(0).limit(), 1);
  }
}
