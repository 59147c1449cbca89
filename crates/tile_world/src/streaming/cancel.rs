//! Cooperative cancellation for generation tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::GenerateError;

/// Shared flag a generation task polls between pipeline stages.
///
/// Clones share the flag; cancelling any clone cancels all of them.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }

  /// `Err(Cancelled)` once cancelled, for use with `?`.
  pub fn check(&self) -> Result<(), GenerateError> {
    if self.is_cancelled() {
      Err(GenerateError::Cancelled)
    } else {
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clones_share_state() {
    let token = CancelToken::new();
    let worker = token.clone();
    assert!(worker.check().is_ok());
    token.cancel();
    assert!(worker.is_cancelled());
    assert_eq!(worker.check(), Err(GenerateError::Cancelled));
  }
}
