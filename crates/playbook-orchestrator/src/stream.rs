//! The consumer side of a run.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;
use crate::events::{RunState, StreamEvent};

/// Ordered events of one run.
///
/// Yields `Ok` events until a terminal `RunCompleted`/`RunFailed`, or ends
/// with a single `Err` when the run is cancelled or aborted. Dropping the
/// stream cancels the run.
pub struct RunStream {
  run_id: String,
  events: mpsc::Receiver<Result<StreamEvent, OrchestratorError>>,
  state: watch::Receiver<RunState>,
  cancel: CancellationToken,
}

impl RunStream {
  pub(crate) fn new(
    run_id: String,
    events: mpsc::Receiver<Result<StreamEvent, OrchestratorError>>,
    state: watch::Receiver<RunState>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      run_id,
      events,
      state,
      cancel,
    }
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  /// The run's current lifecycle state.
  ///
  /// Settles to a terminal state no later than the end of the stream.
  pub fn state(&self) -> RunState {
    *self.state.borrow()
  }

  /// Cancel this run only. The caller's token is left untouched.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }
}

impl Stream for RunStream {
  type Item = Result<StreamEvent, OrchestratorError>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.events.poll_recv(cx)
  }
}

impl Drop for RunStream {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
