use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::state::SessionState;

/// Handle to a controller that works without holding its lock
///
/// `start` keeps the controller borrowed until the transport connects, so a
/// caller that shares the controller behind a mutex uses this handle to call
/// off a pending start and to read the lifecycle state in the meantime.
#[derive(Clone)]
pub struct LiveControl {
    start: watch::Receiver<CancellationToken>,
    state: watch::Receiver<SessionState>,
}

impl LiveControl {
    pub(crate) fn new(
        start: watch::Receiver<CancellationToken>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self { start, state }
    }

    /// Cancel the start in progress, if any.
    ///
    /// The start releases what it acquired and the controller ends `Closed`.
    /// Returns whether a start was pending.
    pub fn cancel_start(&self) -> bool {
        let pending = self.state() == SessionState::Starting;
        self.start.borrow().cancel();
        pending
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}
