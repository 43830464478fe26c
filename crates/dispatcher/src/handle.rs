//! DispatcherHandle - controls a spawned dispatch loop

use std::sync::Arc;
use std::time::Duration;

use ingestion::EventQueue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::dispatcher::{DispatchReport, DispatchState};

/// Handle to a running dispatch task
pub struct DispatcherHandle {
    cancel: CancellationToken,
    queue: EventQueue,
    state: Arc<watch::Sender<DispatchState>>,
    task: Option<JoinHandle<DispatchReport>>,
    report: Option<DispatchReport>,
}

impl DispatcherHandle {
    pub(crate) fn new(
        cancel: CancellationToken,
        queue: EventQueue,
        state: Arc<watch::Sender<DispatchState>>,
        task: JoinHandle<DispatchReport>,
    ) -> Self {
        Self {
            cancel,
            queue,
            state,
            task: Some(task),
            report: None,
        }
    }

    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == DispatchState::Stopped
    }

    /// Stop the loop and wait for it at most `timeout`
    ///
    /// Cancels dispatch, wakes and closes the queue, then joins the task.
    /// A task still running after `timeout` is aborted. Calling `stop` again
    /// returns the first report.
    #[instrument(name = "dispatcher_handle_stop", skip(self))]
    pub async fn stop(&mut self, timeout: Duration) -> Option<DispatchReport> {
        self.cancel.cancel();
        self.queue.wake();
        self.queue.close();
        self.join(timeout).await
    }

    /// Let the loop drain a closed queue, then stop it
    ///
    /// Falls back to `stop` if the loop has not finished within `timeout`.
    pub async fn stop_when_drained(&mut self, timeout: Duration) -> Option<DispatchReport> {
        if let Some(task) = self.task.as_mut() {
            if let Ok(joined) = tokio::time::timeout(timeout, task).await {
                self.task = None;
                self.settle(joined);
            }
        }
        self.stop(timeout).await
    }

    async fn join(&mut self, timeout: Duration) -> Option<DispatchReport> {
        let Some(mut task) = self.task.take() else {
            debug!("Dispatcher already joined");
            return self.report.clone();
        };

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => self.settle(joined),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Dispatcher did not stop in time, aborting"
                );
                task.abort();
                self.state.send_replace(DispatchState::Stopped);
            }
        }
        self.report.clone()
    }

    fn settle(&mut self, joined: Result<DispatchReport, tokio::task::JoinError>) {
        match joined {
            Ok(report) => self.report = Some(report),
            Err(e) => {
                error!(error = ?e, "Dispatcher task failed");
                self.state.send_replace(DispatchState::Stopped);
            }
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use contracts::{ContractError, EventSink, FusedEvent};

    /// Sink whose writes never complete
    struct StuckSink;

    impl EventSink for StuckSink {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn write(&mut self, _event: &FusedEvent) -> Result<(), ContractError> {
            std::future::pending().await
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_sink_is_aborted_after_timeout() {
        let queue = EventQueue::new();
        let mut handle =
            Dispatcher::new(queue.clone(), StuckSink, crate::testing::RecordingSink::new("b"))
                .spawn();

        queue.enqueue(FusedEvent::new("A", "B", "x", 1, 2)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let report = handle.stop(Duration::from_secs(5)).await;
        assert!(report.is_none());
        assert!(handle.is_stopped());
        assert!(handle.stop(Duration::from_secs(5)).await.is_none());
    }
}
