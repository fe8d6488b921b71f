//! Cancellation gate for asynchronous work.
//!
//! A [`Cancellable`] keeps driving the wrapped task to completion; cancelling
//! only decides whether the caller gets to observe the result.

use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::future::{self, Either};
use futures_timer::Delay;
use pin_project::pin_project;
use thiserror::Error;
use tracing::trace;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TaskError<E> {
    #[error("task was canceled")]
    Canceled,
    #[error("task failed: {0}")]
    Failed(E),
}

impl<E> TaskError<E> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Idempotent. Never interrupts the underlying task.
    pub fn cancel(&self) {
        if !self.canceled.swap(true, Ordering::SeqCst) {
            trace!("task canceled");
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

#[pin_project]
#[must_use = "futures do nothing unless polled"]
pub struct Cancellable<F> {
    #[pin]
    task: F,
    handle: CancelHandle,
}

impl<F> Cancellable<F> {
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn is_canceled(&self) -> bool {
        self.handle.is_canceled()
    }
}

impl<F, T, E> Future for Cancellable<F>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = Result<T, TaskError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.task.poll(cx));
        if this.handle.is_canceled() {
            return Poll::Ready(Err(TaskError::Canceled));
        }
        Poll::Ready(result.map_err(TaskError::Failed))
    }
}

pub fn cancellable<F, T, E>(task: F) -> (Cancellable<F>, CancelHandle)
where
    F: Future<Output = Result<T, E>>,
{
    let handle = CancelHandle::default();
    (
        Cancellable {
            task,
            handle: handle.clone(),
        },
        handle,
    )
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("task did not settle within {limit:?}")]
pub struct TimedOut {
    pub limit: Duration,
}

/// Races `task` against a timer.
pub async fn timeout<F>(task: F, limit: Duration) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    let task = pin!(task);
    match future::select(task, Delay::new(limit)).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(TimedOut { limit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn resolves_with_original_value_when_not_canceled() {
        let (task, _handle) = cancellable(async { Ok::<_, &str>(7) });
        assert_eq!(block_on(task), Ok(7));
    }

    #[test]
    fn original_failure_is_kept_when_not_canceled() {
        let (task, _handle) = cancellable(async { Err::<u8, _>("boom") });
        assert_eq!(block_on(task), Err(TaskError::Failed("boom")));
    }

    #[test]
    fn cancel_before_settlement_masks_success_and_failure() {
        let (ok_task, ok_handle) = cancellable(async { Ok::<_, &str>(1) });
        ok_handle.cancel();
        assert!(block_on(ok_task).is_err_and(|error| error.is_canceled()));

        let (err_task, err_handle) = cancellable(async { Err::<u8, _>("boom") });
        err_handle.cancel();
        assert_eq!(block_on(err_task), Err(TaskError::Canceled));
    }

    #[test]
    fn cancel_is_idempotent_and_does_not_stop_the_task() {
        let finished = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = oneshot::channel::<u8>();
        let (task, handle) = {
            let finished = finished.clone();
            cancellable(async move {
                let value = receiver.await;
                finished.fetch_add(1, Ordering::SeqCst);
                value
            })
        };

        handle.cancel();
        handle.cancel();
        assert!(task.is_canceled());
        sender.send(3).expect("receiver alive");

        assert_eq!(block_on(task), Err(TaskError::Canceled));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timeout_expires_for_pending_task() {
        let result = block_on(timeout(
            future::pending::<()>(),
            Duration::from_millis(10),
        ));
        assert_eq!(
            result,
            Err(TimedOut {
                limit: Duration::from_millis(10)
            })
        );
    }

    #[test]
    fn timeout_passes_through_ready_task() {
        let result = block_on(timeout(async { 5 }, Duration::from_secs(5)));
        assert_eq!(result, Ok(5));
    }
}
