//! A `TimerService` backed by a Tokio runtime handle (§4.6 Sleeping state,
//! §4.8 write aggregator nap interval). Cancellation is a flag checked right
//! before the callback would fire; it cannot interrupt a callback already
//! running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tablestore_api::{TimerHandle, TimerService};

pub struct TokioTimerService {
    handle: tokio::runtime::Handle,
}

impl TokioTimerService {
    /// Binds to the handle of the runtime this is constructed from; panics
    /// (per `tokio::runtime::Handle::current`) outside a Tokio context.
    pub fn current() -> Self {
        TokioTimerService { handle: tokio::runtime::Handle::current() }
    }

    pub fn new(handle: tokio::runtime::Handle) -> Self {
        TokioTimerService { handle }
    }
}

struct TokioTimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle for TokioTimerHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl TimerService for TokioTimerService {
    fn after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> Box<dyn TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_for_task = cancelled.clone();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !cancelled_for_task.load(Ordering::SeqCst) {
                callback();
            }
        });
        Box::new(TokioTimerHandle { cancelled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[tokio::test]
    async fn fires_callback_after_delay() {
        let timer = TokioTimerService::current();
        let (tx, rx) = mpsc::channel();
        let _handle = timer.after(Duration::from_millis(5), Box::new(move || {
            let _ = tx.send(());
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn cancel_before_fire_suppresses_callback() {
        let timer = TokioTimerService::current();
        let (tx, rx) = mpsc::channel();
        let handle = timer.after(Duration::from_millis(20), Box::new(move || {
            let _ = tx.send(());
        }));
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
