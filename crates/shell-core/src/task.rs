//! Background work bound to a screen's lifetime.
//!
//! A bound task only ever sees its UI target through [`UiRef`], a weak reference
//! paired with the screen's cancellation token. Once the screen is torn down
//! (token cancelled or target dropped) every delivery becomes a no-op.

use std::{
    future::Future,
    sync::{Arc, Weak},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub struct UiRef<T: ?Sized> {
    target: Weak<T>,
    token: CancellationToken,
}

impl<T: ?Sized> Clone for UiRef<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: ?Sized> UiRef<T> {
    pub fn new(target: &Arc<T>, token: CancellationToken) -> Self {
        Self {
            target: Arc::downgrade(target),
            token,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.token.is_cancelled() || self.target.strong_count() == 0
    }

    /// The live target, or `None` after teardown.
    pub fn get(&self) -> Option<Arc<T>> {
        if self.token.is_cancelled() {
            return None;
        }
        self.target.upgrade()
    }

    /// Runs `f` against the target if it is still attached. Returns whether it ran.
    pub fn with(&self, f: impl FnOnce(&T)) -> bool {
        match self.get() {
            Some(target) => {
                f(&target);
                true
            }
            None => {
                trace!("UI target detached, dropping delivery");
                false
            }
        }
    }

    /// Drives `fut` until it completes or the screen is torn down.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Handle to a bound task. Dropping it cancels the task.
pub struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the task to wind down.
    pub async fn finished(&mut self) {
        let _ = (&mut self.join).await;
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns `work` on the current runtime with a weak, cancellable view of `target`.
pub fn spawn_bound<T, W, Fut>(target: &Arc<T>, token: CancellationToken, work: W) -> TaskHandle
where
    T: ?Sized + Send + Sync + 'static,
    W: FnOnce(UiRef<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let ui = UiRef::new(target, token.clone());
    let join = tokio::spawn(work(ui));
    TaskHandle { token, join }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[tokio::test]
    async fn test_delivers_while_attached() {
        let target = Arc::new(Counter::default());
        let mut handle = spawn_bound(&target, CancellationToken::new(), |ui| async move {
            ui.with(|c| {
                c.0.fetch_add(1, Ordering::SeqCst);
            });
        });
        handle.finished().await;
        assert_eq!(target.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_delivery_after_cancel_is_dropped() {
        let target = Arc::new(Counter::default());
        let mut handle = spawn_bound(&target, CancellationToken::new(), |ui| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ui.with(|c| {
                c.0.fetch_add(1, Ordering::SeqCst);
            });
        });
        handle.cancel();
        handle.finished().await;
        assert_eq!(target.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_target_detaches() {
        let target = Arc::new(Counter::default());
        let ui = UiRef::new(&target, CancellationToken::new());
        assert!(!ui.is_detached());
        drop(target);
        assert!(ui.is_detached());
        assert!(!ui.with(|_| {}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let target = Arc::new(Counter::default());
        let token = CancellationToken::new();
        let ui = UiRef::new(&target, token.clone());
        token.cancel();
        let out = ui
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                7
            })
            .await;
        assert_eq!(out, None);
    }
}
