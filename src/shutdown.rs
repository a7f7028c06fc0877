//! Process-wide shutdown sequencing.
//!
//! Subsystems register cleanup actions as they start (listener close,
//! session sweep, caller extras). The first shutdown signal takes a
//! one-shot guard and runs every cleanup concurrently with settle-all
//! semantics: a failing cleanup is logged and does not block the others.
//! Later signals while a shutdown is in flight are ignored.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;

type CleanupFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type CleanupFn = Box<dyn FnOnce() -> CleanupFuture + Send>;

#[derive(Default)]
pub struct ShutdownCoordinator {
    cleanups: Mutex<Vec<(String, CleanupFn)>>,
    triggered: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cleanup action. Registration order is preserved for
    /// logging; execution is concurrent.
    pub fn register<F, Fut>(&self, label: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cleanups
            .lock()
            .expect("cleanup lock poisoned")
            .push((label.into(), Box::new(move || Box::pin(cleanup()))));
    }

    /// Run the shutdown sequence once. Returns the exit code to use, or
    /// `None` when a shutdown is already in flight and this call should do
    /// nothing.
    pub async fn trigger(&self, code: i32) -> Option<i32> {
        if self.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown already in flight, ignoring signal");
            return None;
        }

        tracing::info!(exit_code = code, "shutting down");
        let cleanups: Vec<(String, CleanupFn)> =
            std::mem::take(&mut *self.cleanups.lock().expect("cleanup lock poisoned"));

        join_all(cleanups.into_iter().map(|(label, cleanup)| async move {
            if let Err(error) = cleanup().await {
                tracing::error!(cleanup = %label, error = %error, "cleanup failed");
            } else {
                tracing::debug!(cleanup = %label, "cleanup complete");
            }
        }))
        .await;

        tracing::info!("shutdown complete");
        Some(code)
    }

    /// Wire SIGINT/SIGTERM to the coordinator. The task that wins the
    /// one-shot guard exits the process after cleanups settle.
    pub fn install_signal_handlers(self: Arc<Self>) {
        let on_interrupt = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received interrupt");
                if let Some(exit_code) = on_interrupt.trigger(0).await {
                    std::process::exit(exit_code);
                }
            }
        });

        #[cfg(unix)]
        {
            let on_terminate = self;
            tokio::spawn(async move {
                let mut terminate = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(signal) => signal,
                    Err(error) => {
                        tracing::error!(error = %error, "failed to install SIGTERM handler");
                        return;
                    }
                };
                if terminate.recv().await.is_some() {
                    tracing::info!("received terminate");
                    if let Some(exit_code) = on_terminate.trigger(0).await {
                        std::process::exit(exit_code);
                    }
                }
            });
        }
    }
}
