//! Spawned per-call workers.

use {std::future::Future, tokio::task::JoinHandle};

/// Owns a spawned task and aborts it when dropped, so a worker never outlives
/// the call (or session) that started it.
#[derive(Debug)]
pub(crate) struct WorkerHandle(JoinHandle<()>);

impl WorkerHandle {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration, tokio::sync::oneshot};

    #[tokio::test]
    async fn test_drop_aborts_worker() {
        let (dropped_tx, dropped_rx) = oneshot::channel::<()>();
        let handle = WorkerHandle::spawn(async move {
            let _dropped = dropped_tx;
            std::future::pending::<()>().await;
        });
        drop(handle);
        // The sender is dropped once the aborted task is torn down.
        assert!(tokio::time::timeout(Duration::from_secs(1), dropped_rx)
            .await
            .unwrap()
            .is_err());
    }
}
