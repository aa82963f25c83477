//! One-shot downgrade from TLS to plaintext.

use {
    crate::{descriptor::EndpointDescriptor, error::Result, logging::Logger},
    std::future::Future,
};

/// Decides whether a failed TLS attempt may be repeated without TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureFallbackPolicy {
    secured: bool,
    insecure_fallback_allowed: bool,
}

impl SecureFallbackPolicy {
    pub fn for_endpoint(descriptor: &EndpointDescriptor) -> Self {
        Self {
            secured: descriptor.secured(),
            insecure_fallback_allowed: descriptor.insecure_fallback_allowed(),
        }
    }

    /// Run `op` in the endpoint's security mode.  A connection failure in TLS
    /// mode is retried once in plaintext when the endpoint allows it; the
    /// retry's outcome is returned as-is.
    pub async fn run<T, F, Fut>(&self, logger: &Logger, mut op: F) -> Result<T>
    where
        F: FnMut(bool) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op(self.secured).await {
            Err(err) if self.allows_downgrade() && err.is_connection_failure() => {
                logger.warn(format_args!(
                    "secured connection failed ({err}), retrying without TLS"
                ));
                op(false).await
            }
            outcome => outcome,
        }
    }

    fn allows_downgrade(&self) -> bool {
        self.secured && self.insecure_fallback_allowed
    }
}
