//! Outbound pacing for channel publishes.
//!
//! Wraps any [`Publisher`] with a fixed minimum gap between consecutive
//! sends, to stay under the transport's rate limits.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tidings_core::publish::PacedPublisher;
//!
//! # use tidings_core::traits::Publisher;
//! # use tidings_core::models::OutboundMessage;
//! # struct MyPublisher;
//! # impl Publisher for MyPublisher {
//! #     async fn publish(&self, _: &OutboundMessage) -> Result<(), tidings_core::AppError> {
//! #         todo!()
//! #     }
//! # }
//! let publisher = PacedPublisher::new(MyPublisher, Duration::from_secs(1));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::models::OutboundMessage;
use crate::traits::Publisher;

/// Default gap between two sends.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// A [`Publisher`] wrapper that waits `pacing` between consecutive sends.
///
/// The wait happens inline, before the send, so sends stay serialized and
/// in order. The gap is measured from the previous attempt whether it
/// succeeded or not: a failed send still counts against the rate limit.
#[derive(Clone)]
pub struct PacedPublisher<P> {
    inner: P,
    pacing: Duration,
    last_send: Arc<Mutex<Option<Instant>>>,
}

impl<P: Publisher> PacedPublisher<P> {
    pub fn new(inner: P, pacing: Duration) -> Self {
        Self {
            inner,
            pacing,
            last_send: Arc::new(Mutex::new(None)),
        }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Publisher> Publisher for PacedPublisher<P> {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), AppError> {
        // Held across the send so concurrent callers cannot interleave.
        let mut last = self.last_send.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.pacing {
                let wait = self.pacing - elapsed;
                tracing::debug!(wait_ms = %wait.as_millis(), "Pacing publish");
                tokio::time::sleep(wait).await;
            }
        }

        let result = self.inner.publish(message).await;
        *last = Some(Instant::now());
        result
    }
}
