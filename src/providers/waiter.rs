//! Bounded existence polling with explicit timeout and cancellation.

use crate::errors::{Presence, ProviderError, ProviderResult};
use std::{future::Future, time::Duration};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long, and how often, to wait for a bucket to (dis)appear.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub cancel: CancellationToken,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Poll `probe` until it reports the expected presence.
///
/// Probe errors abort the wait immediately. The deadline is checked after
/// every probe, so at least one probe always runs.
pub async fn wait_for_presence<F, Fut>(
    policy: &WaitPolicy,
    expected: Presence,
    mut probe: F,
) -> ProviderResult<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ProviderResult<bool>> + Send,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempts = 0u32;

    loop {
        if policy.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        attempts += 1;
        if probe().await? == expected.exists() {
            debug!(attempts, %expected, "existence confirmed");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ProviderError::Timeout(policy.timeout));
        }

        let pause = policy.interval.min(deadline - now);
        tokio::select! {
            _ = policy.cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = sleep(pause) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn counting_probe(
        calls: Arc<AtomicU32>,
        present_after: u32,
    ) -> impl FnMut() -> std::future::Ready<ProviderResult<bool>> + Send {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(n >= present_after))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_probe_matches() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = WaitPolicy::new(Duration::from_secs(60), Duration::from_secs(5));

        wait_for_presence(&policy, Presence::Present, counting_probe(calls.clone(), 3))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_state_never_matches() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = WaitPolicy::new(Duration::from_secs(12), Duration::from_secs(5));

        let err = wait_for_presence(&policy, Presence::Absent, counting_probe(calls.clone(), 1))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout(t) if t == Duration::from_secs(12)));
        // t=0, t=5, t=10, t=12
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() {
        let policy = WaitPolicy::new(Duration::from_secs(600), Duration::from_secs(5));
        let cancel = policy.cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(7)).await;
            cancel.cancel();
        });

        let err = wait_for_presence(&policy, Presence::Present, || std::future::ready(Ok(false)))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn probe_errors_abort_immediately() {
        let policy = WaitPolicy::default();
        let err = wait_for_presence(&policy, Presence::Present, || {
            std::future::ready(Err(ProviderError::Api("AccessDenied".into())))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Api(msg) if msg == "AccessDenied"));
    }
}
