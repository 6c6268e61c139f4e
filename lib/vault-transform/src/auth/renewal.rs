use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{AuthMethod, AuthState, Backoff};
use crate::config::{Config, MAX_DURATION};
use crate::context::RequestContext;
use crate::models::SecretAuth;

/// Delay until the next renewal: `duration - buffer`, or `duration` when
/// the buffer would leave nothing.
pub fn calculate_delay_with_buffer(duration: Duration, buffer: Duration) -> Duration {
    if buffer < duration {
        duration - buffer
    } else {
        duration
    }
}

/// Background re-login driven by a timer: renews shortly before expiry and
/// backs off exponentially after failures.
pub struct RenewalLoop {
    auth: Arc<dyn AuthMethod>,
    state: Arc<AuthState>,
    token_lifetime: Duration,
    renew_buffer: Duration,
    request_timeout: Duration,
    backoff: Backoff,
    failures: u32,
}

impl RenewalLoop {
    pub fn new(auth: Arc<dyn AuthMethod>, state: Arc<AuthState>, config: &Config) -> Self {
        Self {
            auth,
            state,
            token_lifetime: config.token_lifetime,
            renew_buffer: config.token_renew_buffer,
            request_timeout: config.request_timeout,
            backoff: Backoff::new(
                config.token_error_retry_first_time,
                config.token_error_retry_max_time,
            ),
            failures: 0,
        }
    }

    /// Lease reported by vault, or the configured lifetime when it reports none.
    /// Capped at [`MAX_DURATION`].
    pub fn lease_duration(&self, auth: &SecretAuth) -> Duration {
        let lease = if auth.lease_duration == 0 {
            self.token_lifetime
        } else {
            Duration::from_secs(auth.lease_duration)
        };
        lease.min(MAX_DURATION)
    }

    /// Stores a freshly issued token and returns the delay until the next renewal.
    pub async fn apply(&mut self, auth: SecretAuth) -> Duration {
        let lease = self.lease_duration(&auth);
        self.state.set(auth.client_token, lease).await;
        self.backoff.reset();
        self.failures = 0;
        calculate_delay_with_buffer(lease, self.renew_buffer)
    }

    /// Start the loop; the first renewal fires after `first_delay`.
    pub fn spawn(self, first_delay: Duration) -> RenewalHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(first_delay, cancel.clone()));
        RenewalHandle { cancel, task }
    }

    async fn run(mut self, mut delay: Duration, cancel: CancellationToken) {
        loop {
            if sleep_or_cancel(&cancel, delay).await {
                tracing::debug!("Token renewal loop stopped");
                return;
            }
            delay = self.attempt().await;
        }
    }

    async fn attempt(&mut self) -> Duration {
        let ctx = RequestContext::new().with_timeout(self.request_timeout);
        match self.auth.login(&ctx).await {
            Ok(auth) => {
                let delay = self.apply(auth).await;
                self.state.notify_renewed();
                tracing::debug!(
                    next_renewal_ms = delay.as_millis() as u64,
                    request_id = ctx.request_id(),
                    "Token renewed"
                );
                delay
            }
            Err(e) => {
                self.failures += 1;
                let delay = self.backoff.next_delay();
                tracing::warn!(
                    error = %e,
                    reason = %e.reason(),
                    attempt = self.failures,
                    delay_ms = delay.as_millis() as u64,
                    request_id = ctx.request_id(),
                    "Token renewal failed, retrying"
                );
                delay
            }
        }
    }
}

async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = sleep(delay) => false,
    }
}

/// Owner side of a running [`RenewalLoop`].
pub struct RenewalHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RenewalHandle {
    /// Stops the timer loop. An in-flight login is allowed to finish; the
    /// cached token stays usable until it expires.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for RenewalHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
