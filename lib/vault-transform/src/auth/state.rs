use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

use crate::config::MAX_DURATION;

struct AuthToken {
    token: String,
    until: Instant,
}

/// Current vault token and its expiry, shared by the renewal loop and callers.
///
/// `token` and `until` live behind one lock so a reader never sees a token
/// paired with another token's expiry.
pub struct AuthState {
    current: RwLock<AuthToken>,
    renewed: Notify,
    block_time: Duration,
}

impl AuthState {
    /// Empty, already-expired state.
    pub fn new(block_time: Duration) -> Self {
        Self {
            current: RwLock::new(AuthToken {
                token: String::new(),
                until: Instant::now(),
            }),
            renewed: Notify::new(),
            block_time,
        }
    }

    pub async fn get_token(&self) -> String {
        self.current.read().await.token.clone()
    }

    pub async fn is_valid(&self) -> bool {
        Instant::now() < self.current.read().await.until
    }

    /// Stores `token` valid for `duration`, capped at [`MAX_DURATION`].
    pub async fn set(&self, token: String, duration: Duration) {
        let now = Instant::now();
        let until = now
            .checked_add(duration.min(MAX_DURATION))
            .unwrap_or(now);
        let mut current = self.current.write().await;
        current.token = token;
        current.until = until;
    }

    pub fn block_time(&self) -> Duration {
        self.block_time
    }

    /// Wakes every task currently parked in [`AuthState::await_valid_token`].
    ///
    /// Tasks that start waiting afterwards are not woken.
    pub fn notify_renewed(&self) {
        self.renewed.notify_waiters();
    }

    /// Waits up to the configured block time for a renewal.
    pub async fn await_valid_token(&self) -> bool {
        self.await_valid_token_for(self.block_time).await
    }

    /// Waits up to `limit` for a renewal; `true` if one arrived in time.
    pub async fn await_valid_token_for(&self, limit: Duration) -> bool {
        let notified = self.renewed.notified();
        tokio::pin!(notified);
        // Register before re-checking so a renewal between the caller's
        // validity check and this wait is not lost.
        notified.as_mut().enable();

        if self.is_valid().await {
            return true;
        }

        tokio::time::timeout(limit, notified).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_set_caps_huge_duration() {
        let state = AuthState::new(Duration::from_secs(1));
        state.set("hvs.forever".to_string(), Duration::MAX).await;
        assert!(state.is_valid().await);
        assert_eq!(state.get_token().await, "hvs.forever");
    }

    #[tokio::test]
    async fn test_new_state_is_invalid() {
        let state = AuthState::new(Duration::from_secs(1));
        assert!(!state.is_valid().await);
        assert_eq!(state.get_token().await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_and_expire() {
        let state = AuthState::new(Duration::from_secs(1));
        state.set("hvs.one".to_string(), Duration::from_secs(10)).await;
        assert!(state.is_valid().await);
        assert_eq!(state.get_token().await, "hvs.one");

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!state.is_valid().await);
        assert_eq!(state.get_token().await, "hvs.one");
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_times_out_after_block_time() {
        let state = AuthState::new(Duration::from_millis(250));
        let start = Instant::now();
        assert!(!state.await_valid_token().await);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_returns_immediately_when_valid() {
        let state = AuthState::new(Duration::from_secs(5));
        state.set("hvs.one".to_string(), Duration::from_secs(10)).await;
        let start = Instant::now();
        assert!(state.await_valid_token().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_renewal_wakes_all_waiters() {
        let state = Arc::new(AuthState::new(Duration::from_secs(30)));
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let woke = state.await_valid_token().await;
                    (woke, state.is_valid().await)
                })
            })
            .collect();

        // Let every waiter park.
        tokio::time::sleep(Duration::from_millis(10)).await;

        state.set("hvs.fresh".to_string(), Duration::from_secs(60)).await;
        state.notify_renewed();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), (true, true));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_waiter_is_not_woken_by_past_signal() {
        let state = AuthState::new(Duration::from_millis(100));
        state.notify_renewed();
        assert!(!state.await_valid_token().await);
    }
}
