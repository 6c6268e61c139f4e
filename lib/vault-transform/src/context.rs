use std::time::{Duration, Instant};

use crate::error::VaultError;

/// Per-call request metadata: correlation id and an optional deadline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Deadline `timeout` from now. A timeout too large to represent leaves the context unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Remaining time for the next step, failing if the deadline has passed.
    pub(crate) fn budget(&self, step: &'static str) -> Result<Option<Duration>, VaultError> {
        match self.remaining() {
            Some(left) if left.is_zero() => Err(VaultError::DeadlineExceeded(step)),
            other => Ok(other),
        }
    }

    /// Caps `limit` by the remaining deadline.
    pub(crate) fn bounded(&self, limit: Duration) -> Duration {
        self.remaining().map_or(limit, |left| left.min(limit))
    }
}
