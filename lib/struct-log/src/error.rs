use thiserror::Error;

/// Errors that can occur during logger setup
#[derive(Debug, Error)]
pub enum SetupError {
    /// LogTracer already initialized (log -> tracing bridge)
    #[error("log tracer already initialized")]
    LogTracerAlreadyInitialized,
    /// Global subscriber already set
    #[error("global tracing subscriber already set")]
    SubscriberAlreadySet,
}
