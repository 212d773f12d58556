//! Error taxonomy for the telemetry pipeline

use thiserror::Error;

/// A sampler failed to produce a snapshot.
///
/// Recoverable variants are reported out-of-band by the worker and the loop
/// keeps going. [`SampleError::SourceGone`] ends the worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("metrics source unavailable: {0}")]
    Unavailable(String),

    #[error("metrics source is gone: {0}")]
    SourceGone(String),

    #[error("no process found matching '{0}'")]
    NoSuchProcess(String),

    #[error("several processes are named '{name}' (PIDs: {pids}); specify a PID")]
    AmbiguousProcess { name: String, pids: String },
}

impl SampleError {
    /// Whether the worker should stop after reporting this error
    pub fn is_terminal(&self) -> bool {
        matches!(self, SampleError::SourceGone(_))
    }
}

/// Lifecycle and delivery errors surfaced to the consumer side.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("{0} monitor is already running")]
    AlreadyRunning(String),

    #[error("{0} monitor is not running")]
    NotRunning(String),

    #[error("{0} monitor needs a sampling period above zero")]
    ZeroPeriod(String),

    #[error("render callback '{callback}' failed: {message}")]
    RenderCallback { callback: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_gone_is_terminal() {
        assert!(SampleError::SourceGone("pid 42".into()).is_terminal());
        assert!(!SampleError::Unavailable("no cpus".into()).is_terminal());
        assert!(!SampleError::NoSuchProcess("foo".into()).is_terminal());
    }

    #[test]
    fn test_monitor_error_messages() {
        let err = MonitorError::AlreadyRunning("cpu".into());
        assert_eq!(err.to_string(), "cpu monitor is already running");

        let err: MonitorError = SampleError::Unavailable("no cpus".into()).into();
        assert_eq!(err.to_string(), "metrics source unavailable: no cpus");
    }
}
