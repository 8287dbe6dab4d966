use std::error::Error;

use anyhow::anyhow;
use threaded_api::errors::{ConfigurationError, PoolError, TaskError, ThreadedError};

#[cfg(test)]
mod tests {
    use super::*;

    // Test invalid capacity error
    #[test]
    fn test_invalid_capacity_error() {
        let error = ConfigurationError::InvalidCapacity(0);

        assert_eq!(
            error.to_string(),
            "Invalid executor capacity: 0 (at least one worker is required)"
        );
        assert!(error.source().is_none());
    }

    // Test pool shutdown error
    #[test]
    fn test_pool_shutdown_error() {
        let error = PoolError::Shutdown;

        assert_eq!(error.to_string(), "Cannot schedule new work after executor shutdown");
        assert!(error.source().is_none());
    }

    // Test task errors wrapping pool and configuration errors
    #[test]
    fn test_task_error_conversions() {
        let error: TaskError = PoolError::Shutdown.into();
        assert_eq!(error, TaskError::Submit(PoolError::Shutdown));
        assert_eq!(
            error.to_string(),
            "Task submission failed: Cannot schedule new work after executor shutdown"
        );
        assert!(error.source().is_some());

        let error: TaskError = ConfigurationError::InvalidCapacity(0).into();
        assert!(matches!(error, TaskError::Configuration(ConfigurationError::InvalidCapacity(0))));
    }

    // Test task lifecycle errors
    #[test]
    fn test_task_lifecycle_errors() {
        assert_eq!(TaskError::Cancelled.to_string(), "Task was cancelled before it started");
        assert_eq!(TaskError::Abandoned.to_string(), "Task was abandoned by its executor");
        assert_eq!(
            TaskError::Panicked("boom".to_string()).to_string(),
            "Task panicked: boom"
        );
    }

    // Test umbrella error is transparent over its sources
    #[test]
    fn test_threaded_error_transparent() {
        let error: ThreadedError = TaskError::Cancelled.into();
        assert_eq!(error.to_string(), TaskError::Cancelled.to_string());

        let error: ThreadedError = ConfigurationError::InvalidCapacity(0).into();
        assert!(matches!(error, ThreadedError::Configuration(_)));

        let error: ThreadedError = PoolError::Shutdown.into();
        assert!(matches!(error, ThreadedError::Pool(PoolError::Shutdown)));
    }

    // Test thread lifecycle errors
    #[test]
    fn test_thread_errors() {
        let error = ThreadedError::AlreadyStarted("Threaded: compute".to_string());
        assert_eq!(error.to_string(), "Thread \"Threaded: compute\" was already started");

        let error = ThreadedError::NotStarted("worker".to_string());
        assert_eq!(error.to_string(), "Thread \"worker\" was never started");

        let error = ThreadedError::ThreadSpawn {
            name: "worker".to_string(),
            reason: "resource limit".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to spawn thread \"worker\": resource limit");
    }

    // Test conversion from anyhow errors
    #[test]
    fn test_other_error() {
        let error: ThreadedError = anyhow!("unexpected state").into();
        assert_eq!(error.to_string(), "Internal error: unexpected state");
    }

    // Test error propagation with the ? operator
    #[test]
    fn test_error_propagation() {
        fn configure(capacity: usize) -> Result<usize, ConfigurationError> {
            if capacity == 0 {
                return Err(ConfigurationError::InvalidCapacity(capacity));
            }
            Ok(capacity)
        }

        fn call_site(capacity: usize) -> Result<usize, ThreadedError> {
            Ok(configure(capacity)?)
        }

        assert_eq!(call_site(4).unwrap(), 4);
        assert!(matches!(
            call_site(0),
            Err(ThreadedError::Configuration(ConfigurationError::InvalidCapacity(0)))
        ));
    }
}
