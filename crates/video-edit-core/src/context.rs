//! Execution context passed to the pipeline executor

use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where and under which limits one executor run happens
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Task identifier, for logging
    pub task_id: String,

    /// Directory for per-step intermediate files
    pub work_dir: PathBuf,

    /// Final output; the last step writes here directly
    pub output_path: PathBuf,

    /// Shared with the task record; polled between operations
    pub cancel: CancellationToken,

    /// Checked between operations; `None` disables the limit
    pub deadline: Option<Instant>,
}

impl ExecutionContext {
    pub fn new(task_id: impl Into<String>, work_dir: PathBuf, output_path: PathBuf) -> Self {
        Self {
            task_id: task_id.into(),
            work_dir,
            output_path,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the deadline to `timeout` from now
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    #[must_use]
    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::new("t1", PathBuf::from("/tmp/w"), PathBuf::from("/tmp/o.mp4"))
            .with_cancel(token.clone());
        assert!(!ctx.cancel.is_cancelled());
        token.cancel();
        assert!(ctx.cancel.is_cancelled());
        // Cancelling a clone of the context's token reaches the original
        ctx.clone().cancel.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = ExecutionContext::new("t1", PathBuf::from("/tmp/w"), PathBuf::from("/tmp/o.mp4"));
        assert!(!ctx.deadline_passed());
        let ctx = ctx.with_timeout(Duration::ZERO);
        assert!(ctx.deadline_passed());
    }
}
