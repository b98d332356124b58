//! Cooperative resumable tasks
//!
//! A resumable task does a bounded amount of work per invocation and
//! either finishes or names the completion signal it is waiting on.
//! `submit` drives the invocation/wait cycle on the executor; between
//! invocations the task may resume on any executor thread.

use crate::sink::CompletionSignal;
use tokio::runtime::Handle;

/// Outcome of one task invocation
pub enum TaskStatus {
    /// The task is done and will not be invoked again
    Finished,
    /// Invoke the task again once the signal completes
    ContinueOn(CompletionSignal),
}

/// A task that can suspend on a completion signal
pub trait ResumableTask: Send + 'static {
    fn process(&mut self) -> TaskStatus;
}

/// Drive a task to completion on the executor
pub fn submit<T: ResumableTask>(executor: &Handle, mut task: T) {
    executor.spawn(async move {
        loop {
            match task.process() {
                TaskStatus::Finished => break,
                TaskStatus::ContinueOn(signal) => signal.wait().await,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingTask {
        invocations: Arc<AtomicUsize>,
        gate: Option<CompletionSignal>,
    }

    impl ResumableTask for CountingTask {
        fn process(&mut self) -> TaskStatus {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            match self.gate.take() {
                Some(signal) => TaskStatus::ContinueOn(signal),
                None => TaskStatus::Finished,
            }
        }
    }

    #[tokio::test]
    async fn task_resumes_after_signal_completes() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let (signal, trigger) = CompletionSignal::pending();

        submit(
            &Handle::current(),
            CountingTask {
                invocations: Arc::clone(&invocations),
                gate: Some(signal),
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        trigger.complete();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completed_signal_resumes_immediately() {
        let invocations = Arc::new(AtomicUsize::new(0));

        submit(
            &Handle::current(),
            CountingTask {
                invocations: Arc::clone(&invocations),
                gate: Some(CompletionSignal::completed()),
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }
}
