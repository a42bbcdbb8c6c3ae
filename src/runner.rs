use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, warn};

use crate::bridge::Dispatcher;
use crate::errors::TaskError;

/// Starts blocking work on detached background threads.
///
/// Every task gets a fresh thread. Its outcome is always delivered to the UI
/// thread through the [`Dispatcher`], never returned to the caller.
pub struct TaskRunner<S> {
    dispatcher: Dispatcher<S>,
}

impl<S> Clone for TaskRunner<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<S: 'static> TaskRunner<S> {
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self { dispatcher }
    }

    /// Runs `operation` on a new thread and posts its outcome to `on_done`.
    ///
    /// A panic inside `operation` reaches `on_done` as [`TaskError::Panicked`].
    /// Returns an error only when the thread itself could not be created, in
    /// which case neither closure runs.
    pub fn run<T, E, Op, Done>(&self, name: &str, operation: Op, on_done: Done) -> io::Result<()>
    where
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        Op: FnOnce(&Dispatcher<S>) -> Result<T, E> + Send + 'static,
        Done: FnOnce(&mut S, Result<T, TaskError<E>>) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let task = name.to_string();
        thread::Builder::new()
            .name(format!("ytgrab-{name}"))
            .spawn(move || {
                debug!(%task, "background task started");
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| operation(&dispatcher))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(TaskError::Failed(err)),
                    Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
                };
                match &outcome {
                    Ok(_) => debug!(%task, "background task finished"),
                    Err(err) => warn!(%task, error = %err, "background task failed"),
                }
                dispatcher.post(move |state| on_done(state, outcome));
            })?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
