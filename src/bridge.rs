//! Hands work from background threads to the UI thread.
//!
//! Background code never touches UI state directly. It posts a closure through
//! a [`Dispatcher`]; the UI loop owns the matching [`DispatchQueue`] and drains
//! it once per frame, running each closure against its state in posting order.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

pub type UiCallback<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Sending half. Cheap to clone and safe to use from any thread.
pub struct Dispatcher<S> {
    tx: UnboundedSender<UiCallback<S>>,
    waker: Option<Waker>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }
}

/// Receiving half, owned by the UI loop.
pub struct DispatchQueue<S> {
    rx: UnboundedReceiver<UiCallback<S>>,
}

pub fn channel<S: 'static>() -> (Dispatcher<S>, DispatchQueue<S>) {
    let (tx, rx) = unbounded_channel();
    (Dispatcher { tx, waker: None }, DispatchQueue { rx })
}

impl<S: 'static> Dispatcher<S> {
    /// Called after every post, e.g. to request a repaint of an idle window.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    /// Queues `callback` for the next drain. Never runs it inline.
    pub fn post(&self, callback: impl FnOnce(&mut S) + Send + 'static) {
        if self.tx.send(Box::new(callback)).is_err() {
            trace!("UI loop has shut down, dropping callback");
            return;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }
}

impl<S> DispatchQueue<S> {
    /// Runs every callback queued before this call, oldest first.
    ///
    /// Callbacks posted while draining wait for the next drain.
    pub fn drain(&mut self, state: &mut S) -> usize {
        let mut batch = Vec::new();
        while let Ok(callback) = self.rx.try_recv() {
            batch.push(callback);
        }
        let count = batch.len();
        for callback in batch {
            callback(state);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn delivers_in_posting_order_without_drops() {
        let (dispatcher, mut queue) = channel::<Vec<u32>>();
        let worker = thread::spawn(move || {
            for i in 0..1_000 {
                dispatcher.post(move |seen| seen.push(i));
            }
        });
        worker.join().unwrap();

        let mut seen = Vec::new();
        assert_eq!(queue.drain(&mut seen), 1_000);
        assert_eq!(seen, (0..1_000).collect::<Vec<_>>());
    }

    #[test]
    fn posting_never_runs_inline() {
        let (dispatcher, mut queue) = channel::<Vec<&'static str>>();
        let mut log = Vec::new();
        dispatcher.post(|log| log.push("posted"));
        assert!(log.is_empty());
        queue.drain(&mut log);
        assert_eq!(log, vec!["posted"]);
    }

    #[test]
    fn callbacks_posted_during_drain_wait_for_next_drain() {
        let (dispatcher, mut queue) = channel::<Vec<&'static str>>();
        let inner = dispatcher.clone();
        dispatcher.post(move |log| {
            log.push("outer");
            inner.post(|log| log.push("inner"));
        });

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 1);
        assert_eq!(log, vec!["outer"]);
        assert_eq!(queue.drain(&mut log), 1);
        assert_eq!(log, vec!["outer", "inner"]);
    }

    #[test]
    fn waker_fires_on_every_post() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let (dispatcher, _queue) = channel::<()>();
        let dispatcher = dispatcher.with_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        dispatcher.post(|_| {});
        dispatcher.clone().post(|_| {});
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn posting_after_ui_shutdown_is_harmless() {
        let (dispatcher, queue) = channel::<()>();
        drop(queue);
        dispatcher.post(|_| panic!("must not run"));
    }
}
