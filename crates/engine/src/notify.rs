//! Threshold signal delivery.
//!
//! The notifier is an external collaborator: at-most-once, fire-and-forget.
//! A failed delivery is logged and swallowed; it never rolls back the stock
//! change that produced the signal.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use thiserror::Error;
use tracing::warn;

use tallerpos_ledger::StockSignal;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Receives threshold signals after committed writes.
pub trait StockNotifier: Send + Sync {
    fn notify(&self, signal: &StockSignal) -> Result<(), NotifyError>;
}

impl<N> StockNotifier for Arc<N>
where
    N: StockNotifier + ?Sized,
{
    fn notify(&self, signal: &StockSignal) -> Result<(), NotifyError> {
        (**self).notify(signal)
    }
}

/// Discards every signal.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl StockNotifier for NullNotifier {
    fn notify(&self, _signal: &StockSignal) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Collects signals in memory (tests/dev).
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    signals: Mutex<Vec<StockSignal>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<StockSignal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<StockSignal> {
        self.signals
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }
}

impl StockNotifier for RecordingNotifier {
    fn notify(&self, signal: &StockSignal) -> Result<(), NotifyError> {
        self.signals
            .lock()
            .map_err(|_| NotifyError("recorder lock poisoned".to_string()))?
            .push(signal.clone());
        Ok(())
    }
}

/// Decouples delivery from the write path with a worker thread, so a slow
/// downstream (chat hub, mailer) cannot block the caller.
#[derive(Debug)]
pub struct ChannelNotifier {
    tx: Option<mpsc::Sender<StockSignal>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ChannelNotifier {
    /// Spawn a worker draining signals into `inner`. Delivery failures are
    /// logged by the worker.
    pub fn spawn<N>(inner: N) -> Self
    where
        N: StockNotifier + 'static,
    {
        let (tx, rx) = mpsc::channel::<StockSignal>();
        let worker = thread::spawn(move || {
            while let Ok(signal) = rx.recv() {
                if let Err(e) = inner.notify(&signal) {
                    warn!(error = %e, product = %signal.product().id, "threshold signal delivery failed");
                }
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }
}

impl StockNotifier for ChannelNotifier {
    fn notify(&self, signal: &StockSignal) -> Result<(), NotifyError> {
        match &self.tx {
            Some(tx) => tx
                .send(signal.clone())
                .map_err(|_| NotifyError("delivery channel closed".to_string())),
            None => Err(NotifyError("notifier shut down".to_string())),
        }
    }
}

impl Drop for ChannelNotifier {
    fn drop(&mut self) {
        // Close the channel first so the worker drains and exits.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
