use anyhow::Result;
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread::JoinHandle;

use super::{AlertMessage, Notifier};

const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Queue-and-forget alert delivery.
///
/// Owns a bounded channel and a worker thread that drains it into a
/// `Notifier`. `dispatch` never blocks: when the queue is full the message
/// is dropped with a warning, which keeps a stalled delivery path from
/// delaying frame processing.
pub struct AlertDispatcher {
    sender: Option<SyncSender<AlertMessage>>,
    worker: Option<JoinHandle<u64>>,
    notifier_name: &'static str,
}

impl AlertDispatcher {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self::with_queue_depth(notifier, DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_queue_depth(mut notifier: Box<dyn Notifier>, depth: usize) -> Self {
        let notifier_name = notifier.name();
        let (sender, receiver) = sync_channel::<AlertMessage>(depth.max(1));

        let worker = std::thread::spawn(move || {
            let mut delivered = 0u64;
            while let Ok(message) = receiver.recv() {
                match notifier.notify(&message) {
                    Ok(()) => {
                        delivered += 1;
                        log::info!(
                            "alert delivered via {}: {} at {:.1}s",
                            notifier.name(),
                            message.label,
                            message.event.timestamp.as_secs_f64()
                        );
                    }
                    Err(e) => {
                        // The alert stays fired; delivery is best-effort.
                        log::error!("alert delivery via {} failed: {}", notifier.name(), e);
                    }
                }
            }
            delivered
        });

        Self {
            sender: Some(sender),
            worker: Some(worker),
            notifier_name,
        }
    }

    /// Queue a message for delivery. Never blocks the caller.
    pub fn dispatch(&self, message: AlertMessage) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                log::warn!(
                    "alert queue for {} is full; dropping alert for {}",
                    self.notifier_name,
                    message.label
                );
            }
            Err(TrySendError::Disconnected(message)) => {
                log::warn!(
                    "alert worker for {} is gone; dropping alert for {}",
                    self.notifier_name,
                    message.label
                );
            }
        }
    }

    /// Drain the queue and stop the worker. Returns how many alerts were
    /// delivered.
    pub fn shutdown(mut self) -> Result<u64> {
        drop(self.sender.take());
        let delivered = match self.worker.take() {
            Some(handle) => handle.join().unwrap_or(0),
            None => 0,
        };
        Ok(delivered)
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
