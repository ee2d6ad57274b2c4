//! Unbounded single-consumer FIFO between the listener and the session engine.

use tokio::{
    sync::{Mutex, mpsc},
    time::Instant,
};

use crate::frame::InputFrame;

/// Returned by [`InputQueue::get`] when the deadline passes with no frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no input before the deadline")]
pub struct TimedOut;

/// Producer handle given to the listener. Never blocks.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<InputFrame>,
}

impl FrameSender {
    /// Queue a frame. Returns `false` once the queue itself has been dropped.
    pub fn put(&self, frame: InputFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// The shared input queue.
///
/// Any number of producers may [`put`](Self::put); exactly one consumer at a
/// time may wait in [`get`](Self::get), enforced by the receiver lock.
#[derive(Debug)]
pub struct InputQueue {
    tx: mpsc::UnboundedSender<InputFrame>,
    rx: Mutex<mpsc::UnboundedReceiver<InputFrame>>,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn sender(&self) -> FrameSender {
        FrameSender {
            tx: self.tx.clone(),
        }
    }

    pub fn put(&self, frame: InputFrame) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.tx.send(frame);
    }

    /// Wait for the next frame until `deadline`.
    pub async fn get(&self, deadline: Instant) -> Result<InputFrame, TimedOut> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(frame)) => Ok(frame),
            // `self` holds a sender, so the channel never closes while we wait.
            Ok(None) | Err(_) => Err(TimedOut),
        }
    }

    /// Wait for the next frame with no deadline.
    pub async fn recv(&self) -> InputFrame {
        let mut rx = self.rx.lock().await;
        loop {
            if let Some(frame) = rx.recv().await {
                return frame;
            }
        }
    }

    /// Take one frame if one is queued and no consumer is waiting.
    pub fn get_nowait(&self) -> Option<InputFrame> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Drop every frame queued so far. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "discarded stale input");
        }
        dropped
    }
}
