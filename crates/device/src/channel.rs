//! Paced, framed output to the typewriter.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use {
    tokio::sync::{Mutex, broadcast},
    tracing::debug,
};

use crate::{
    Result,
    format::{LINE_WIDTH, layout},
};

/// Sent before every message.
pub const START_OF_TRANSMISSION: u8 = 0x1e;
/// Sent after every message.
pub const END_OF_TRANSMISSION: u8 = 0x1f;
const CARRIAGE_RETURN: u8 = b'\r';

/// Byte sink for the device. Writes are small and complete quickly.
pub trait DeviceLink: Send {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

/// Pauses that keep output in step with the mechanical carriage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub char_delay: Duration,
    pub line_delay: Duration,
}

impl Pacing {
    /// No pauses at all, for tests and non-mechanical sinks.
    pub const NONE: Self = Self {
        char_delay: Duration::ZERO,
        line_delay: Duration::ZERO,
    };

    pub fn from_millis(char_delay_ms: u64, line_delay_ms: u64) -> Self {
        Self {
            char_delay: Duration::from_millis(char_delay_ms),
            line_delay: Duration::from_millis(line_delay_ms),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_millis(200, 1200)
    }
}

/// Serialized writer for user-visible messages.
///
/// Each message is framed by [`START_OF_TRANSMISSION`] and
/// [`END_OF_TRANSMISSION`]; no two messages interleave.
pub struct DeviceChannel {
    link: Mutex<Box<dyn DeviceLink>>,
    pacing: Pacing,
    width: usize,
}

impl DeviceChannel {
    pub fn new(link: impl DeviceLink + 'static, pacing: Pacing) -> Self {
        Self {
            link: Mutex::new(Box::new(link)),
            pacing,
            width: LINE_WIDTH,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Type `text` on the device, returning once the last byte is written.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let paragraphs = layout(text, self.width);
        let mut link = self.link.lock().await;
        debug!(paragraphs = paragraphs.len(), "typing message");

        link.write_bytes(&[START_OF_TRANSMISSION])?;
        for paragraph in &paragraphs {
            for line in paragraph {
                for byte in line.bytes() {
                    link.write_bytes(&[byte])?;
                    pause(self.pacing.char_delay).await;
                }
                link.write_bytes(&[CARRIAGE_RETURN])?;
                pause(self.pacing.line_delay).await;
            }
            link.write_bytes(&[CARRIAGE_RETURN])?;
        }
        link.write_bytes(&[END_OF_TRANSMISSION])?;
        Ok(())
    }
}

impl std::fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("pacing", &self.pacing)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ── In-memory link ──────────────────────────────────────────────────────────

/// A link that records everything written to it, for tests and dry runs.
///
/// Completed messages are decoded (carriage returns become newlines) and
/// published to subscribers as they finish.
#[derive(Clone)]
pub struct MemoryLink {
    state: Arc<StdMutex<MemoryState>>,
    finished: broadcast::Sender<String>,
}

#[derive(Default)]
struct MemoryState {
    raw: Vec<u8>,
    current: Option<Vec<u8>>,
    messages: Vec<String>,
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLink {
    pub fn new() -> Self {
        let (finished, _) = broadcast::channel(256);
        Self {
            state: Arc::new(StdMutex::new(MemoryState::default())),
            finished,
        }
    }

    /// Every byte written so far, framing included.
    pub fn raw(&self) -> Vec<u8> {
        self.lock().raw.clone()
    }

    /// Every completed message so far, decoded.
    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.clone()
    }

    /// Receive each message as it completes.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.finished.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceLink for MemoryLink {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut done = Vec::new();
        {
            let mut state = self.lock();
            state.raw.extend_from_slice(bytes);
            for &byte in bytes {
                match byte {
                    START_OF_TRANSMISSION => state.current = Some(Vec::new()),
                    END_OF_TRANSMISSION => {
                        if let Some(body) = state.current.take() {
                            let text = String::from_utf8_lossy(&body).replace('\r', "\n");
                            state.messages.push(text.clone());
                            done.push(text);
                        }
                    },
                    _ => {
                        if let Some(body) = state.current.as_mut() {
                            body.push(byte);
                        }
                    },
                }
            }
        }
        for text in done {
            let _ = self.finished.send(text);
        }
        Ok(())
    }
}
