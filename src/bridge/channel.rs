//! Transports for bridge messages.
//!
//! A channel is an un-addressed bus: every subscriber sees every frame,
//! including frames it posted itself.

use std::io::Write;
use std::sync::Mutex;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::error::ChannelError;

/// Frames buffered per subscriber before it starts lagging
const DEFAULT_CAPACITY: usize = 256;

pub trait MessageChannel: Send + Sync {
    /// Broadcast a frame to every subscriber
    fn post(&self, frame: Value) -> Result<(), ChannelError>;

    /// Start receiving frames posted from now on
    fn subscribe(&self) -> broadcast::Receiver<Value>;
}

/// In-process bus. Closing it ends every subscription.
pub struct BroadcastChannel {
    sender: Mutex<Option<broadcast::Sender<Value>>>,
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Drop the sender; subscribers drain what is buffered and then see
    /// the channel as closed
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map_or(true, |sender| sender.is_none())
    }

    /// Live subscriptions on the bus
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .ok()
            .and_then(|sender| sender.as_ref().map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }
}

impl MessageChannel for BroadcastChannel {
    fn post(&self, frame: Value) -> Result<(), ChannelError> {
        let sender = self.sender.lock().map_err(|_| ChannelError::Closed)?;
        let Some(sender) = sender.as_ref() else {
            return Err(ChannelError::Closed);
        };
        // Nobody listening is not an error on a broadcast bus
        let _ = sender.send(frame);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        if let Ok(sender) = self.sender.lock() {
            if let Some(sender) = sender.as_ref() {
                return sender.subscribe();
            }
        }
        let (_, receiver) = broadcast::channel(1);
        receiver
    }
}

/// Newline-delimited JSON over a byte stream pair, normally stdin/stdout.
///
/// Outbound frames are written as one JSON document per line. Inbound lines
/// are parsed and fanned out to subscribers; reaching end of input closes
/// the channel.
pub struct LineChannel {
    bus: std::sync::Arc<BroadcastChannel>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl LineChannel {
    /// Bridge over the process's stdin and stdout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stdio() -> Self {
        Self::spawn(tokio::io::stdin(), std::io::stdout())
    }

    /// Start the inbound reader task. Must be called from within a tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: Write + Send + 'static,
    {
        let bus = std::sync::Arc::new(BroadcastChannel::new());
        let inbound = bus.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Value>(line) {
                            Ok(frame) => {
                                if inbound.post(frame).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "Ignoring non-JSON input line"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read bridge input");
                        break;
                    }
                }
            }
            debug!("Bridge input ended, closing channel");
            inbound.close();
        });

        Self {
            bus,
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl MessageChannel for LineChannel {
    fn post(&self, frame: Value) -> Result<(), ChannelError> {
        let line = serde_json::to_string(&frame)?;
        let mut writer = self.writer.lock().map_err(|_| ChannelError::Closed)?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.bus.subscribe()
    }
}
