//! Asynchronous command/response channel over a shared byte stream.
//!
//! One read loop owns the inbound side and demultiplexes frames: replies go to
//! the oldest pending request with the same address and command class, Event
//! messages and unmatched replies go to the event stream. Outbound writes are
//! serialized so partial frames never interleave. Checksum-invalid frames are
//! dropped without resolving anything; a transport error fails every pending
//! request and the channel stays closed.

use crate::message::{HarpMessage, MessageError, MessageType};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport failure. Fatal: the channel is unusable afterwards.
    #[error("transport: {0}")]
    Transport(#[from] io::Error),
    /// No matching reply within the configured duration. Recoverable; the
    /// request is not retried automatically.
    #[error("request timed out")]
    TimedOut,
    /// The channel was closed before the request could complete.
    #[error("channel closed")]
    Closed,
    /// The device answered with an error reply.
    #[error("device rejected the command for register {address}")]
    ErrorReply { address: u8 },
    #[error("unexpected device identity: expected {expected}, got {actual}")]
    UnexpectedDeviceIdentity { expected: u16, actual: u16 },
    #[error("aggregate register layout mismatch: {0}")]
    WrongLayout(&'static str),
    #[error("no register at address {0}")]
    UnknownRegister(u8),
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Per-channel tuning. Only the reply timeout so far.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            timeout: Duration::from_secs(1),
        }
    }
}

type ReplySender = oneshot::Sender<Result<HarpMessage, ChannelError>>;

struct PendingSlot {
    id: u64,
    message_type: MessageType,
    tx: ReplySender,
}

#[derive(Default)]
struct PendingMap {
    next_id: u64,
    slots: HashMap<u8, VecDeque<PendingSlot>>,
    /// Set when the read loop dies; (kind, description) of the fatal error.
    dead: Option<(io::ErrorKind, String)>,
}

impl PendingMap {
    fn dead_error(&self) -> Option<ChannelError> {
        self.dead
            .as_ref()
            .map(|(kind, msg)| ChannelError::Transport(io::Error::new(*kind, msg.clone())))
    }
}

/// Stream of Event-type messages and unmatched inbound replies.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<HarpMessage>,
}

impl EventStream {
    /// Next inbound event; `None` once the channel's read loop has stopped.
    pub async fn recv(&mut self) -> Option<HarpMessage> {
        self.rx.recv().await
    }
}

/// Command/response channel over an externally supplied byte stream.
///
/// Cloneable-by-reference through `&self`: concurrent commands to different
/// addresses interleave freely at request-boundary granularity.
pub struct Channel {
    pending: Arc<Mutex<PendingMap>>,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    config: ChannelConfig,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Take ownership of the transport, spawn the read loop, and return the
    /// channel plus the event stream fed by it.
    pub fn open<T>(io: T, config: ChannelConfig) -> (Channel, EventStream)
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<PendingMap>> = Arc::default();
        tokio::spawn(read_loop(Box::new(reader), pending.clone(), event_tx));
        (
            Channel {
                pending,
                writer: tokio::sync::Mutex::new(Box::new(writer)),
                config,
            },
            EventStream { rx: event_rx },
        )
    }

    /// Send a request and await its matching reply.
    ///
    /// The pending slot is withdrawn on timeout and on cancellation (dropping
    /// the future), so a late reply can never resolve this request; it is
    /// routed to the event stream as unmatched instead.
    pub async fn command(&self, request: HarpMessage) -> Result<HarpMessage, ChannelError> {
        let bytes = request.to_bytes()?;
        let address = request.address;

        let (tx, rx) = oneshot::channel();
        let id = {
            let mut pending = self.pending.lock().expect("pending lock");
            if let Some(err) = pending.dead_error() {
                return Err(err);
            }
            pending.next_id += 1;
            let id = pending.next_id;
            pending.slots.entry(address).or_default().push_back(PendingSlot {
                id,
                message_type: request.message_type,
                tx,
            });
            id
        };
        let mut guard = SlotGuard {
            pending: &self.pending,
            address,
            id,
            armed: true,
        };

        {
            let mut writer = self.writer.lock().await;
            writer.write_all(&bytes).await?;
            writer.flush().await?;
        }
        trace!(address, message_type = ?request.message_type, "request sent");

        match tokio::time::timeout(self.config.timeout, rx).await {
            Err(_) => {
                debug!(address, "request timed out");
                Err(ChannelError::TimedOut)
            }
            Ok(Err(_)) => {
                // Reader dropped the slot without answering: channel died.
                guard.armed = false;
                let pending = self.pending.lock().expect("pending lock");
                Err(pending.dead_error().unwrap_or(ChannelError::Closed))
            }
            Ok(Ok(result)) => {
                guard.armed = false;
                let reply = result?;
                if reply.is_error {
                    return Err(ChannelError::ErrorReply { address });
                }
                Ok(reply)
            }
        }
    }
}

/// Withdraws the pending slot unless the reply (or a reader-side failure)
/// already consumed it.
struct SlotGuard<'a> {
    pending: &'a Mutex<PendingMap>,
    address: u8,
    id: u64,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut pending = self.pending.lock().expect("pending lock");
        if let Some(queue) = pending.slots.get_mut(&self.address) {
            queue.retain(|slot| slot.id != self.id);
        }
    }
}

async fn read_loop(
    mut reader: Box<dyn AsyncRead + Send + Unpin>,
    pending: Arc<Mutex<PendingMap>>,
    events: mpsc::UnboundedSender<HarpMessage>,
) {
    let error = loop {
        let mut header = [0u8; 2];
        if let Err(e) = reader.read_exact(&mut header).await {
            break e;
        }
        let mut frame = vec![0u8; 2 + header[1] as usize];
        frame[..2].copy_from_slice(&header);
        if let Err(e) = reader.read_exact(&mut frame[2..]).await {
            break e;
        }
        match HarpMessage::from_bytes(&frame) {
            Ok(message) => dispatch(&pending, &events, message),
            Err(MessageError::ChecksumMismatch { expected, actual }) => {
                // Dropped silently: the pending request keeps waiting for a
                // well-formed reply or times out.
                warn!(expected, actual, "dropping frame with bad checksum");
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
            }
        }
    };

    debug!(error = %error, "read loop stopped, failing all pending requests");
    let mut pending = pending.lock().expect("pending lock");
    pending.dead = Some((error.kind(), error.to_string()));
    for (_, queue) in pending.slots.drain() {
        for slot in queue {
            let failure = io::Error::new(error.kind(), error.to_string());
            let _ = slot.tx.send(Err(ChannelError::Transport(failure)));
        }
    }
}

/// Route one inbound message: replies to the oldest compatible pending
/// request, everything else to the event stream.
fn dispatch(
    pending: &Mutex<PendingMap>,
    events: &mpsc::UnboundedSender<HarpMessage>,
    message: HarpMessage,
) {
    if message.message_type == MessageType::Event {
        let _ = events.send(message);
        return;
    }

    let slot = {
        let mut pending = pending.lock().expect("pending lock");
        take_matching_slot(&mut pending, &message)
    };
    match slot {
        Some(slot) => {
            trace!(address = message.address, "reply matched pending request");
            // A cancelled caller may have raced slot removal; the reply is
            // then discarded, same as unmatched.
            let _ = slot.tx.send(Ok(message));
        }
        None => {
            trace!(address = message.address, "unmatched reply, forwarding to event path");
            let _ = events.send(message);
        }
    }
}

fn take_matching_slot(pending: &mut PendingMap, message: &HarpMessage) -> Option<PendingSlot> {
    let queue = pending.slots.get_mut(&message.address)?;
    // Oldest first; skip slots whose caller already went away.
    while let Some(slot) = queue.front() {
        if slot.tx.is_closed() {
            queue.pop_front();
            continue;
        }
        if slot.message_type != message.message_type {
            return None;
        }
        return queue.pop_front();
    }
    None
}
