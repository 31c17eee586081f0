//! Buffer finalization.
//!
//! Every buffer slot is reserved synchronously with its byte length, then its
//! payload is turned into a base64 data URI by a [`BufferEncoder`]. Encoders
//! either finish on the spot ([`InlineEncoder`]) or hand back a receiver that
//! is filled on a later scheduling turn ([`DeferredEncoder`]). The
//! [`BufferFinalizer`] lands results into their slots in whatever order they
//! arrive and counts them; the document is fully loaded once that count equals
//! the number of slots ever reserved.

use crate::error::{GltfError, Result};
use crate::schema::Buffer;

use base64::{engine::general_purpose::STANDARD, Engine};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Prefix of every embedded buffer URI.
pub const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";

/// Outcome of submitting a payload to an encoder.
#[derive(Debug)]
pub enum Encoding {
    /// Base64 text available immediately.
    Ready(String),
    /// Base64 text delivered later through the channel.
    Deferred(oneshot::Receiver<String>),
}

/// Binary-to-base64 encode operation, implemented once per host.
pub trait BufferEncoder: Send {
    /// Encode `payload` as standard base64 without the data URI prefix.
    fn encode(&self, payload: Vec<u8>) -> Encoding;
}

/// Encodes in-process before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineEncoder;

impl BufferEncoder for InlineEncoder {
    fn encode(&self, payload: Vec<u8>) -> Encoding {
        Encoding::Ready(STANDARD.encode(payload))
    }
}

/// Encodes on a tokio runtime, one scheduling turn after submission.
#[derive(Debug, Clone)]
pub struct DeferredEncoder {
    handle: Handle,
}

impl DeferredEncoder {
    /// Create an encoder that spawns onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create an encoder for the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl BufferEncoder for DeferredEncoder {
    fn encode(&self, payload: Vec<u8>) -> Encoding {
        let (sender, receiver) = oneshot::channel();
        self.handle.spawn(async move {
            tokio::task::yield_now().await;
            // The document may have been dropped; nothing is waiting then.
            let _ = sender.send(STANDARD.encode(&payload));
        });
        Encoding::Deferred(receiver)
    }
}

/// Pick the encoder the current host supports: deferred inside a tokio
/// runtime, inline otherwise.
pub fn host_encoder() -> Box<dyn BufferEncoder> {
    match DeferredEncoder::current() {
        Some(encoder) => Box::new(encoder),
        None => Box::new(InlineEncoder),
    }
}

struct PendingBuffer {
    slot: usize,
    receiver: oneshot::Receiver<String>,
}

/// Tracks outstanding buffer encodes and the completed-buffer counter.
pub struct BufferFinalizer {
    encoder: Box<dyn BufferEncoder>,
    pending: Vec<PendingBuffer>,
    completed: usize,
}

impl BufferFinalizer {
    /// Create a finalizer with nothing reserved yet.
    pub fn new(encoder: Box<dyn BufferEncoder>) -> Self {
        Self::with_completed(encoder, 0)
    }

    /// Create a finalizer for a pool whose first `completed` buffers already
    /// carry their payload.
    pub fn with_completed(encoder: Box<dyn BufferEncoder>, completed: usize) -> Self {
        Self {
            encoder,
            pending: Vec::new(),
            completed,
        }
    }

    /// Replace the encoder used for future reservations.
    pub fn set_encoder(&mut self, encoder: Box<dyn BufferEncoder>) {
        self.encoder = encoder;
    }

    /// Number of buffers whose payload has landed.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Number of buffers still waiting on their encoder.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Reserve a slot for `payload` and start encoding it.
    ///
    /// The slot index is assigned before this returns; the URI is filled in
    /// now or on a later [`poll`](Self::poll).
    pub fn reserve(&mut self, buffers: &mut Vec<Buffer>, payload: Vec<u8>) -> usize {
        let slot = buffers.len();
        buffers.push(Buffer {
            byte_length: payload.len(),
            uri: None,
        });
        tracing::debug!(slot, byte_length = payload.len(), "reserved buffer slot");

        match self.encoder.encode(payload) {
            Encoding::Ready(text) => self.land(buffers, slot, text),
            Encoding::Deferred(receiver) => self.pending.push(PendingBuffer { slot, receiver }),
        }
        slot
    }

    /// Land every deferred result that is already available.
    ///
    /// Returns how many buffers landed during this call.
    pub fn poll(&mut self, buffers: &mut [Buffer]) -> Result<usize> {
        let mut landed = 0;
        let mut index = 0;
        while index < self.pending.len() {
            match self.pending[index].receiver.try_recv() {
                Ok(text) => {
                    let pending = self.pending.swap_remove(index);
                    self.land(buffers, pending.slot, text);
                    landed += 1;
                }
                Err(TryRecvError::Empty) => index += 1,
                Err(TryRecvError::Closed) => {
                    let slot = self.pending[index].slot;
                    tracing::warn!(slot, "buffer encode dropped without a result");
                    return Err(GltfError::EncodeAborted { slot });
                }
            }
        }
        Ok(landed)
    }

    /// Wait until every reserved slot has landed.
    ///
    /// The slot total is re-read on every wakeup. A stalled encoder keeps
    /// this pending forever.
    pub async fn wait_all(&mut self, buffers: &mut [Buffer]) -> Result<()> {
        loop {
            self.poll(buffers)?;
            if self.completed == buffers.len() {
                return Ok(());
            }

            let Some(next) = self.pending.first_mut() else {
                return Err(GltfError::invalid(format!(
                    "{} of {} buffers landed and none are outstanding",
                    self.completed,
                    buffers.len()
                )));
            };
            let slot = next.slot;
            let text = (&mut next.receiver)
                .await
                .map_err(|_| GltfError::EncodeAborted { slot })?;
            self.pending.remove(0);
            self.land(buffers, slot, text);
        }
    }

    fn land(&mut self, buffers: &mut [Buffer], slot: usize, text: String) {
        buffers[slot].uri = Some(format!("{DATA_URI_PREFIX}{text}"));
        self.completed += 1;
        tracing::debug!(slot, completed = self.completed, "buffer landed");

        if self.completed == buffers.len() {
            tracing::info!(buffers = self.completed, "all buffers loaded");
        }
    }
}

impl std::fmt::Debug for BufferFinalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFinalizer")
            .field("pending", &self.pending.len())
            .field("completed", &self.completed)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Encoder whose results are released by the test, in any order.
    #[derive(Clone, Default)]
    pub(crate) struct ManualEncoder {
        senders: Arc<Mutex<Vec<(Vec<u8>, oneshot::Sender<String>)>>>,
    }

    impl ManualEncoder {
        /// Take the outstanding requests in submission order.
        pub(crate) fn take(&self) -> Vec<(Vec<u8>, oneshot::Sender<String>)> {
            std::mem::take(&mut *self.senders.lock().unwrap())
        }
    }

    impl BufferEncoder for ManualEncoder {
        fn encode(&self, payload: Vec<u8>) -> Encoding {
            let (sender, receiver) = oneshot::channel();
            self.senders.lock().unwrap().push((payload, sender));
            Encoding::Deferred(receiver)
        }
    }

    /// Complete a manual request with the real encoding of its payload.
    pub(crate) fn release(request: (Vec<u8>, oneshot::Sender<String>)) {
        let (payload, sender) = request;
        sender.send(STANDARD.encode(payload)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{release, ManualEncoder};
    use super::*;

    #[test]
    fn test_inline_lands_immediately() {
        let mut buffers = Vec::new();
        let mut finalizer = BufferFinalizer::new(Box::new(InlineEncoder));

        let slot = finalizer.reserve(&mut buffers, b"Hello".to_vec());
        assert_eq!(slot, 0);
        assert_eq!(finalizer.completed(), 1);
        assert_eq!(buffers[0].byte_length, 5);
        assert_eq!(
            buffers[0].uri.as_deref(),
            Some("data:application/octet-stream;base64,SGVsbG8=")
        );
    }

    #[test]
    fn test_manual_out_of_order() {
        let encoder = ManualEncoder::default();
        let mut buffers = Vec::new();
        let mut finalizer = BufferFinalizer::new(Box::new(encoder.clone()));

        for payload in [vec![1u8], vec![2, 2], vec![3, 3, 3]] {
            finalizer.reserve(&mut buffers, payload);
        }
        assert_eq!(finalizer.poll(&mut buffers).unwrap(), 0);
        assert_eq!(finalizer.outstanding(), 3);

        let mut requests = encoder.take();
        release(requests.pop().unwrap());
        assert_eq!(finalizer.poll(&mut buffers).unwrap(), 1);
        assert!(buffers[2].uri.is_some());
        assert!(buffers[0].uri.is_none());

        for request in requests.into_iter().rev() {
            release(request);
        }
        assert_eq!(finalizer.poll(&mut buffers).unwrap(), 2);
        assert_eq!(finalizer.completed(), 3);
        assert_eq!(buffers.iter().map(|b| b.byte_length).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn test_dropped_encode_is_reported() {
        let encoder = ManualEncoder::default();
        let mut buffers = Vec::new();
        let mut finalizer = BufferFinalizer::new(Box::new(encoder.clone()));

        finalizer.reserve(&mut buffers, vec![0; 4]);
        drop(encoder.take());

        let err = finalizer.poll(&mut buffers).unwrap_err();
        assert!(matches!(err, GltfError::EncodeAborted { slot: 0 }));
    }

    #[test]
    fn test_host_encoder_outside_runtime_is_inline() {
        let mut buffers = Vec::new();
        let mut finalizer = BufferFinalizer::new(host_encoder());
        finalizer.reserve(&mut buffers, vec![0xff]);
        assert_eq!(finalizer.completed(), 1);
    }

    #[tokio::test]
    async fn test_deferred_waits_a_turn() {
        let mut buffers = Vec::new();
        let mut finalizer = BufferFinalizer::new(host_encoder());

        finalizer.reserve(&mut buffers, vec![1, 2, 3, 4]);
        finalizer.reserve(&mut buffers, vec![5, 6]);
        assert_eq!(finalizer.completed(), 0);

        finalizer.wait_all(&mut buffers).await.unwrap();
        assert_eq!(finalizer.completed(), 2);
        assert_eq!(
            buffers[1].uri.as_deref(),
            Some("data:application/octet-stream;base64,BQY=")
        );
    }

    #[tokio::test]
    async fn test_wait_all_with_nothing_reserved() {
        let mut buffers = Vec::new();
        let mut finalizer = BufferFinalizer::new(host_encoder());
        finalizer.wait_all(&mut buffers).await.unwrap();
        assert_eq!(finalizer.completed(), 0);
    }
}
