//! Acknowledgement related types.
//!
//! * [`AckSender`]: attached to the [`EventArgs`](crate::EventArgs) of an event for which the
//!   server requested an acknowledgement.
//! * [`AckFuture`]: returned by [`Socket::emit_ack`](crate::Socket::emit_ack), it resolves to the
//!   server acknowledgement.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use serde_json::Value;
use sioclient_core::{
    Str,
    packet::{Packet, Payload},
};
use tokio::sync::oneshot;

use crate::{errors::AckError, event_loop::LoopHandle, manager::ManagerState};

/// A callback waiting for an acknowledgement. Dropped without being called if the socket is
/// destroyed first.
pub(crate) type AckCallback = Box<dyn FnOnce(Payload) + Send + 'static>;

/// Sends the acknowledgement of a received event. Clones share the same acknowledgement:
/// only the first [`send`](AckSender::send) goes to the server.
#[derive(Clone)]
pub struct AckSender {
    id: u64,
    ns: Str,
    sent: Arc<AtomicBool>,
    handle: LoopHandle<ManagerState>,
}

impl std::fmt::Debug for AckSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckSender")
            .field("id", &self.id)
            .field("ns", &self.ns)
            .field("sent", &self.sent.load(Ordering::Relaxed))
            .finish()
    }
}

impl AckSender {
    pub(crate) fn new(id: u64, ns: Str, handle: LoopHandle<ManagerState>) -> Self {
        Self {
            id,
            ns,
            sent: Arc::new(AtomicBool::new(false)),
            handle,
        }
    }

    /// The ack id requested by the server
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if the acknowledgement was already sent
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Acknowledge the event with `args`.
    /// Returns `false` if the acknowledgement was already sent.
    pub fn send(&self, args: impl IntoIterator<Item = Value>) -> bool {
        self.send_with_binary(args, Vec::new())
    }

    /// Acknowledge the event with `args` and binary attachments referenced by placeholders
    /// in `args`. Returns `false` if the acknowledgement was already sent.
    pub fn send_with_binary(
        &self,
        args: impl IntoIterator<Item = Value>,
        binary: Vec<Bytes>,
    ) -> bool {
        if self.sent.swap(true, Ordering::SeqCst) {
            tracing::debug!(ack_id = self.id, ns = %self.ns, "ack already sent");
            return false;
        }
        let payload = Payload::with_attachments(args.into_iter().collect(), binary);
        let packet = Packet::ack(self.ns.clone(), payload, self.id);
        self.handle.submit(move |state, _| state.send_ack(packet));
        true
    }
}

pin_project_lite::pin_project! {
    /// A [`Future`] of the acknowledgement sent by the server.
    ///
    /// It resolves to [`AckError::Closed`] if the socket is closed or destroyed before the
    /// acknowledgement arrives. It has no timeout, wrap it with [`tokio::time::timeout`] if needed.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct AckFuture {
        #[pin]
        rx: oneshot::Receiver<Payload>,
    }
}

impl AckFuture {
    pub(crate) fn new() -> (Self, AckCallback) {
        let (tx, rx) = oneshot::channel();
        let callback: AckCallback = Box::new(move |payload| {
            tx.send(payload).ok();
        });
        (Self { rx }, callback)
    }
}

impl Future for AckFuture {
    type Output = Result<Payload, AckError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().rx.poll(cx).map_err(|_| AckError::Closed)
    }
}
