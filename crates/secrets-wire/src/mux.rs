//! The duplex multiplexer (component C3).
//!
//! Turns one ordered, reliable, bidirectional byte stream into two named
//! logical sub-streams — `plugin_service` (host ↔ plugin requests) and
//! `runtime_service` (plugin ↔ host requests, e.g. registration/health)
//! — each full-duplex, in-order, and backpressured via bounded channels.
//! Framing itself (how one [`crate::message::WireMessage`] is delimited
//! on the wire) is an implementation detail: a one-byte channel tag
//! followed by a length-delimited JSON body.

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::message::WireMessage;

/// Channel tag for host↔plugin requests/responses.
pub const PLUGIN_SERVICE: u8 = 0;
/// Channel tag for plugin↔host requests/responses (registration, health).
pub const RUNTIME_SERVICE: u8 = 1;

const CHANNEL_BUFFER: usize = 64;

/// One logical sub-stream produced by [`Multiplexer::spawn`].
///
/// Cloning the write half is how multiple RPC calls on the same channel
/// interleave safely: each clone just enqueues onto the shared writer
/// task, which serializes access to the underlying stream.
pub struct ChannelHandle {
    tag: u8,
    writer: mpsc::Sender<(u8, WireMessage)>,
    inbound: mpsc::Receiver<WireMessage>,
}

impl ChannelHandle {
    /// This channel's wire tag (`PLUGIN_SERVICE` or `RUNTIME_SERVICE`).
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Send a message on this channel. Fails only once the multiplexer
    /// (or the whole transport) has been closed.
    pub async fn send(&self, msg: WireMessage) -> Result<(), WireMessage> {
        self.writer
            .send((self.tag, msg))
            .await
            .map_err(|e| e.0.1)
    }

    /// Receive the next message addressed to this channel. Resolves to
    /// `None` once the underlying stream is closed.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.inbound.recv().await
    }

    /// A cloneable sender for this channel, for use by callers that need
    /// to hand out independent write access (e.g. one per in-flight RPC
    /// call) without also owning the read half.
    #[must_use]
    pub fn sender(&self) -> ChannelSender {
        ChannelSender {
            tag: self.tag,
            writer: self.writer.clone(),
        }
    }
}

/// A cloneable write-only handle to one logical channel.
#[derive(Clone)]
pub struct ChannelSender {
    tag: u8,
    writer: mpsc::Sender<(u8, WireMessage)>,
}

impl ChannelSender {
    /// Send a message on this channel.
    pub async fn send(&self, msg: WireMessage) -> Result<(), WireMessage> {
        self.writer
            .send((self.tag, msg))
            .await
            .map_err(|e| e.0.1)
    }
}

/// Owns the reader/writer pump tasks for one underlying duplex stream.
/// Dropping (or explicitly calling [`MultiplexerHandle::shutdown`])
/// aborts both tasks, which in turn closes both logical channels.
pub struct MultiplexerHandle {
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl MultiplexerHandle {
    /// Tear down the multiplexer: aborts the pump tasks, which drops the
    /// underlying stream and closes both logical channels.
    pub fn shutdown(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl Drop for MultiplexerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Split one duplex byte stream into two logical channels plus the
/// handle that owns their pump tasks.
pub fn spawn<S>(stream: S) -> (ChannelHandle, ChannelHandle, MultiplexerHandle)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let framed = Framed::new(stream, LengthDelimitedCodec::new());
    let (mut sink, mut source) = framed.split();

    let (write_tx, mut write_rx) = mpsc::channel::<(u8, WireMessage)>(CHANNEL_BUFFER);
    let writer_task = tokio::spawn(async move {
        while let Some((tag, msg)) = write_rx.recv().await {
            let body = match serde_json::to_vec(&msg) {
                Ok(body) => body,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping message that failed to serialize");
                    continue;
                },
            };
            let mut buf = BytesMut::with_capacity(body.len() + 1);
            buf.extend_from_slice(&[tag]);
            buf.extend_from_slice(&body);
            if sink.send(buf.freeze()).await.is_err() {
                break;
            }
        }
    });

    let (plugin_tx, plugin_rx) = mpsc::channel(CHANNEL_BUFFER);
    let (runtime_tx, runtime_rx) = mpsc::channel(CHANNEL_BUFFER);
    let reader_task = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            let frame: Bytes = match frame {
                Ok(frame) => frame.freeze(),
                Err(err) => {
                    tracing::warn!(error = %err, "transport read error, closing multiplexer");
                    break;
                },
            };
            if frame.is_empty() {
                continue;
            }
            let tag = frame[0];
            let msg: WireMessage = match serde_json::from_slice(&frame[1..]) {
                Ok(msg) => msg,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping unparsable frame");
                    continue;
                },
            };
            let target = match tag {
                PLUGIN_SERVICE => &plugin_tx,
                RUNTIME_SERVICE => &runtime_tx,
                other => {
                    tracing::warn!(tag = other, "dropping frame with unknown channel tag");
                    continue;
                },
            };
            if target.send(msg).await.is_err() {
                break;
            }
        }
        // Falling off the end drops plugin_tx/runtime_tx, which closes
        // both logical channels — the C3 contract that a close on the
        // underlying stream closes both sub-streams.
    });

    let plugin = ChannelHandle {
        tag: PLUGIN_SERVICE,
        writer: write_tx.clone(),
        inbound: plugin_rx,
    };
    let runtime = ChannelHandle {
        tag: RUNTIME_SERVICE,
        writer: write_tx,
        inbound: runtime_rx,
    };
    let handle = MultiplexerHandle {
        reader_task,
        writer_task,
    };
    (plugin, runtime, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WireMessage;
    use tokio::io::duplex;

    #[tokio::test]
    async fn separates_channels_over_one_stream() {
        let (a, b) = duplex(4096);
        let (mut a_plugin, mut a_runtime, _a_handle) = spawn(a);
        let (mut b_plugin, mut b_runtime, _b_handle) = spawn(b);

        a_plugin
            .send(WireMessage::Request {
                id: 1,
                method: "GetSecret".into(),
                params: serde_json::json!({"id": "db/password"}),
            })
            .await
            .unwrap();
        a_runtime
            .send(WireMessage::Request {
                id: 2,
                method: "RegisterPlugin".into(),
                params: serde_json::json!({"name": "vault"}),
            })
            .await
            .unwrap();

        let on_plugin = b_plugin.recv().await.unwrap();
        let on_runtime = b_runtime.recv().await.unwrap();

        assert_eq!(on_plugin.id(), 1);
        match on_plugin {
            WireMessage::Request { method, .. } => assert_eq!(method, "GetSecret"),
            _ => panic!("expected request"),
        }
        assert_eq!(on_runtime.id(), 2);
        match on_runtime {
            WireMessage::Request { method, .. } => assert_eq!(method, "RegisterPlugin"),
            _ => panic!("expected request"),
        }
    }

    #[tokio::test]
    async fn closing_transport_closes_both_channels() {
        let (a, b) = duplex(4096);
        let (plugin_a, runtime_a, handle_a) = spawn(a);
        let (mut plugin_b, mut runtime_b, _handle_b) = spawn(b);

        drop(plugin_a);
        drop(runtime_a);
        handle_a.shutdown();

        assert!(plugin_b.recv().await.is_none());
        assert!(runtime_b.recv().await.is_none());
    }
}
