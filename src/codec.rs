use bytes::{Buf, BufMut, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::escape::encode_value;
use crate::frame::Frame;
use crate::parser::{Accept, Parsed, parse_frame_slice};

/// Errors produced while reading or writing frames.
///
/// Stream failures (`Io`) are kept apart from framing violations
/// (`Protocol`) so callers can tell a dead socket from a corrupt one.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The underlying stream failed
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The bytes on the wire do not form a valid frame
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The peer closed the stream between frames
    #[error("connection closed by peer")]
    Closed,
}

/// Items produced or consumed by the codec.
///
/// A `StompItem` is either a decoded `Frame` or a `Heartbeat` marker
/// representing a single empty line on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A decoded frame (command + headers + body)
    Frame(Frame),
    /// A single heartbeat pulse (LF)
    Heartbeat,
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for the
/// wire protocol.
///
/// Responsibilities:
/// - Decode incoming bytes into `StompItem::Frame` or `StompItem::Heartbeat`,
///   using `content-length` framing when a positive length is declared and
///   NUL-scanning otherwise.
/// - Encode `StompItem` back into bytes, escaping header keys and values.
///
/// The default codec only accepts broker verbs when decoding. Use
/// [`StompCodec::permissive`] to inspect client-originated traffic.
#[derive(Debug, Clone)]
pub struct StompCodec {
    accept: Accept,
}

impl StompCodec {
    pub fn new() -> Self {
        Self {
            accept: Accept::ServerFrames,
        }
    }

    /// A codec that decodes any known command, not just broker verbs.
    pub fn permissive() -> Self {
        Self {
            accept: Accept::AnyCommand,
        }
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = FrameError;

    /// Decode bytes from `src` into a `StompItem`.
    ///
    /// Returns `Ok(None)` and leaves `src` untouched when more bytes are
    /// required, so partial frames survive across reads.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_frame_slice(src.chunk(), self.accept) {
            Ok(Some(Parsed::Heartbeat { consumed })) => {
                src.advance(consumed);
                Ok(Some(StompItem::Heartbeat))
            }
            Ok(Some(Parsed::Frame { frame, consumed })) => {
                src.advance(consumed);
                tracing::trace!(command = %frame.command, bytes = consumed, "decoded frame");
                Ok(Some(StompItem::Frame(frame)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(FrameError::Protocol(e)),
        }
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = FrameError;

    /// Encode a `StompItem` into `dst`.
    ///
    /// A frame whose declared `content-length` disagrees with its body is
    /// refused. A body containing NUL without a declared length gets one
    /// added, since scan-to-NUL framing could not carry it.
    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = match item {
            StompItem::Heartbeat => {
                dst.put_u8(b'\n');
                return Ok(());
            }
            StompItem::Frame(frame) => frame,
        };

        let mut headers = frame.headers;
        let declared = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| v.trim().parse::<usize>());
        match declared {
            Some(Ok(n)) if n == frame.body.len() => {}
            Some(_) => {
                return Err(FrameError::Protocol(format!(
                    "content-length header does not match body of {} bytes",
                    frame.body.len()
                )));
            }
            None if frame.body.contains(&0) => {
                headers.push(("content-length".to_string(), frame.body.len().to_string()));
            }
            None => {}
        }

        let escaped = frame.command.escapes_headers();
        dst.extend_from_slice(frame.command.as_str().as_bytes());
        dst.put_u8(b'\n');
        for (k, v) in &headers {
            if escaped {
                dst.extend_from_slice(encode_value(k).as_bytes());
                dst.put_u8(b':');
                dst.extend_from_slice(encode_value(v).as_bytes());
            } else {
                dst.extend_from_slice(k.as_bytes());
                dst.put_u8(b':');
                dst.extend_from_slice(v.as_bytes());
            }
            dst.put_u8(b'\n');
        }
        dst.put_u8(b'\n');
        if !frame.body.is_empty() {
            dst.extend_from_slice(&frame.body);
        }
        dst.put_u8(0);

        tracing::trace!(command = %frame.command, "encoded frame");
        Ok(())
    }
}
