use futures::StreamExt;
use tokio::io::ReadHalf;
use tokio_util::codec::FramedRead;

use crate::codec::{FrameError, StompCodec, StompItem};
use crate::frame::Frame;
use crate::transport::BoxedTransport;

/// Pulls frames off the read half of the transport.
///
/// Owned by exactly one task at a time: the handshake first, then the
/// background read loop.
pub struct FrameReader {
    inner: FramedRead<ReadHalf<BoxedTransport>, StompCodec>,
}

impl FrameReader {
    pub fn new(half: ReadHalf<BoxedTransport>) -> Self {
        Self {
            inner: FramedRead::new(half, StompCodec::new()),
        }
    }

    /// Read the next item.
    ///
    /// Returns `Ok(None)` for a heartbeat and `Err(FrameError::Closed)` when
    /// the peer closed the stream cleanly between frames.
    pub async fn read(&mut self) -> Result<Option<Frame>, FrameError> {
        match self.inner.next().await {
            Some(Ok(StompItem::Frame(frame))) => Ok(Some(frame)),
            Some(Ok(StompItem::Heartbeat)) => Ok(None),
            Some(Err(e)) => Err(e),
            None => Err(FrameError::Closed),
        }
    }
}
