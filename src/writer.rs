use futures::SinkExt;
use tokio::io::WriteHalf;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;

use crate::codec::{FrameError, StompCodec, StompItem};
use crate::frame::Frame;
use crate::transport::BoxedTransport;

/// Serializes frames onto the write half of the transport.
///
/// The only delimiter between frames is the trailing NUL, so the sink is held
/// behind a mutex for the whole encode-and-flush of one item. When `write`
/// returns, the frame has been handed to the transport in full.
pub struct FrameWriter {
    sink: Mutex<FramedWrite<WriteHalf<BoxedTransport>, StompCodec>>,
}

impl FrameWriter {
    pub fn new(half: WriteHalf<BoxedTransport>) -> Self {
        Self {
            sink: Mutex::new(FramedWrite::new(half, StompCodec::new())),
        }
    }

    /// Encode `frame` and flush it.
    pub async fn write(&self, frame: Frame) -> Result<(), FrameError> {
        self.send_item(StompItem::Frame(frame)).await
    }

    /// Emit a single heartbeat LF.
    pub async fn heartbeat(&self) -> Result<(), FrameError> {
        self.send_item(StompItem::Heartbeat).await
    }

    async fn send_item(&self, item: StompItem) -> Result<(), FrameError> {
        let mut sink = self.sink.lock().await;
        // `send` flushes before resolving
        sink.send(item).await
    }

    /// Flush and shut down the write half.
    pub async fn close(&self) -> Result<(), FrameError> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}
