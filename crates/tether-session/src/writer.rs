//! Single writer per channel.
//!
//! Every outbound frame of a channel goes through one queue drained by one
//! task, so frames are never interleaved and enqueueing never blocks the
//! caller (which may be holding the session lock).

use bytes::BytesMut;
use tether_proto::Frame;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{mpsc, oneshot},
};

use crate::error::TransportError;

/// Work item for the writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Write one frame; signal `written` once it is on the wire
    Frame {
        frame: Frame,
        written: Option<oneshot::Sender<()>>,
    },
    /// Shut down the write side after everything queued before it
    Close,
}

/// Drain `queue` into `writer` until `Close` or until every sender is gone.
pub(crate) async fn run_writer<W>(
    mut writer: W,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();

    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame { frame, written } => {
                buf.clear();
                frame.encode(&mut buf)?;
                writer.write_all(&buf).await?;
                writer.flush().await?;
                tracing::trace!(opcode = ?frame.opcode(), len = buf.len(), "frame written");

                if let Some(written) = written {
                    // Receiver gone means the transfer was abandoned
                    let _ = written.send(());
                }
            },
            Outbound::Close => break,
        }
    }

    writer.shutdown().await?;
    Ok(())
}
