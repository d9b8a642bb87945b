//! File transfer engine.
//!
//! Each session has one outgoing and one incoming slot, and both may be busy
//! at the same time. The engine owns sequence numbers, byte counts and the
//! rules for cancellation; reading the source file and writing the partial
//! file are the caller's job, requested through [`SessionAction`]s.
//!
//! # Wire sequence
//!
//! ```text
//! FILE_START(name, size, kind)
//! FILE_CHUNK(seq = 0, data) ... FILE_CHUNK(seq = n - 1, data)
//! FILE_END(size, chunks = n)
//! ```
//!
//! `FILE_CANCEL { by_sender }` may replace the remainder at any point, from
//! either side. `by_sender` names the slot: the receiver of a cancel with
//! `by_sender = true` drops its incoming transfer, with `by_sender = false` its
//! outgoing one.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tether_proto::{
    MessageKind, Payload,
    payloads::file::{FileCancel, FileChunk, FileEnd, FileStart},
};

use crate::{action::SessionAction, error::SessionError, event::FileEvent};

/// Which way the file flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    /// We are sending
    Send,
    /// We are receiving
    Receive,
}

/// Lifecycle of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Announced, no data yet
    Starting,
    /// At least one chunk moved
    InProgress,
    /// All bytes moved and confirmed
    Finished,
    /// Aborted by an error or a lost session
    Failed,
    /// Aborted on request
    Canceled,
}

/// Identifies one outgoing transfer so a stale reader task cannot feed chunks
/// into a newer transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(u64);

/// Snapshot of a transfer's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    /// Which way the file flows
    pub direction: TransferDirection,
    /// File name without directories
    pub name: String,
    /// Local path (sender side only)
    pub path: Option<PathBuf>,
    /// Total size in bytes
    pub total: u64,
    /// Bytes moved so far
    pub transferred: u64,
    /// Next chunk sequence number
    pub seq: u32,
    /// Kind of chat message the file becomes
    pub kind: MessageKind,
    /// Lifecycle state
    pub state: TransferState,
}

impl FileTransfer {
    fn new(
        direction: TransferDirection,
        name: String,
        path: Option<PathBuf>,
        total: u64,
        kind: MessageKind,
    ) -> Self {
        Self { direction, name, path, total, transferred: 0, seq: 0, kind, state: TransferState::Starting }
    }

    fn advance(&mut self, len: u64) {
        self.transferred += len;
        self.seq += 1;
        self.state = TransferState::InProgress;
    }
}

/// An outgoing transfer that completed; the caller turns it into a chat
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSend {
    /// Name announced to the partner
    pub name: String,
    /// Local file that was sent
    pub path: PathBuf,
    /// Message kind announced to the partner
    pub kind: MessageKind,
}

/// An incoming transfer that completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReceive {
    /// Sanitized file name
    pub name: String,
    /// Message kind announced by the partner
    pub kind: MessageKind,
}

/// Strip directory components from a partner-supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => "file".to_string(),
        base => base.to_string(),
    }
}

/// Outgoing and incoming transfer slots for one session.
#[derive(Debug, Clone, Default)]
pub struct Transfers {
    outgoing: Option<(TransferId, FileTransfer)>,
    incoming: Option<FileTransfer>,
    next_id: u64,
}

impl Transfers {
    /// Both slots empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current outgoing transfer
    pub fn outgoing(&self) -> Option<&FileTransfer> {
        self.outgoing.as_ref().map(|(_, t)| t)
    }

    /// Current incoming transfer
    pub fn incoming(&self) -> Option<&FileTransfer> {
        self.incoming.as_ref()
    }

    /// Announce an outgoing file.
    ///
    /// # Errors
    ///
    /// - `SessionError::TransferBusy` if the outgoing slot is taken
    pub fn begin_send(
        &mut self,
        path: &Path,
        name: &str,
        size: u64,
        kind: MessageKind,
    ) -> Result<(TransferId, Vec<SessionAction>), SessionError> {
        if self.outgoing.is_some() {
            return Err(SessionError::TransferBusy);
        }

        let name = sanitize_file_name(name);
        let start = SessionAction::send(Payload::FileStart(FileStart {
            name: name.clone(),
            size,
            kind,
        }))?;

        let id = TransferId(self.next_id);
        self.next_id += 1;
        let transfer =
            FileTransfer::new(TransferDirection::Send, name, Some(path.to_path_buf()), size, kind);
        self.outgoing = Some((id, transfer));

        Ok((id, vec![
            SessionAction::emit(FileEvent::SendingStarted { path: path.to_path_buf(), total: size }),
            start,
        ]))
    }

    fn outgoing_mut(&mut self, id: TransferId) -> Result<&mut FileTransfer, SessionError> {
        match self.outgoing.as_mut() {
            Some((current, transfer)) if *current == id => Ok(transfer),
            _ => Err(SessionError::NoActiveTransfer),
        }
    }

    /// Send the next chunk of transfer `id`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveTransfer` if `id` was canceled or replaced;
    ///   the caller stops reading
    /// - `SessionError::Protocol` if the data overruns the announced size
    pub fn send_chunk(
        &mut self,
        id: TransferId,
        data: Bytes,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let transfer = self.outgoing_mut(id)?;
        let len = data.len() as u64;
        if transfer.transferred + len > transfer.total {
            return Err(SessionError::Protocol(format!(
                "file grew past announced size {}",
                transfer.total
            )));
        }

        let frame = SessionAction::send(Payload::FileChunk(FileChunk { seq: transfer.seq, data }))?;
        transfer.advance(len);

        Ok(vec![
            frame,
            SessionAction::emit(FileEvent::SendingProgress {
                sent: transfer.transferred,
                total: transfer.total,
            }),
        ])
    }

    /// All data of transfer `id` was sent; close it out.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveTransfer` if `id` was canceled or replaced
    /// - `SessionError::Protocol` if fewer bytes were sent than announced
    pub fn finish_send(
        &mut self,
        id: TransferId,
    ) -> Result<(CompletedSend, Vec<SessionAction>), SessionError> {
        let transfer = self.outgoing_mut(id)?;
        if transfer.transferred != transfer.total {
            return Err(SessionError::Protocol(format!(
                "file shrank: sent {} of {} bytes",
                transfer.transferred, transfer.total
            )));
        }

        let end = SessionAction::send(Payload::FileEnd(FileEnd {
            size: transfer.total,
            chunks: transfer.seq,
        }))?;

        let Some((_, mut transfer)) = self.outgoing.take() else {
            return Err(SessionError::NoActiveTransfer);
        };
        transfer.state = TransferState::Finished;

        let completed = CompletedSend {
            name: transfer.name,
            path: transfer.path.unwrap_or_default(),
            kind: transfer.kind,
        };
        Ok((completed, vec![end, SessionAction::emit(FileEvent::SendingFinished)]))
    }

    /// Reading the source of transfer `id` failed; tell the partner.
    pub fn fail_send(
        &mut self,
        id: TransferId,
        reason: &str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.outgoing_mut(id)?;
        let cancel = SessionAction::send(Payload::FileCancel(FileCancel { by_sender: true }))?;
        self.outgoing = None;

        Ok(vec![
            cancel,
            SessionAction::emit(FileEvent::SendingFailed { reason: reason.to_string() }),
        ])
    }

    /// Local cancel: outgoing transfer first, otherwise incoming.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveTransfer` if both slots are empty
    pub fn cancel(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let canceled = SessionAction::emit(FileEvent::TransferCanceled { by_partner: false });

        if self.outgoing.is_some() {
            let cancel = SessionAction::send(Payload::FileCancel(FileCancel { by_sender: true }))?;
            self.outgoing = None;
            return Ok(vec![cancel, canceled]);
        }

        if self.incoming.is_some() {
            let cancel = SessionAction::send(Payload::FileCancel(FileCancel { by_sender: false }))?;
            self.incoming = None;
            return Ok(vec![SessionAction::DiscardIncomingFile, cancel, canceled]);
        }

        Err(SessionError::NoActiveTransfer)
    }

    /// Partner announced a file.
    pub fn on_start(&mut self, start: FileStart) -> Result<Vec<SessionAction>, SessionError> {
        if self.incoming.is_some() {
            return self.fail_incoming("partner started a second transfer");
        }

        let name = sanitize_file_name(&start.name);
        self.incoming = Some(FileTransfer::new(
            TransferDirection::Receive,
            name.clone(),
            None,
            start.size,
            start.kind,
        ));

        Ok(vec![
            SessionAction::OpenIncomingFile { name: name.clone(), size: start.size },
            SessionAction::emit(FileEvent::ReceivingStarted { name, total: start.size }),
        ])
    }

    /// Partner sent file data.
    pub fn on_chunk(&mut self, chunk: FileChunk) -> Result<Vec<SessionAction>, SessionError> {
        let Some(transfer) = self.incoming.as_mut() else {
            // Chunks already in flight when we canceled
            tracing::debug!(seq = chunk.seq, "chunk without incoming transfer");
            return Ok(Vec::new());
        };

        if chunk.seq != transfer.seq {
            let reason = format!("expected chunk {}, got {}", transfer.seq, chunk.seq);
            return self.fail_incoming(&reason);
        }

        let len = chunk.data.len() as u64;
        if transfer.transferred + len > transfer.total {
            let reason = format!("received more than the announced {} bytes", transfer.total);
            return self.fail_incoming(&reason);
        }

        transfer.advance(len);
        Ok(vec![SessionAction::AppendIncomingFile {
            data: chunk.data,
            received: transfer.transferred,
            total: transfer.total,
        }])
    }

    /// Partner finished sending.
    ///
    /// Returns the completed transfer when sizes and chunk counts agree; the
    /// caller then asks for the partial file to be moved into place.
    pub fn on_end(
        &mut self,
        end: &FileEnd,
    ) -> Result<(Option<CompletedReceive>, Vec<SessionAction>), SessionError> {
        let Some(transfer) = self.incoming.as_ref() else {
            tracing::debug!("file end without incoming transfer");
            return Ok((None, Vec::new()));
        };

        if end.size != transfer.total || transfer.transferred != transfer.total {
            let reason = format!(
                "size mismatch: announced {}, received {}, end declared {}",
                transfer.total, transfer.transferred, end.size
            );
            return Ok((None, self.fail_incoming(&reason)?));
        }
        if end.chunks != transfer.seq {
            let reason = format!("chunk count mismatch: {} vs {}", end.chunks, transfer.seq);
            return Ok((None, self.fail_incoming(&reason)?));
        }

        let Some(mut transfer) = self.incoming.take() else {
            return Ok((None, Vec::new()));
        };
        transfer.state = TransferState::Finished;
        Ok((Some(CompletedReceive { name: transfer.name, kind: transfer.kind }), Vec::new()))
    }

    /// Partner canceled a transfer; `by_sender` names which of ours.
    pub fn on_cancel(&mut self, cancel: &FileCancel) -> Vec<SessionAction> {
        let canceled = SessionAction::emit(FileEvent::TransferCanceled { by_partner: true });

        if cancel.by_sender {
            if self.incoming.take().is_some() {
                return vec![SessionAction::DiscardIncomingFile, canceled];
            }
        } else if self.outgoing.take().is_some() {
            return vec![canceled];
        }

        tracing::debug!(by_sender = cancel.by_sender, "cancel for idle transfer slot");
        Vec::new()
    }

    /// Incoming data was bad or could not be stored: drop the partial file
    /// and tell the partner to stop.
    pub fn fail_incoming(&mut self, reason: &str) -> Result<Vec<SessionAction>, SessionError> {
        if self.incoming.take().is_none() {
            return Err(SessionError::NoActiveTransfer);
        }

        let cancel = SessionAction::send(Payload::FileCancel(FileCancel { by_sender: false }))?;
        Ok(vec![
            SessionAction::DiscardIncomingFile,
            cancel,
            SessionAction::emit(FileEvent::ReceivingFailed { reason: reason.to_string() }),
        ])
    }

    /// Session left Established: fail whatever is running, no frames.
    pub fn abort_all(&mut self, reason: &str) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if self.outgoing.take().is_some() {
            actions.push(SessionAction::emit(FileEvent::SendingFailed {
                reason: reason.to_string(),
            }));
        }
        if self.incoming.take().is_some() {
            actions.push(SessionAction::DiscardIncomingFile);
            actions.push(SessionAction::emit(FileEvent::ReceivingFailed {
                reason: reason.to_string(),
            }));
        }
        actions
    }
}
