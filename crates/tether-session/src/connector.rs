//! Connector: the async facade around one [`Session`].
//!
//! Owns the transport, the listener slots and at most one live channel (a
//! "link"). Every entry point takes the state lock, runs one step of the
//! session state machine and executes the returned actions before releasing
//! it:
//!
//! - frames go onto the link's outbound queue (drained by the writer task)
//! - events go onto the dispatcher queue
//! - partial-file operations go onto the link's file worker queue
//! - `Close` retires the link: the writer flushes and shuts down, the reader
//!   is aborted, the file worker drains its queue and exits
//!
//! Each link also gets a handshake timer that retires it if the partner or
//! the user leaves the handshake waiting past `handshake_timeout`.
//!
//! The lock is a `std::sync::Mutex` and is never held across an `.await`.
//! Tasks of a retired link may still call in; they are recognised by their
//! link id and ignored.

use std::{
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use tether_core::{
    ChatMessage, ConnectionEvent, ConnectionState, Conversation, Environment, FileEvent,
    MessageKind, Peer, Session, SessionAction, SessionError, SessionEvent, TransferId,
};
use tether_proto::{Frame, Opcode, ProtocolError};
use tokio::{
    sync::{mpsc, oneshot},
    task::{AbortHandle, JoinHandle},
};

use crate::{
    config::SessionConfig,
    error::TransportError,
    files::{PartialFile, SourceFile},
    listener::{
        ConnectionListener, Executor, FileListener, InlineExecutor, Listeners, MessageListener,
        run_dispatcher,
    },
    reader::FrameReader,
    system_env::SystemEnv,
    transport::{Channel, Listener, Transport},
    writer::{Outbound, run_writer},
};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(250);

/// Disk work for the incoming transfer of one link.
#[derive(Debug)]
enum FileCommand {
    Open { name: String },
    Append { data: Bytes, received: u64, total: u64 },
    Complete { message: ChatMessage },
    Discard,
}

/// One channel and the session running over it.
struct Link<E: Environment> {
    id: u64,
    session: Session<E>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    files: Option<mpsc::UnboundedSender<FileCommand>>,
    reader: Option<AbortHandle>,
}

impl<E: Environment> Link<E> {
    fn new(id: u64, session: Session<E>) -> Self {
        Self { id, session, outbound: None, files: None, reader: None }
    }
}

struct State<E: Environment> {
    link: Option<Link<E>>,
    /// State of the most recently retired session
    last_state: ConnectionState,
    accept_loop: Option<JoinHandle<()>>,
    local_address: Option<String>,
}

impl<E: Environment> State<E> {
    fn current(&mut self, link_id: u64) -> Option<&mut Link<E>> {
        self.link.as_mut().filter(|link| link.id == link_id)
    }

    fn is_current(&self, link_id: u64) -> bool {
        self.link.as_ref().is_some_and(|link| link.id == link_id)
    }

    fn connection_state(&self) -> ConnectionState {
        self.link.as_ref().map_or(self.last_state, |link| link.session.state())
    }
}

struct Inner<T: Transport, E: Environment> {
    transport: T,
    env: E,
    config: SessionConfig,
    state: Mutex<State<E>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    listeners: Arc<Listeners>,
    next_link: AtomicU64,
}

/// Async facade for one peer session at a time.
///
/// Control operations return as soon as their frames are queued; outcomes
/// arrive through the registered listeners. Dropping the connector closes
/// the channel without emitting events; call [`Connector::stop`] first for
/// an orderly teardown.
pub struct Connector<T: Transport, E: Environment = SystemEnv> {
    inner: Arc<Inner<T, E>>,
}

impl<T: Transport> Connector<T, SystemEnv> {
    /// Connector using the system clock, delivering events inline on the
    /// dispatcher task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::with_environment(transport, SystemEnv::new(), config, Arc::new(InlineExecutor))
    }
}

impl<T: Transport, E: Environment> Connector<T, E> {
    /// Connector with an explicit clock and callback executor.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_environment(
        transport: T,
        env: E,
        config: SessionConfig,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let listeners = Arc::new(Listeners::default());
        let (events, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(Arc::clone(&listeners), executor, queue));

        let state = State {
            link: None,
            last_state: ConnectionState::Idle,
            accept_loop: None,
            local_address: None,
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                env,
                config,
                state: Mutex::new(state),
                events,
                listeners,
                next_link: AtomicU64::new(1),
            }),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Register the connection listener; `None` clears the slot.
    pub fn set_connection_listener(&self, listener: Option<Arc<dyn ConnectionListener>>) {
        self.inner.listeners.set_connection(listener);
    }

    /// Register the message listener; `None` clears the slot.
    pub fn set_message_listener(&self, listener: Option<Arc<dyn MessageListener>>) {
        self.inner.listeners.set_message(listener);
    }

    /// Register the file listener; `None` clears the slot.
    pub fn set_file_listener(&self, listener: Option<Arc<dyn FileListener>>) {
        self.inner.listeners.set_file(listener);
    }

    /// Start accepting incoming channels. Calling it again while prepared
    /// does nothing.
    ///
    /// # Errors
    ///
    /// - `SessionError::Transport` if the listen address cannot be bound
    pub async fn prepare(&self) -> Result<(), SessionError> {
        if self.is_prepared() {
            return Ok(());
        }

        let listener = self.inner.transport.bind(&self.inner.config.listen_address).await?;
        let address = listener.local_address()?;

        let mut state = self.inner.lock();
        if state.accept_loop.is_some() {
            return Ok(());
        }
        tracing::info!(%address, "accepting connections");
        state.local_address = Some(address);
        state.accept_loop = Some(tokio::spawn(Arc::clone(&self.inner).accept_loop(listener)));
        Ok(())
    }

    /// Stop accepting incoming channels. The current session is unaffected.
    pub fn release(&self) {
        let mut state = self.inner.lock();
        if let Some(accept_loop) = state.accept_loop.take() {
            accept_loop.abort();
            tracing::info!("stopped accepting connections");
        }
        state.local_address = None;
    }

    /// Open a channel to `peer` and send the connection request.
    ///
    /// Returns once the request is queued; the decision arrives as a
    /// connection event.
    ///
    /// # Errors
    ///
    /// - `SessionError::AlreadyPending` if a session exists. An incoming
    ///   channel whose partner has not sent a request yet does not count; it
    ///   is closed to make way.
    /// - `SessionError::Transport` if the channel cannot be opened in time
    ///   (a `ConnectionFailed` event is emitted as well)
    /// - `SessionError::InvalidState` if the attempt was stopped meanwhile
    pub async fn connect(&self, peer: Peer) -> Result<(), SessionError> {
        let inner = &self.inner;
        let link_id = {
            let mut state = inner.lock();
            if let Some(link) = state.link.as_ref().filter(|link| !link.session.awaits_request()) {
                return Err(SessionError::AlreadyPending { state: link.session.state() });
            }
            inner.retire_link(&mut state, "silent incoming channel replaced");

            let mut session = Session::outgoing(inner.env.clone(), inner.config.profile.clone())
                .with_handshake_timeout(inner.config.handshake_timeout);
            let actions = session.begin_connect(peer.clone())?;
            let link_id = inner.next_link.fetch_add(1, Ordering::Relaxed);
            state.link = Some(Link::new(link_id, session));
            inner.execute(&mut state, actions, None);
            link_id
        };

        tracing::info!(address = %peer.address, name = %peer.name, "connecting");
        let opened =
            tokio::time::timeout(inner.config.connect_timeout, inner.transport.connect(&peer.address))
                .await;

        match opened {
            Ok(Ok(channel)) => inner.channel_opened(link_id, channel),
            Ok(Err(e)) => Err(inner.connect_failed(link_id, &e.to_string())),
            Err(_) => Err(inner.connect_failed(link_id, "connect timed out")),
        }
    }

    /// Accept the pending incoming request.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless a decision is pending
    pub fn accept_connection(&self) -> Result<(), SessionError> {
        self.inner.apply("accept", Session::accept)
    }

    /// Reject the pending incoming request.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless a decision is pending
    pub fn reject_connection(&self) -> Result<(), SessionError> {
        self.inner.apply("reject", Session::reject)
    }

    /// Withdraw our request before the partner decides.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless our request is pending
    pub fn withdraw_connection(&self) -> Result<(), SessionError> {
        self.inner.apply("withdraw", Session::withdraw)
    }

    /// End the established session.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if no session is established, including
    ///   a second call
    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.inner.apply("disconnect", Session::disconnect)
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if no session is established
    pub fn send_message(&self, text: &str) -> Result<(), SessionError> {
        self.inner.apply("send message", |session| session.send_message(text))
    }

    /// Tell the partner the user has read message `id`.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if no session is established
    /// - `SessionError::UnknownMessage` if `id` is not an unseen received
    ///   message
    pub fn mark_seen(&self, id: &str) -> Result<(), SessionError> {
        self.inner.apply("mark seen", |session| session.mark_seen(id))
    }

    /// Send the file at `path` as an image message.
    ///
    /// Returns once the transfer is announced; chunks are read and sent in
    /// the background, reported through file events.
    ///
    /// # Errors
    ///
    /// - `SessionError::Io` if `path` is not a readable regular file
    /// - `SessionError::InvalidState` if no session is established
    /// - `SessionError::TransferBusy` if a file is already being sent
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let io_error = |e: std::io::Error| SessionError::Io(format!("{}: {e}", path.display()));

        let metadata = tokio::fs::metadata(path).await.map_err(io_error)?;
        if !metadata.is_file() {
            return Err(SessionError::Io(format!("{}: not a regular file", path.display())));
        }
        let source = SourceFile::open(path).await.map_err(io_error)?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        let (link_id, transfer) = {
            let mut state = self.inner.lock();
            let last_state = state.last_state;
            let Some(link) = state.link.as_mut() else {
                return Err(SessionError::InvalidState { state: last_state, operation: "send file" });
            };

            let link_id = link.id;
            let (transfer, actions) =
                link.session.begin_file_send(path, &name, metadata.len(), MessageKind::Image)?;
            self.inner.execute(&mut state, actions, None);
            (link_id, transfer)
        };

        tracing::info!(path = %path.display(), size = metadata.len(), "sending file");
        tokio::spawn(Arc::clone(&self.inner).pump_file(link_id, transfer, source));
        Ok(())
    }

    /// Cancel the outgoing transfer, or the incoming one if nothing is being
    /// sent.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveTransfer` if no transfer is running
    /// - `SessionError::InvalidState` if there is no session
    pub fn cancel_file_transfer(&self) -> Result<(), SessionError> {
        self.inner.apply("cancel transfer", Session::cancel_file_transfer)
    }

    /// Tear down the current session from any state.
    ///
    /// An established partner is told we disconnected. Emits
    /// `ConnectionDestroyed` once; repeated calls do nothing.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        if let Some(link) = state.link.as_mut() {
            let actions = link.session.destroy();
            self.inner.execute(&mut state, actions, None);
        } else if state.last_state != ConnectionState::Destroyed {
            state.last_state = ConnectionState::Destroyed;
            self.inner.emit(ConnectionEvent::ConnectionDestroyed.into());
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().connection_state()
    }

    /// True while a session is established
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Established
    }

    /// True while a connection attempt or decision is in progress
    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// True if connected or pending
    pub fn is_connected_or_pending(&self) -> bool {
        let state = self.state();
        state == ConnectionState::Established || state.is_pending()
    }

    /// Conversation with the connected partner
    pub fn current_conversation(&self) -> Option<Conversation> {
        self.inner.lock().link.as_ref().and_then(|link| link.session.conversation())
    }

    /// True while incoming channels are being accepted
    pub fn is_prepared(&self) -> bool {
        self.inner.lock().accept_loop.is_some()
    }

    /// Address peers can connect to, while prepared
    pub fn local_address(&self) -> Option<String> {
        self.inner.lock().local_address.clone()
    }
}

impl<T: Transport, E: Environment> Drop for Connector<T, E> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        if let Some(accept_loop) = state.accept_loop.take() {
            accept_loop.abort();
        }
        self.inner.retire_link(&mut state, "connector dropped");
    }
}

impl<T: Transport, E: Environment> Inner<T, E> {
    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // Dispatcher gone means nobody is listening any more
        let _ = self.events.send(event);
    }

    /// Run one synchronous session step on the current link.
    fn apply(
        &self,
        operation: &'static str,
        step: impl FnOnce(&mut Session<E>) -> Result<Vec<SessionAction>, SessionError>,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        let last_state = state.last_state;
        let Some(link) = state.link.as_mut() else {
            return Err(SessionError::InvalidState { state: last_state, operation });
        };

        let actions = step(&mut link.session)?;
        self.execute(&mut state, actions, None);
        Ok(())
    }

    /// Run a session step on link `link_id`, if it is still current.
    fn apply_to(
        &self,
        link_id: u64,
        step: impl FnOnce(&mut Session<E>) -> Result<Vec<SessionAction>, SessionError>,
        written: Option<oneshot::Sender<()>>,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        let Some(link) = state.current(link_id) else {
            return Err(SessionError::NoActiveTransfer);
        };

        let actions = step(&mut link.session)?;
        self.execute(&mut state, actions, written);
        Ok(())
    }

    /// Carry out `actions` in order on the current link.
    ///
    /// `written` is attached to the first file chunk frame so the sender can
    /// wait until it is on the wire before reading the next one.
    fn execute(
        &self,
        state: &mut State<E>,
        actions: Vec<SessionAction>,
        mut written: Option<oneshot::Sender<()>>,
    ) {
        let mut close = None;

        for action in actions {
            match action {
                SessionAction::Send(frame) => {
                    let ack = if frame.opcode() == Some(Opcode::FileChunk) {
                        written.take()
                    } else {
                        None
                    };
                    Self::enqueue(state, frame, ack);
                },
                SessionAction::Emit(event) => self.emit(event),
                SessionAction::Close { reason } => close = Some(reason),
                SessionAction::OpenIncomingFile { name, size } => {
                    tracing::debug!(%name, size, "receiving file");
                    Self::file_command(state, FileCommand::Open { name });
                },
                SessionAction::AppendIncomingFile { data, received, total } => {
                    Self::file_command(state, FileCommand::Append { data, received, total });
                },
                SessionAction::CompleteIncomingFile { message } => {
                    Self::file_command(state, FileCommand::Complete { message });
                },
                SessionAction::DiscardIncomingFile => {
                    Self::file_command(state, FileCommand::Discard);
                },
            }
        }

        if let Some(reason) = close {
            self.retire_link(state, &reason);
        }
    }

    fn enqueue(state: &State<E>, frame: Frame, written: Option<oneshot::Sender<()>>) {
        let Some(outbound) = state.link.as_ref().and_then(|link| link.outbound.as_ref()) else {
            tracing::debug!(opcode = ?frame.opcode(), "no channel; frame dropped");
            return;
        };

        tracing::debug!(opcode = ?frame.opcode(), len = frame.payload.len(), "sending frame");
        if outbound.send(Outbound::Frame { frame, written }).is_err() {
            tracing::debug!("writer gone; frame dropped");
        }
    }

    fn file_command(state: &State<E>, command: FileCommand) {
        if let Some(files) = state.link.as_ref().and_then(|link| link.files.as_ref()) {
            let _ = files.send(command);
        }
    }

    /// Detach the current link and close its channel.
    fn retire_link(&self, state: &mut State<E>, reason: &str) {
        let Some(link) = state.link.take() else {
            return;
        };

        tracing::info!(link = link.id, "closing channel: {reason}");
        state.last_state = link.session.state();

        if let Some(outbound) = link.outbound {
            let _ = outbound.send(Outbound::Close);
        }
        if let Some(reader) = link.reader {
            reader.abort();
        }
    }

    /// The channel of `link_id` ended underneath us.
    fn channel_closed(&self, link_id: u64, reason: &str) {
        let mut state = self.lock();
        let Some(link) = state.current(link_id) else {
            return;
        };

        tracing::info!(link = link_id, "channel closed: {reason}");
        let actions = link.session.transport_closed(reason);
        self.execute(&mut state, actions, None);
        self.retire_link(&mut state, reason);
    }

    fn connect_failed(&self, link_id: u64, reason: &str) -> SessionError {
        tracing::warn!("connect failed: {reason}");

        let mut state = self.lock();
        if let Some(link) = state.current(link_id) {
            match link.session.connect_failed(reason) {
                Ok(actions) => self.execute(&mut state, actions, None),
                Err(e) => tracing::debug!("connect failure after state change: {e}"),
            }
            self.retire_link(&mut state, reason);
        }

        SessionError::Transport(reason.to_string())
    }

    /// Handle one frame read on `link_id`. Returns false once the link is no
    /// longer current and the reader should stop.
    fn dispatch_frame(&self, link_id: u64, frame: &Frame) -> bool {
        let mut state = self.lock();
        let Some(link) = state.current(link_id) else {
            return false;
        };

        tracing::debug!(opcode = ?frame.opcode(), len = frame.payload.len(), "received frame");
        match link.session.handle_frame(frame) {
            Ok(actions) => self.execute(&mut state, actions, None),
            Err(e) => tracing::warn!(link = link_id, "dropping frame: {e}"),
        }

        state.is_current(link_id)
    }

    /// The reader skipped an oversized frame on `link_id`.
    fn frame_skipped(&self, link_id: u64, error: &ProtocolError) {
        tracing::warn!(link = link_id, "skipping frame: {error}");
        let &ProtocolError::OversizedFrame { opcode, .. } = error else {
            return;
        };

        let mut state = self.lock();
        let Some(link) = state.current(link_id) else {
            return;
        };
        let actions = link.session.frame_dropped(opcode, &error.to_string());
        self.execute(&mut state, actions, None);
    }

    /// Expire the handshake of `link_id` if its deadline passed. Returns how
    /// long to wait before checking again, or `None` once the handshake is
    /// settled or the link is gone.
    fn check_handshake(&self, link_id: u64) -> Option<Duration> {
        let mut state = self.lock();
        let actions = state.current(link_id)?.session.tick();
        if !actions.is_empty() {
            self.execute(&mut state, actions, None);
        }

        let deadline = state.current(link_id)?.session.handshake_deadline()?;
        let now = self.env.unix_millis();
        Some(Duration::from_millis(deadline.saturating_sub(now).max(1)))
    }

    fn incoming_failed(&self, link_id: u64, reason: &str) {
        tracing::warn!("incoming file failed: {reason}");
        if let Err(e) = self.apply_to(link_id, |session| session.fail_incoming(reason), None) {
            tracing::debug!("incoming transfer already gone: {e}");
        }
    }
}

impl<T: Transport, E: Environment> Inner<T, E> {
    /// Outgoing channel opened: start its tasks and send the request.
    fn channel_opened(
        self: &Arc<Self>,
        link_id: u64,
        channel: Channel<T::Reader, T::Writer>,
    ) -> Result<(), SessionError> {
        let mut state = self.lock();
        let last_state = state.last_state;
        let Some(link) = state.current(link_id) else {
            tracing::info!("connection attempt stopped before the channel opened");
            return Err(SessionError::InvalidState { state: last_state, operation: "connect" });
        };

        self.start_channel(link, channel);
        let actions = link.session.channel_opened()?;
        self.execute(&mut state, actions, None);
        tokio::spawn(Arc::clone(self).handshake_timer(link_id));
        Ok(())
    }

    /// A peer opened a channel to us.
    fn channel_accepted(self: &Arc<Self>, channel: Channel<T::Reader, T::Writer>) {
        let mut state = self.lock();
        if let Some(link) = &state.link {
            tracing::info!(
                remote = %channel.remote,
                state = ?link.session.state(),
                "busy; dropping incoming channel"
            );
            return;
        }

        tracing::info!(remote = %channel.remote, "incoming channel");
        let session = Session::incoming(
            self.env.clone(),
            self.config.profile.clone(),
            channel.remote.clone(),
        )
        .with_handshake_timeout(self.config.handshake_timeout);
        let link_id = self.next_link.fetch_add(1, Ordering::Relaxed);
        let mut link = Link::new(link_id, session);
        self.start_channel(&mut link, channel);
        state.link = Some(link);
        tokio::spawn(Arc::clone(self).handshake_timer(link_id));
    }

    /// Spawn the writer, reader and file worker of `link`.
    fn start_channel(self: &Arc<Self>, link: &mut Link<E>, channel: Channel<T::Reader, T::Writer>) {
        let Channel { reader, writer, remote } = channel;
        let link_id = link.id;
        tracing::debug!(link = link_id, %remote, "channel open");

        let (outbound, queue) = mpsc::unbounded_channel();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = run_writer(writer, queue).await {
                inner.channel_closed(link_id, &e.to_string());
            }
        });

        let (files, commands) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(self).file_worker(link_id, commands));

        let reader = FrameReader::new(reader, self.config.frame_limit());
        let handle = tokio::spawn(Arc::clone(self).read_loop(link_id, reader));

        link.outbound = Some(outbound);
        link.files = Some(files);
        link.reader = Some(handle.abort_handle());
    }

    async fn accept_loop(self: Arc<Self>, listener: T::Listener) {
        loop {
            match listener.accept().await {
                Ok(channel) => self.channel_accepted(channel),
                Err(e) => {
                    tracing::warn!("accept failed: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                },
            }
        }
    }

    async fn handshake_timer(self: Arc<Self>, link_id: u64) {
        while let Some(wait) = self.check_handshake(link_id) {
            tokio::time::sleep(wait).await;
        }
    }

    async fn read_loop(self: Arc<Self>, link_id: u64, mut reader: FrameReader<T::Reader>) {
        loop {
            match reader.next_frame().await {
                Ok(Some(frame)) => {
                    if !self.dispatch_frame(link_id, &frame) {
                        return;
                    }
                },
                Ok(None) => {
                    self.channel_closed(link_id, "channel closed by partner");
                    return;
                },
                Err(TransportError::Protocol(e)) if !e.is_fatal() => {
                    self.frame_skipped(link_id, &e);
                },
                Err(e) => {
                    self.channel_closed(link_id, &e.to_string());
                    return;
                },
            }
        }
    }

    /// Read the source file chunk by chunk; each chunk is sent only after the
    /// previous one reached the wire.
    async fn pump_file(self: Arc<Self>, link_id: u64, transfer: TransferId, mut source: SourceFile) {
        let chunk_size = self.config.effective_chunk_size();

        loop {
            let chunk = match source.next_chunk(chunk_size).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    if let Err(e) = self.apply_to(link_id, |s| s.finish_file_send(transfer), None) {
                        self.send_failed(link_id, transfer, &e);
                    }
                    return;
                },
                Err(e) => {
                    let error = SessionError::Io(e.to_string());
                    self.send_failed(link_id, transfer, &error);
                    return;
                },
            };

            let (written, on_wire) = oneshot::channel();
            let sent = self.apply_to(link_id, |s| s.send_file_chunk(transfer, chunk), Some(written));
            if let Err(e) = sent {
                self.send_failed(link_id, transfer, &e);
                return;
            }

            if on_wire.await.is_err() {
                tracing::debug!("channel closed during file transfer");
                return;
            }
        }
    }

    fn send_failed(&self, link_id: u64, transfer: TransferId, error: &SessionError) {
        if *error == SessionError::NoActiveTransfer {
            tracing::debug!("file transfer stopped");
            return;
        }

        tracing::warn!("file transfer failed: {error}");
        let reason = error.to_string();
        if let Err(e) = self.apply_to(link_id, |s| s.fail_file_send(transfer, &reason), None) {
            tracing::debug!("outgoing transfer already gone: {e}");
        }
    }

    /// Disk side of the incoming transfer. Runs until the link is retired;
    /// a partial file left at that point is deleted.
    async fn file_worker(
        self: Arc<Self>,
        link_id: u64,
        mut commands: mpsc::UnboundedReceiver<FileCommand>,
    ) {
        let dir = self.config.download_dir.clone();
        let mut partial: Option<PartialFile> = None;

        while let Some(command) = commands.recv().await {
            match command {
                FileCommand::Open { name } => {
                    if let Some(stale) = partial.take() {
                        stale.discard().await;
                    }
                    match PartialFile::create(&dir, &name).await {
                        Ok(file) => {
                            tracing::debug!(path = %file.part_path().display(), "receiving into");
                            partial = Some(file);
                        },
                        Err(e) => self.incoming_failed(link_id, &format!("cannot create {name}: {e}")),
                    }
                },
                FileCommand::Append { data, received, total } => {
                    let Some(file) = partial.as_mut() else {
                        continue;
                    };
                    match file.append(&data).await {
                        Ok(()) => {
                            self.emit(FileEvent::ReceivingProgress { received, total }.into());
                        },
                        Err(e) => {
                            if let Some(file) = partial.take() {
                                file.discard().await;
                            }
                            self.incoming_failed(link_id, &format!("write failed: {e}"));
                        },
                    }
                },
                FileCommand::Complete { message } => {
                    let Some(file) = partial.take() else {
                        continue;
                    };
                    match file.complete().await {
                        Ok(path) => {
                            tracing::info!(path = %path.display(), "file received");
                            for event in Session::<E>::completed_file_events(message, &path) {
                                self.emit(event);
                            }
                        },
                        Err(e) => self.emit(
                            FileEvent::ReceivingFailed { reason: format!("cannot store file: {e}") }
                                .into(),
                        ),
                    }
                },
                FileCommand::Discard => {
                    if let Some(file) = partial.take() {
                        file.discard().await;
                    }
                },
            }
        }

        if let Some(file) = partial.take() {
            file.discard().await;
        }
    }
}
