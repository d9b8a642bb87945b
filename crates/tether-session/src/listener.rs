//! Listener slots and event dispatch.
//!
//! The application registers at most one listener per event category. Events
//! flow from the connector through an unbounded queue to a dispatcher task,
//! which looks up the slot at delivery time and runs the callback on the
//! configured [`Executor`]. A panicking callback is logged and otherwise
//! ignored.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, PoisonError},
};

use tether_core::{ConnectionEvent, FileEvent, MessageEvent, SessionEvent};
use tokio::sync::mpsc;

/// Receives connection lifecycle events.
pub trait ConnectionListener: Send + Sync + 'static {
    /// Called once per event, in order.
    fn on_event(&self, event: ConnectionEvent);
}

/// Receives chat message events.
pub trait MessageListener: Send + Sync + 'static {
    /// Called once per event, in order.
    fn on_event(&self, event: MessageEvent);
}

/// Receives file transfer events.
pub trait FileListener: Send + Sync + 'static {
    /// Called once per event, in order.
    fn on_event(&self, event: FileEvent);
}

impl<F: Fn(ConnectionEvent) + Send + Sync + 'static> ConnectionListener for F {
    fn on_event(&self, event: ConnectionEvent) {
        self(event);
    }
}

impl<F: Fn(MessageEvent) + Send + Sync + 'static> MessageListener for F {
    fn on_event(&self, event: MessageEvent) {
        self(event);
    }
}

impl<F: Fn(FileEvent) + Send + Sync + 'static> FileListener for F {
    fn on_event(&self, event: FileEvent) {
        self(event);
    }
}

/// Where listener callbacks run.
///
/// A UI application typically forwards the job to its main thread.
pub trait Executor: Send + Sync + 'static {
    /// Run `job`. Jobs must run in submission order.
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks directly on the dispatcher task.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

type Slot<L> = Mutex<Option<Arc<L>>>;

/// One optional listener per category; last registration wins.
#[derive(Default)]
pub(crate) struct Listeners {
    connection: Slot<dyn ConnectionListener>,
    message: Slot<dyn MessageListener>,
    file: Slot<dyn FileListener>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("connection", &get(&self.connection).is_some())
            .field("message", &get(&self.message).is_some())
            .field("file", &get(&self.file).is_some())
            .finish()
    }
}

fn get<L: ?Sized>(slot: &Slot<L>) -> Option<Arc<L>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn set<L: ?Sized>(slot: &Slot<L>, listener: Option<Arc<L>>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = listener;
}

impl Listeners {
    pub(crate) fn set_connection(&self, listener: Option<Arc<dyn ConnectionListener>>) {
        set(&self.connection, listener);
    }

    pub(crate) fn set_message(&self, listener: Option<Arc<dyn MessageListener>>) {
        set(&self.message, listener);
    }

    pub(crate) fn set_file(&self, listener: Option<Arc<dyn FileListener>>) {
        set(&self.file, listener);
    }

    /// Callback delivering `event`, or `None` if its slot is empty.
    fn job_for(&self, event: SessionEvent) -> Option<Box<dyn FnOnce() + Send>> {
        match event {
            SessionEvent::Connection(event) => {
                let listener = get(&self.connection)?;
                Some(Box::new(move || listener.on_event(event)))
            },
            SessionEvent::Message(event) => {
                let listener = get(&self.message)?;
                Some(Box::new(move || listener.on_event(event)))
            },
            SessionEvent::File(event) => {
                let listener = get(&self.file)?;
                Some(Box::new(move || listener.on_event(event)))
            },
        }
    }
}

/// Deliver queued events until every sender is dropped.
pub(crate) async fn run_dispatcher(
    listeners: Arc<Listeners>,
    executor: Arc<dyn Executor>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        tracing::debug!(?event, "dispatching");

        let Some(job) = listeners.job_for(event) else {
            continue;
        };

        let guarded: Box<dyn FnOnce() + Send> = Box::new(move || {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::warn!("listener panicked; event dropped");
            }
        });
        executor.execute(guarded);
    }
}
