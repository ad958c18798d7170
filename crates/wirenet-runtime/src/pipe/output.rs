//! Non-blocking wire output pipe
//!
//! Application sends and relay repropagation are queued on a bounded FIFO and
//! drained by a single worker thread per pipe. The worker exits after an idle
//! linger with an empty queue and is restarted on the next enqueue. The idle
//! check is made under the same monitor the enqueue path uses to start a
//! worker, so a message queued in the gap is never stranded.

use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};
use wirenet_core::protocol::{new_message_id, WireHeader, DIRECT_TTL};
use wirenet_core::{Message, OutputPipeConfig, PeerId, PipeError, PipeId};

// ----------------------------------------------------------------------------
// Propagation Sink
// ----------------------------------------------------------------------------

/// Where the worker hands dequeued messages
pub trait PropagationSink: Send + Sync {
    /// Deliver `msg` to `peers`, or flood it when `peers` is empty
    fn send_message(&self, msg: &Arc<Message>, peers: &[PeerId]) -> Result<(), PipeError>;
}

/// Reference from an output pipe to its sink.
///
/// A wire pipe's own repropagation queue holds its pipe weakly.
#[derive(Clone)]
pub enum SinkRef {
    Strong(Arc<dyn PropagationSink>),
    Weak(Weak<dyn PropagationSink>),
}

impl SinkRef {
    fn get(&self) -> Option<Arc<dyn PropagationSink>> {
        match self {
            SinkRef::Strong(sink) => Some(sink.clone()),
            SinkRef::Weak(sink) => sink.upgrade(),
        }
    }
}

// ----------------------------------------------------------------------------
// Worker State and Statistics
// ----------------------------------------------------------------------------

/// Worker thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Popping and transmitting
    SendMessages,
    /// Terminal; remaining entries are dropped unsent
    Closed,
}

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub in_queue: usize,
    pub enqueued: u64,
    pub dequeued: u64,
}

struct WorkerMonitor {
    closed: bool,
    worker: Option<ThreadId>,
    state: WorkerState,
}

struct OutputShared {
    pipe_id: PipeId,
    local_peer: PeerId,
    dest_peers: Vec<PeerId>,
    default_ttl: u32,
    config: OutputPipeConfig,
    sink: SinkRef,
    sender: Mutex<Option<Sender<Arc<Message>>>>,
    receiver: Receiver<Arc<Message>>,
    monitor: Mutex<WorkerMonitor>,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
}

impl OutputShared {
    fn stats(&self) -> QueueStats {
        QueueStats {
            in_queue: self.receiver.len(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
        }
    }
}

// ----------------------------------------------------------------------------
// Output Pipe
// ----------------------------------------------------------------------------

/// Queueing output pipe bound to a propagation sink
pub struct NonBlockingWireOutputPipe {
    shared: Arc<OutputShared>,
}

impl NonBlockingWireOutputPipe {
    /// Create an output pipe sending to `dest_peers` (all peers if empty)
    pub fn new(
        pipe_id: PipeId,
        local_peer: PeerId,
        dest_peers: Vec<PeerId>,
        sink: SinkRef,
        default_ttl: u32,
        config: OutputPipeConfig,
    ) -> Self {
        let mut dest_peers = dest_peers;
        dest_peers.sort();
        dest_peers.dedup();

        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        info!(pipe = %pipe_id, peers = dest_peers.len(), "Constructing output pipe");

        Self {
            shared: Arc::new(OutputShared {
                pipe_id,
                local_peer,
                dest_peers,
                default_ttl,
                config,
                sink,
                sender: Mutex::new(Some(sender)),
                receiver,
                monitor: Mutex::new(WorkerMonitor {
                    closed: false,
                    worker: None,
                    state: WorkerState::SendMessages,
                }),
                enqueued: AtomicU64::new(0),
                dequeued: AtomicU64::new(0),
            }),
        }
    }

    pub fn pipe_id(&self) -> &PipeId {
        &self.shared.pipe_id
    }

    pub fn dest_peers(&self) -> &[PeerId] {
        &self.shared.dest_peers
    }

    /// Tag a copy of `msg` with a fresh flood header and queue it.
    ///
    /// Explicit destinations get a TTL of one; floods get the default TTL.
    pub fn send(&self, msg: &Message) -> Result<bool, PipeError> {
        let ttl = if self.shared.dest_peers.is_empty() {
            self.shared.default_ttl
        } else {
            DIRECT_TTL
        };
        let header = WireHeader::new(self.shared.pipe_id, new_message_id(), ttl, self.shared.local_peer);

        let mut copy = msg.clone_message();
        header.attach(&mut copy)?;
        self.enqueue(Arc::new(copy))
    }

    /// Queue a message that already carries its header.
    ///
    /// Waits at most `enqueue_wait` for room. Returns `Ok(false)` if the
    /// queue stayed full and `PipeError::Closed` once the pipe is closed.
    pub fn enqueue(&self, msg: Arc<Message>) -> Result<bool, PipeError> {
        trace!(pipe = %self.shared.pipe_id, "Queuing message");

        let sender = self.shared.sender.lock().clone();
        let Some(sender) = sender else {
            error!(pipe = %self.shared.pipe_id, "Could not enqueue message, pipe is closed");
            return Err(PipeError::Closed);
        };

        match sender.send_timeout(msg, self.shared.config.enqueue_wait) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                if self.is_closed() {
                    error!(pipe = %self.shared.pipe_id, "Could not enqueue message, pipe is closed");
                    return Err(PipeError::Closed);
                }
                debug!(pipe = %self.shared.pipe_id, "Queue full, message not queued");
                return Ok(false);
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(PipeError::Closed),
        }

        self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
        start_service_thread(&self.shared);
        Ok(true)
    }

    /// Close the queue; the worker sends what is queued, then exits
    pub fn close(&self) {
        let mut monitor = self.shared.monitor.lock();
        if !monitor.closed {
            info!(pipe = %self.shared.pipe_id, "Closing queue");
            self.shared.sender.lock().take();
        }
        monitor.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.monitor.lock().closed
    }

    pub fn is_worker_running(&self) -> bool {
        self.shared.monitor.lock().worker.is_some()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.monitor.lock().state
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }
}

impl Drop for NonBlockingWireOutputPipe {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Worker Thread
// ----------------------------------------------------------------------------

/// Start a worker unless one is running or the pipe is closed
fn start_service_thread(shared: &Arc<OutputShared>) {
    let mut monitor = shared.monitor.lock();
    if monitor.worker.is_some() || monitor.closed {
        return;
    }

    let worker_shared = shared.clone();
    let spawned = thread::Builder::new()
        .name(format!("wire-output-{}", shared.pipe_id.unique_value()))
        .spawn(move || run_worker(worker_shared));

    match spawned {
        Ok(handle) => {
            monitor.worker = Some(handle.thread().id());
            monitor.state = WorkerState::SendMessages;
            let stats = shared.stats();
            info!(
                pipe = %shared.pipe_id,
                in_queue = stats.in_queue,
                enqueued = stats.enqueued,
                dequeued = stats.dequeued,
                "Worker thread start"
            );
        }
        Err(err) => error!(pipe = %shared.pipe_id, %err, "Could not start worker thread"),
    }
}

/// Clears the worker slot if the thread ends without doing so itself
struct WorkerExitGuard {
    shared: Arc<OutputShared>,
}

impl Drop for WorkerExitGuard {
    fn drop(&mut self) {
        let state = {
            let mut monitor = self.shared.monitor.lock();
            if monitor.worker == Some(thread::current().id()) {
                if thread::panicking() {
                    error!(pipe = %self.shared.pipe_id, "Uncaught panic in worker thread");
                }
                monitor.worker = None;
            }
            monitor.state
        };

        let stats = self.shared.stats();
        info!(
            pipe = %self.shared.pipe_id,
            worker_state = ?state,
            in_queue = stats.in_queue,
            enqueued = stats.enqueued,
            dequeued = stats.dequeued,
            "Worker thread exit"
        );
    }
}

fn run_worker(shared: Arc<OutputShared>) {
    let _guard = WorkerExitGuard {
        shared: shared.clone(),
    };
    let linger: Duration = shared.config.idle_linger;

    loop {
        let msg = match shared.receiver.recv_timeout(linger) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                let mut monitor = shared.monitor.lock();
                if !shared.receiver.is_empty() {
                    continue;
                }
                if monitor.closed {
                    monitor.state = WorkerState::Closed;
                    let dropped = shared.receiver.try_iter().count();
                    if dropped > 0 {
                        debug!(pipe = %shared.pipe_id, dropped, "Dropped queued messages on close");
                    }
                }
                monitor.worker = None;
                return;
            }
        };

        shared.dequeued.fetch_add(1, Ordering::Relaxed);
        let Some(sink) = shared.sink.get() else {
            debug!(pipe = %shared.pipe_id, "Propagation target gone, dropping message");
            continue;
        };

        trace!(pipe = %shared.pipe_id, "Sending message");
        if let Err(err) = sink.send_message(&msg, &shared.dest_peers) {
            error!(pipe = %shared.pipe_id, %err, "Failed sending message");
        }
    }
}
