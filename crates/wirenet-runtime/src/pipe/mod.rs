//! Pipes
//!
//! [`WirePipe`] implements flood delivery for one pipe id with loop and
//! duplicate suppression; [`NonBlockingWireOutputPipe`] queues outgoing
//! floods and drains them on a self-idling worker thread.

pub mod output;
pub mod wire;

pub use output::{NonBlockingWireOutputPipe, PropagationSink, QueueStats, SinkRef, WorkerState};
pub use wire::{WirePipe, WirePipeContext};
