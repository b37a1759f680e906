use std::io::{self, ErrorKind, Read};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{Level, debug, error};

use super::interrupt::{Interrupt, NoInterrupt};
use super::types::{CancelToken, PumpEvent, PumpOutcome, PumpState, StateCell};

/// Read buffer size used unless [`StreamPump::with_buffer_size`] says otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

type ChunkSink = Box<dyn FnMut(Vec<u8>) + Send>;
type CompletionSink = Box<dyn FnOnce(bool) + Send>;

/// State shared between a pump's worker and every [`PumpHandle`].
struct Shared {
    cancel: CancelToken,
    state: StateCell,
    interrupter: Mutex<Box<dyn Interrupt>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Drains a byte source into a chunk sink on a background thread.
///
/// The completion sink fires exactly once after the worker stops, with `true`
/// only when the source reached end-of-stream. A pump that is never started
/// never calls either sink. The pump does not own the source's lifecycle: it
/// reads until told to stop and never shuts the source down on its own.
pub struct StreamPump {
    source: Box<dyn Read + Send>,
    on_chunk: ChunkSink,
    on_finish: CompletionSink,
    buffer_size: usize,
    handle: PumpHandle,
}

impl StreamPump {
    pub fn new<R, C, F>(source: R, on_chunk: C, on_finish: F) -> Self
    where
        R: Read + Send + 'static,
        C: FnMut(Vec<u8>) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        Self {
            source: Box::new(source),
            on_chunk: Box::new(on_chunk),
            on_finish: Box::new(on_finish),
            buffer_size: DEFAULT_BUFFER_SIZE,
            handle: PumpHandle {
                shared: Arc::new(Shared {
                    cancel: CancelToken::new(),
                    state: StateCell::default(),
                    interrupter: Mutex::new(Box::new(NoInterrupt)),
                    worker: Mutex::new(None),
                }),
            },
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Attach an abort handle so `close()` can unblock a pending read.
    pub fn with_interrupter<I: Interrupt + 'static>(self, interrupter: I) -> Self {
        if let Ok(mut slot) = self.handle.shared.interrupter.lock() {
            *slot = Box::new(interrupter);
        }
        self
    }

    /// A handle that can close the pump, including before it is started.
    pub fn handle(&self) -> PumpHandle {
        self.handle.clone()
    }

    /// Spawn the worker thread and return immediately.
    pub fn start(self) -> PumpHandle {
        let handle = self.handle.clone();
        handle.shared.state.advance(PumpState::Running);

        let worker = Worker {
            source: self.source,
            on_chunk: self.on_chunk,
            on_finish: self.on_finish,
            buffer_size: self.buffer_size,
            shared: handle.shared.clone(),
        };
        let join = thread::spawn(move || worker.run());

        if let Ok(mut slot) = handle.shared.worker.lock() {
            *slot = Some(join);
        }
        handle
    }
}

/// Cloneable control handle for a [`StreamPump`].
#[derive(Clone)]
pub struct PumpHandle {
    shared: Arc<Shared>,
}

impl PumpHandle {
    /// Ask the pump to stop.
    ///
    /// Sets the cancellation flag, then interrupts a read that may be blocked
    /// in the worker. Safe from any thread, before `start()`, and after the
    /// pump has stopped. Only the first call has any effect.
    pub fn close(&self) {
        if !self.shared.cancel.cancel() {
            return;
        }
        if self.shared.state.get() != PumpState::Running {
            return;
        }
        let result = match self.shared.interrupter.lock() {
            Ok(interrupter) => interrupter.interrupt(),
            Err(_) => return,
        };
        if let Err(e) = result {
            debug!(error = %e, "failed to interrupt pending read");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn state(&self) -> PumpState {
        self.shared.state.get()
    }

    /// Block until the worker has exited. Returns immediately if the pump was
    /// never started or has already been joined.
    ///
    /// Must not be called from inside one of the pump's own sinks.
    pub fn join(&self) {
        let join = match self.shared.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(join) = join {
            let _ = join.join();
        }
    }
}

struct Worker {
    source: Box<dyn Read + Send>,
    on_chunk: ChunkSink,
    on_finish: CompletionSink,
    buffer_size: usize,
    shared: Arc<Shared>,
}

impl Worker {
    fn run(mut self) {
        let outcome = self.drain();
        self.release();
        report(&outcome);
        (self.on_finish)(outcome.success());
        self.shared.state.advance(PumpState::Stopped);
    }

    /// Drop the source and the abort handle so a socket does not outlive the
    /// loop while handles are still held.
    fn release(&mut self) {
        self.source = Box::new(io::empty());
        if let Ok(mut slot) = self.shared.interrupter.lock() {
            *slot = Box::new(NoInterrupt);
        }
    }

    fn drain(&mut self) -> PumpOutcome {
        let cancel = &self.shared.cancel;
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            if cancel.is_cancelled() {
                return PumpOutcome::Cancelled;
            }
            match self.source.read(&mut buffer) {
                // An interrupted socket reads as end-of-stream.
                Ok(0) if cancel.is_cancelled() => return PumpOutcome::Cancelled,
                Ok(0) => return PumpOutcome::Completed,
                Ok(_) if cancel.is_cancelled() => return PumpOutcome::Cancelled,
                Ok(n) => (self.on_chunk)(buffer[..n].to_vec()),
                Err(e) if cancel.is_cancelled() => {
                    debug!(error = %e, "read aborted by close");
                    return PumpOutcome::Cancelled;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return PumpOutcome::Failed(e),
            }
        }
    }
}

fn report(outcome: &PumpOutcome) {
    if outcome.severity() == Level::ERROR {
        if let PumpOutcome::Failed(e) = outcome {
            error!(error = %e, "error while pumping stream");
        }
        return;
    }
    match outcome {
        PumpOutcome::Cancelled => debug!("stream pump cancelled"),
        _ => debug!("stream pump reached end of stream"),
    }
}

/// Start a pump that forwards into an `mpsc` channel.
///
/// The receiver sees every chunk as [`PumpEvent::Chunk`] followed by exactly
/// one [`PumpEvent::Finished`].
pub fn pump_channel<R, I>(source: R, interrupter: I) -> (PumpHandle, Receiver<PumpEvent>)
where
    R: Read + Send + 'static,
    I: Interrupt + 'static,
{
    let (tx, rx) = mpsc::channel();
    let tx_done = tx.clone();

    let pump = StreamPump::new(
        source,
        move |chunk| {
            // Receiver may be dropped; ignore send errors.
            let _ = tx.send(PumpEvent::Chunk(chunk));
        },
        move |success| {
            let _ = tx_done.send(PumpEvent::Finished(success));
        },
    )
    .with_interrupter(interrupter);

    (pump.start(), rx)
}
