use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::agent::TrainingState;
use crate::engine::GameState;

use super::{Algorithm, EngineConfig, Orchestrator, ProtocolError, Request, Response, RunRequest};

enum Envelope {
    Request(Request),
    /// A host message that failed to decode; answered with an error in order.
    Rejected(ProtocolError),
    Shutdown,
}

/// An [`Orchestrator`] running on its own thread.
///
/// Requests go in with [`send`](Self::send) and responses come back, one per
/// request and in order, via [`recv`](Self::recv) or [`try_recv`](Self::try_recv).
/// Only one evaluation may be in flight: a second `run`/`random` sent before
/// the previous response was received is refused with [`ProtocolError::Busy`].
pub struct EvaluationWorker {
    handle: Option<JoinHandle<()>>,
    tx_req: Sender<Envelope>,
    /// Each response is tagged with whether it ends an evaluation.
    rx_resp: Receiver<(Response, bool)>,
    busy: AtomicBool,
}

impl EvaluationWorker {
    pub fn new(cfg: EngineConfig) -> Self {
        let (tx_req, rx_req) = mpsc::channel::<Envelope>();
        let (tx_resp, rx_resp) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut orchestrator = Orchestrator::new(cfg);

            for envelope in rx_req {
                let response = match envelope {
                    Envelope::Request(req) => {
                        let evaluates = req.evaluates();
                        (orchestrator.handle(req), evaluates)
                    }
                    Envelope::Rejected(err) => (Response::error(&err), false),
                    Envelope::Shutdown => break,
                };
                if tx_resp.send(response).is_err() {
                    break; // host dropped the receiver
                }
            }
            debug!("evaluation worker exiting");
        });

        Self { handle: Some(handle), tx_req, rx_resp, busy: AtomicBool::new(false) }
    }

    /// Queue a request; the matching response arrives on the response channel.
    ///
    /// A worker thread that has exited (or panicked) reports `Disconnected`.
    pub fn send(&self, req: Request) -> Result<(), ProtocolError> {
        if self.handle.as_ref().map_or(true, JoinHandle::is_finished) {
            return Err(ProtocolError::Disconnected);
        }
        let evaluates = req.evaluates();
        if evaluates && self.busy.swap(true, Ordering::AcqRel) {
            warn!("refusing request while an evaluation is in flight");
            return Err(ProtocolError::Busy);
        }
        self.tx_req.send(Envelope::Request(req)).map_err(|_| {
            if evaluates {
                self.busy.store(false, Ordering::Release);
            }
            ProtocolError::Disconnected
        })
    }

    /// Queue a JSON host message.
    ///
    /// A message that fails to decode is still answered, in order, with an
    /// error response; only `Busy` and `Disconnected` are returned here.
    pub fn send_json(&self, text: &str) -> Result<(), ProtocolError> {
        match Request::from_json(text) {
            Ok(req) => self.send(req),
            Err(err) => {
                warn!("rejected message: {err}");
                self.tx_req.send(Envelope::Rejected(err)).map_err(|_| ProtocolError::Disconnected)
            }
        }
    }

    /// Block until the next response.
    pub fn recv(&self) -> Result<Response, ProtocolError> {
        let tagged = self.rx_resp.recv().map_err(|_| ProtocolError::Disconnected)?;
        Ok(self.settle(tagged))
    }

    pub fn try_recv(&self) -> Option<Response> { self.rx_resp.try_recv().ok().map(|t| self.settle(t)) }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Response>, ProtocolError> {
        match self.rx_resp.recv_timeout(timeout) {
            Ok(tagged) => Ok(Some(self.settle(tagged))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ProtocolError::Disconnected),
        }
    }

    /// The evaluation slot frees up once its response reaches the host.
    fn settle(&self, (response, evaluated): (Response, bool)) -> Response {
        if evaluated {
            self.busy.store(false, Ordering::Release);
        }
        response
    }

    /// Whether a `run`/`random` request is awaiting its response.
    #[inline]
    pub fn is_busy(&self) -> bool { self.busy.load(Ordering::Acquire) }

    /// Send a `run` request and wait for its response.
    pub fn request_move(
        &self,
        state: GameState,
        algorithm: Algorithm,
        training_state: Option<TrainingState>,
        max_depth: Option<u32>,
    ) -> Result<Response, ProtocolError> {
        let run = RunRequest { state, algorithm, training_state, max_depth };
        self.send(Request::Run(run))?;
        self.recv()
    }
}

impl Default for EvaluationWorker {
    fn default() -> Self { Self::new(EngineConfig::default()) }
}

impl Drop for EvaluationWorker {
    fn drop(&mut self) {
        // An in-flight evaluation runs to completion before the shutdown is seen.
        self.tx_req.send(Envelope::Shutdown).ok();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
