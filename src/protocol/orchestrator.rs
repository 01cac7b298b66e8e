use log::{debug, error, info, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::agent::{AgentConfig, LearningAgent};
use crate::engine::{self, simulate, GameState, Move};
use crate::search::{Lookahead, LookaheadParallel, SearchConfig};

use super::{Algorithm, ProtocolError, Request, Response, RunRequest};

/// Lifecycle of an orchestrator.
///
/// `Uninitialized -> LoadingDependencies -> Ready <-> Evaluating`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    LoadingDependencies,
    Ready,
    Evaluating,
}

/// Everything the orchestrator needs, fixed at construction.
///
/// - `search`: lookahead knobs; a request's `maxDepth` replaces `search.max_depth` for that request only.
/// - `agent`: learner hyperparameters for the lazily built agent.
/// - `seed`: RNG seed for `random` requests.
/// - `parallel_search`: use [`LookaheadParallel`] instead of [`Lookahead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub agent: AgentConfig,
    pub seed: u64,
    pub parallel_search: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { search: SearchConfig::default(), agent: AgentConfig::default(), seed: 0x2048, parallel_search: false }
    }
}

enum Searcher {
    Sequential(Lookahead),
    Parallel(LookaheadParallel),
}

impl Searcher {
    fn best_move_to_depth(&mut self, state: &GameState, depth: u32) -> Option<Move> {
        match self {
            Searcher::Sequential(s) => s.best_move_to_depth(state, depth),
            Searcher::Parallel(s) => s.best_move_to_depth(state, depth),
        }
    }
}

/// Synchronous request handler.
///
/// Owns the search engine, the (lazily built) learning agent and the RNG
/// for random moves; one request is processed at a time and every request
/// gets exactly one response.
pub struct Orchestrator {
    cfg: EngineConfig,
    phase: Phase,
    searcher: Option<Searcher>,
    agent: Option<LearningAgent>,
    rng: StdRng,
}

impl Orchestrator {
    pub fn new(cfg: EngineConfig) -> Self {
        Orchestrator { cfg, phase: Phase::Uninitialized, searcher: None, agent: None, rng: StdRng::seed_from_u64(cfg.seed) }
    }

    #[inline]
    pub fn phase(&self) -> Phase { self.phase }

    #[inline]
    pub fn config(&self) -> &EngineConfig { &self.cfg }

    /// The learning agent, once a `learned` request has created it.
    #[inline]
    pub fn agent(&self) -> Option<&LearningAgent> { self.agent.as_ref() }

    /// Decode and handle a JSON message; decoding failures become error responses.
    pub fn handle_json(&mut self, text: &str) -> Response {
        match Request::from_json(text) {
            Ok(req) => self.handle(req),
            Err(e) => {
                warn!("rejected message: {e}");
                Response::error(&e)
            }
        }
    }

    pub fn handle(&mut self, req: Request) -> Response {
        match req {
            Request::Ready => {
                self.load();
                Response::Ack
            }
            Request::Run(run) => self.evaluate(|this| this.run(run)),
            Request::Random { state } => self.evaluate(|this| Ok(this.random(&state))),
        }
    }

    fn load(&mut self) {
        if self.phase != Phase::Uninitialized {
            debug!("ready received in phase {:?}; acknowledging again", self.phase);
            return;
        }
        self.phase = Phase::LoadingDependencies;
        engine::new();
        let searcher = if self.cfg.parallel_search {
            Searcher::Parallel(LookaheadParallel::with_config(self.cfg.search))
        } else {
            Searcher::Sequential(Lookahead::with_config(self.cfg.search))
        };
        self.searcher = Some(searcher);
        self.phase = Phase::Ready;
        info!("engine ready (parallel_search={})", self.cfg.parallel_search);
    }

    fn evaluate<F>(&mut self, f: F) -> Response
    where
        F: FnOnce(&mut Self) -> Result<Response, ProtocolError>,
    {
        if self.phase != Phase::Ready {
            warn!("evaluation requested in phase {:?}", self.phase);
            return Response::error(&ProtocolError::NotReady);
        }
        self.phase = Phase::Evaluating;
        let resp = f(self).unwrap_or_else(|e| {
            error!("evaluation failed: {e}");
            Response::error(&e)
        });
        self.phase = Phase::Ready;
        resp
    }

    fn run(&mut self, run: RunRequest) -> Result<Response, ProtocolError> {
        debug!("run algorithm={} score={} maxDepth={:?}", run.algorithm, run.state.score, run.max_depth);
        match run.algorithm {
            Algorithm::Search => {
                let depth = run.max_depth.unwrap_or(self.cfg.search.max_depth);
                let searcher = self.searcher.as_mut().ok_or(ProtocolError::NotReady)?;
                let mv = searcher.best_move_to_depth(&run.state, depth);
                Ok(Response::Move { mv, training_state: None })
            }
            Algorithm::Learned => {
                let cfg = self.cfg.agent;
                let agent = self.agent.get_or_insert_with(|| {
                    info!("building learning agent ({} hidden units)", cfg.hidden_units);
                    LearningAgent::new(cfg)
                });
                let choice = agent.choose_move(&run.state, run.training_state.as_ref())?;
                Ok(Response::Move { mv: Some(choice.mv), training_state: Some(choice.training_state) })
            }
        }
    }

    fn random(&mut self, state: &GameState) -> Response {
        let legal: Vec<Move> = Move::ALL.into_iter().filter(|&dir| simulate(state, dir).moved).collect();
        let mv = legal.choose(&mut self.rng).copied();
        Response::Move { mv, training_state: None }
    }
}

impl Default for Orchestrator {
    fn default() -> Self { Self::new(EngineConfig::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: [[u32; 4]; 4]) -> GameState { GameState::from_rows(rows, 0).unwrap() }

    fn ready() -> Orchestrator {
        let mut orch = Orchestrator::default();
        assert_eq!(orch.handle(Request::Ready), Response::Ack);
        orch
    }

    #[test]
    fn lifecycle() {
        let mut orch = Orchestrator::default();
        assert_eq!(orch.phase(), Phase::Uninitialized);
        let run = Request::Run(RunRequest::new(state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]), Algorithm::Search));
        assert!(matches!(orch.handle(run.clone()), Response::Error { .. }));
        assert_eq!(orch.phase(), Phase::Uninitialized);

        assert_eq!(orch.handle(Request::Ready), Response::Ack);
        assert_eq!(orch.phase(), Phase::Ready);
        assert!(orch.handle(run).chosen_move().is_some());
        assert_eq!(orch.phase(), Phase::Ready);
        // A repeated handshake is harmless.
        assert_eq!(orch.handle(Request::Ready), Response::Ack);
    }

    #[test]
    fn search_honours_max_depth() {
        let mut orch = ready();
        // Only Right changes this grid.
        let s = state([[2, 4, 8, 0], [4, 8, 16, 0], [2, 4, 8, 0], [4, 8, 16, 0]]);
        let mut run = RunRequest::new(s, Algorithm::Search);
        run.max_depth = Some(1);
        assert_eq!(orch.handle(Request::Run(run)).chosen_move(), Some(Move::Right));
    }

    #[test]
    fn learned_returns_training_state_and_keeps_agent() {
        let mut orch = ready();
        let s = state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let first = orch.handle(Request::Run(RunRequest::new(s, Algorithm::Learned)));
        let Response::Move { mv: Some(_), training_state: Some(ts) } = first else { panic!("expected a learned move") };
        assert_eq!(ts.steps(), 1);

        let mut run = RunRequest::new(s, Algorithm::Learned);
        run.training_state = Some(ts);
        let Response::Move { training_state: Some(next), .. } = orch.handle(Request::Run(run)) else { panic!("expected a learned move") };
        assert_eq!(next.steps(), 2);
        assert_eq!(orch.agent().map(|a| a.steps()), Some(2));
    }

    #[test]
    fn incompatible_training_state_is_an_error() {
        let mut orch = ready();
        let foreign = LearningAgent::new(AgentConfig { hidden_units: 3, ..AgentConfig::default() }).export();
        let mut run = RunRequest::new(state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]), Algorithm::Learned);
        run.training_state = Some(foreign);
        assert!(matches!(orch.handle(Request::Run(run)), Response::Error { .. }));
        assert_eq!(orch.phase(), Phase::Ready);
    }

    #[test]
    fn random_picks_a_legal_move() {
        let mut orch = ready();
        let s = state([[2, 4, 8, 0], [4, 8, 16, 0], [2, 4, 8, 0], [4, 8, 16, 0]]);
        for _ in 0..8 {
            assert_eq!(orch.handle(Request::Random { state: s }).chosen_move(), Some(Move::Right));
        }
        let stuck = state([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert_eq!(orch.handle(Request::Random { state: stuck }), Response::Move { mv: None, training_state: None });
    }

    #[test]
    fn bad_json_keeps_engine_ready() {
        let mut orch = ready();
        assert!(matches!(orch.handle_json(r#"{"type":"dance"}"#), Response::Error { .. }));
        assert_eq!(orch.phase(), Phase::Ready);
    }

    #[test]
    fn parallel_search_agrees() {
        let mut seq = ready();
        let mut par = Orchestrator::new(EngineConfig { parallel_search: true, ..EngineConfig::default() });
        par.handle(Request::Ready);
        let s = state([[2, 2, 4, 8], [0, 4, 0, 0], [0, 0, 2, 0], [0; 4]]);
        let req = Request::Run(RunRequest::new(s, Algorithm::Search));
        assert_eq!(seq.handle(req.clone()), par.handle(req));
    }
}
