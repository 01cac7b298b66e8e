//! ai-2048-worker: move evaluation for 2048, served over a request/response protocol
//!
//! This crate provides:
//! - A compact `Board` plus the host-facing `GameState`, and a pure move simulator (`engine`)
//! - A bounded lookahead search with positional weighting, single-threaded and parallel (`search`)
//! - A Q-learning move picker whose training state travels with each request (`agent`)
//! - Training state persistence as JSON and as a checksummed binary file (`serialization`)
//! - The ready/run protocol, its state machine and a thread-backed worker (`protocol`)
//!
//! Quick start:
//! ```
//! use ai_2048_worker::engine::{self as GameEngine, simulate, GameState, Move};
//! use ai_2048_worker::protocol::{Algorithm, EvaluationWorker, Request, Response};
//!
//! // One-time table init
//! GameEngine::new();
//!
//! let state = GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
//! let out = simulate(&state, Move::Left);
//! assert!(out.moved);
//! assert_eq!(out.score_delta, 4);
//!
//! // Off-thread evaluation
//! let worker = EvaluationWorker::default();
//! worker.send(Request::Ready).unwrap();
//! assert_eq!(worker.recv().unwrap(), Response::Ack);
//! let resp = worker.request_move(state, Algorithm::Search, None, Some(2)).unwrap();
//! assert!(resp.chosen_move().is_some());
//! ```
//!
pub mod engine;
pub mod search;
pub mod agent;
pub mod serialization;
pub mod protocol;
pub mod logging;
