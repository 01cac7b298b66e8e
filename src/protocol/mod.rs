//! Request/response protocol between a host and the evaluation engine.
//!
//! Messages are JSON objects tagged by `"type"`:
//!
//! | direction | type | payload |
//! |---|---|---|
//! | host → engine | `ready` | none |
//! | engine → host | `ack` | none |
//! | host → engine | `run` | `state`, `algorithm` (`"search"` or `"learned"`), optional `trainingState`, optional `maxDepth` |
//! | host → engine | `random` | `state` |
//! | engine → host | `move` | `move` (or `null` when no direction changes the grid), optional `trainingState` |
//! | engine → host | `error` | `message` |
//!
//! [`Orchestrator`] is the synchronous state machine; [`EvaluationWorker`]
//! runs one on its own thread and talks to it over channels.
//!
//! ```
//! use ai_2048_worker::protocol::{Algorithm, Request};
//!
//! let req = Request::from_json(r#"{"type":"ready"}"#).unwrap();
//! assert_eq!(req, Request::Ready);
//! assert_eq!("tree".parse::<Algorithm>().unwrap(), Algorithm::Search);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{AgentError, TrainingState};
use crate::engine::{GameState, Move};

mod orchestrator;
mod worker;

pub use orchestrator::{EngineConfig, Orchestrator, Phase};
pub use worker::EvaluationWorker;

/// Which move picker serves a `run` request.
///
/// Decoded with [`FromStr`], which also accepts legacy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Bounded lookahead search.
    Search,
    /// Q-learning agent.
    Learned,
}

impl FromStr for Algorithm {
    type Err = ProtocolError;

    /// Accepts `search`/`tree` and `learned`/`rnn`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "search" | "tree" => Ok(Algorithm::Search),
            "learned" | "rnn" => Ok(Algorithm::Learned),
            _ => Err(ProtocolError::UnrecognizedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Search => write!(f, "search"),
            Algorithm::Learned => write!(f, "learned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub state: GameState,
    pub algorithm: Algorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_state: Option<TrainingState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
}

impl RunRequest {
    pub fn new(state: GameState, algorithm: Algorithm) -> Self {
        RunRequest { state, algorithm, training_state: None, max_depth: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    Ready,
    Run(RunRequest),
    Random { state: GameState },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Ack,
    Move {
        #[serde(rename = "move")]
        mv: Option<Move>,
        #[serde(rename = "trainingState", default, skip_serializing_if = "Option::is_none")]
        training_state: Option<TrainingState>,
    },
    Error { message: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("unrecognized message type: {0}")]
    UnrecognizedMessage(String),
    #[error("unrecognized algorithm: {0}")]
    UnrecognizedAlgorithm(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("engine is not ready; send a ready message first")]
    NotReady,
    #[error("an evaluation is already in flight")]
    Busy,
    #[error("evaluation worker has shut down")]
    Disconnected,
    #[error("{0}")]
    Agent(#[from] AgentError),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self { ProtocolError::Malformed(e.to_string()) }
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, ProtocolError> {
    match value.get(name) {
        Some(Value::Null) | None => Err(ProtocolError::Malformed(format!("missing field `{name}`"))),
        Some(v) => Ok(v),
    }
}

fn optional<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value.get(name).filter(|v| !v.is_null())
}

impl Request {
    /// Decode a host message.
    ///
    /// The message type is checked before the payload, so an unknown type
    /// is reported as such even if the rest of the message is garbage.
    pub fn from_json(text: &str) -> Result<Request, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = field(&value, "type")?
            .as_str()
            .ok_or_else(|| ProtocolError::Malformed("`type` must be a string".into()))?;
        match kind {
            "ready" => Ok(Request::Ready),
            "random" => {
                let state = GameState::deserialize(field(&value, "state")?)?;
                Ok(Request::Random { state })
            }
            "run" => {
                let algorithm = field(&value, "algorithm")?
                    .as_str()
                    .ok_or_else(|| ProtocolError::Malformed("`algorithm` must be a string".into()))?
                    .parse::<Algorithm>()?;
                let state = GameState::deserialize(field(&value, "state")?)?;
                let training_state = match optional(&value, "trainingState") {
                    Some(v) => {
                        let ts = TrainingState::deserialize(v)?;
                        ts.validate(ts.shape()).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
                        Some(ts)
                    }
                    None => None,
                };
                let max_depth = match optional(&value, "maxDepth") {
                    Some(v) => {
                        let d = v
                            .as_u64()
                            .ok_or_else(|| ProtocolError::Malformed("`maxDepth` must be a non-negative integer".into()))?;
                        Some(u32::try_from(d).unwrap_or(u32::MAX))
                    }
                    None => None,
                };
                Ok(Request::Run(RunRequest { state, algorithm, training_state, max_depth }))
            }
            other => Err(ProtocolError::UnrecognizedMessage(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> { Ok(serde_json::to_string(self)?) }

    /// Whether this request runs an evaluation (and therefore occupies the worker).
    #[inline]
    pub(crate) fn evaluates(&self) -> bool { !matches!(self, Request::Ready) }
}

impl Response {
    pub fn error(err: &ProtocolError) -> Self { Response::Error { message: err.to_string() } }

    pub fn from_json(text: &str) -> Result<Response, ProtocolError> { Ok(serde_json::from_str(text)?) }

    pub fn to_json(&self) -> Result<String, ProtocolError> { Ok(serde_json::to_string(self)?) }

    /// The chosen move, if this is a `move` response carrying one.
    pub fn chosen_move(&self) -> Option<Move> {
        match self {
            Response::Move { mv, .. } => *mv,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"{"grid":{"size":4,"cells":[[null,null,null,null],[null,null,null,null],[null,null,null,null],[null,null,null,null]]},"score":0,"over":false,"won":false}"#;

    #[test]
    fn algorithm_names() {
        assert_eq!("search".parse::<Algorithm>().unwrap(), Algorithm::Search);
        assert_eq!("Learned".parse::<Algorithm>().unwrap(), Algorithm::Learned);
        assert_eq!("RNN".parse::<Algorithm>().unwrap(), Algorithm::Learned);
        assert_eq!(
            "minimax".parse::<Algorithm>().unwrap_err(),
            ProtocolError::UnrecognizedAlgorithm("minimax".into())
        );
    }

    #[test]
    fn decodes_run() {
        let text = format!(r#"{{"type":"run","algorithm":"search","maxDepth":2,"state":{STATE}}}"#);
        match Request::from_json(&text).unwrap() {
            Request::Run(run) => {
                assert_eq!(run.algorithm, Algorithm::Search);
                assert_eq!(run.max_depth, Some(2));
                assert!(run.training_state.is_none());
                assert_eq!(run.state, GameState::default());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_training_state_is_absent() {
        let text = format!(r#"{{"type":"run","algorithm":"learned","trainingState":null,"state":{STATE}}}"#);
        let Request::Run(run) = Request::from_json(&text).unwrap() else { panic!("not a run") };
        assert!(run.training_state.is_none());
    }

    #[test]
    fn unknown_type_and_algorithm() {
        assert_eq!(
            Request::from_json(r#"{"type":"launch"}"#).unwrap_err(),
            ProtocolError::UnrecognizedMessage("launch".into())
        );
        let text = format!(r#"{{"type":"run","algorithm":"magic","state":{STATE}}}"#);
        assert_eq!(Request::from_json(&text).unwrap_err(), ProtocolError::UnrecognizedAlgorithm("magic".into()));
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(Request::from_json("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Request::from_json(r#"{"kind":"ready"}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Request::from_json(r#"{"type":"run","algorithm":"search"}"#), Err(ProtocolError::Malformed(_))));
        let text = format!(r#"{{"type":"run","algorithm":"search","maxDepth":-1,"state":{STATE}}}"#);
        assert!(matches!(Request::from_json(&text), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn oversized_training_state_is_malformed() {
        use crate::agent::{AgentConfig, LearningAgent};
        let blob = LearningAgent::new(AgentConfig { hidden_units: 3, ..AgentConfig::default() }).export();
        let mut blob = serde_json::to_value(&blob).unwrap();
        blob["network"]["hidden"] = serde_json::json!(1u64 << 60);
        let text = format!(r#"{{"type":"run","algorithm":"learned","trainingState":{blob},"state":{STATE}}}"#);
        assert!(matches!(Request::from_json(&text), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn request_survives_its_own_encoding() {
        let state = GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 12).unwrap();
        let mut run = RunRequest::new(state, Algorithm::Learned);
        run.max_depth = Some(4);
        let req = Request::Run(run);
        assert_eq!(Request::from_json(&req.to_json().unwrap()).unwrap(), req);
    }

    #[test]
    fn response_wire_shape() {
        let resp = Response::Move { mv: Some(Move::Left), training_state: None };
        assert_eq!(resp.to_json().unwrap(), r#"{"type":"move","move":"left"}"#);
        assert_eq!(Response::Ack.to_json().unwrap(), r#"{"type":"ack"}"#);
        let none = Response::from_json(r#"{"type":"move","move":null}"#).unwrap();
        assert_eq!(none, Response::Move { mv: None, training_state: None });
        assert_eq!(none.chosen_move(), None);
    }
}
