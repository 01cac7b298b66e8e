//! Q-learning move picker.
//!
//! The agent reads the flattened grid, picks an action epsilon-greedily from
//! a small Q-network, scores the move with [`calculate_reward`] and feeds the
//! reward back for a learning step. Credit is assigned one step late: the
//! reward passed to `learn` is stored and used to train the *previous*
//! transition on the next call, once the follow-up state is known.
//!
//! Learning state is exported as a [`TrainingState`] after every step so a
//! caller can persist it and hand it back later to resume the same lineage.
//!
//! ```
//! use ai_2048_worker::agent::{AgentConfig, LearningAgent};
//! use ai_2048_worker::engine::GameState;
//!
//! let state = GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
//! let mut agent = LearningAgent::new(AgentConfig::default());
//! let choice = agent.choose_move(&state, None).unwrap();
//! assert_eq!(choice.training_state.steps(), 1);
//! ```

use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::engine::{GameState, Move};

mod network;
mod replay;
mod reward;

pub use network::{QNetwork, ShapeMismatch};
pub use replay::{Experience, ReplayMemory};
pub use reward::{calculate_reward, encode, flatten};

/// Number of network inputs: one per grid cell.
pub const NUM_STATES: usize = 16;
/// Number of actions: one per direction.
pub const NUM_ACTIONS: usize = 4;

/// Fixed learner hyperparameters.
///
/// - `gamma`: discount factor in `[0, 1)`.
/// - `epsilon`: probability of a random action.
/// - `alpha`: SGD learning rate.
/// - `experience_add_every`: store one transition every N learning steps.
/// - `experience_size`: replay memory capacity.
/// - `learning_steps_per_iteration`: replayed transitions per learning step.
/// - `tderror_clamp`: absolute clamp on the TD error.
/// - `hidden_units`: width of the hidden layer.
/// - `seed`: RNG seed for weight init, exploration and replay sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
    pub gamma: f64,
    pub epsilon: f64,
    pub alpha: f64,
    pub experience_add_every: u64,
    pub experience_size: usize,
    pub learning_steps_per_iteration: usize,
    pub tderror_clamp: f64,
    pub hidden_units: usize,
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            epsilon: 0.2,
            alpha: 0.005,
            experience_add_every: 1,
            experience_size: 100_000,
            learning_steps_per_iteration: 10,
            tderror_clamp: 1.0,
            hidden_units: 100,
            seed: 0x2048,
        }
    }
}

impl AgentConfig {
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) { (NUM_STATES, self.hidden_units, NUM_ACTIONS) }
}

/// Serialized learner parameters plus the number of learning steps taken.
///
/// Opaque to callers: hold it, persist it, and hand it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    steps: u64,
    network: QNetwork,
}

impl TrainingState {
    #[inline]
    pub fn steps(&self) -> u64 { self.steps }

    /// `(inputs, hidden, actions)` as declared by the stored network.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) { self.network.shape() }

    /// Check the weight buffers against `expected` and against their own declared shape.
    pub fn validate(&self, expected: (usize, usize, usize)) -> Result<(), ShapeMismatch> {
        self.network.validate(expected)
    }

    /// Whether this state can seed an agent built from `cfg`.
    pub fn fits(&self, cfg: &AgentConfig) -> bool { self.validate(cfg.shape()).is_ok() }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("training state does not fit this agent: {0}")]
    Shape(#[from] ShapeMismatch),
    #[error("policy produced action index {0} outside the move set")]
    ActionOutOfRange(usize),
}

/// A move picked by the agent together with its reward and the updated training state.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub mv: Move,
    pub reward: f64,
    pub training_state: TrainingState,
}

/// Previous/current step bookkeeping for delayed credit assignment.
#[derive(Debug, Clone, Default)]
struct Pending {
    s0: Option<Vec<f64>>,
    a0: Option<usize>,
    r0: Option<f64>,
    s1: Option<Vec<f64>>,
    a1: Option<usize>,
}

/// Epsilon-greedy Q-learning agent with experience replay.
pub struct LearningAgent {
    cfg: AgentConfig,
    network: QNetwork,
    memory: ReplayMemory,
    rng: StdRng,
    steps: u64,
    pending: Pending,
}

impl LearningAgent {
    /// Cold start with freshly initialised weights.
    pub fn new(cfg: AgentConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let (inputs, hidden, actions) = cfg.shape();
        let network = QNetwork::new(inputs, hidden, actions, &mut rng);
        LearningAgent {
            cfg,
            network,
            memory: ReplayMemory::new(cfg.experience_size),
            rng,
            steps: 0,
            pending: Pending::default(),
        }
    }

    /// Resume from an exported training state.
    pub fn from_training_state(cfg: AgentConfig, state: &TrainingState) -> Result<Self, AgentError> {
        let mut agent = Self::new(cfg);
        agent.reseed(state)?;
        Ok(agent)
    }

    /// Replace the learned parameters with `state`.
    ///
    /// Replay memory and pending transitions belong to the old lineage and are dropped.
    pub fn reseed(&mut self, state: &TrainingState) -> Result<(), AgentError> {
        state.validate(self.cfg.shape())?;
        self.network = state.network.clone();
        self.steps = state.steps;
        self.memory.clear();
        self.pending = Pending::default();
        info!("learning agent reseeded at step {}", state.steps);
        Ok(())
    }

    /// Export the current parameters.
    pub fn export(&self) -> TrainingState {
        TrainingState { steps: self.steps, network: self.network.clone() }
    }

    #[inline]
    pub fn steps(&self) -> u64 { self.steps }

    #[inline]
    pub fn config(&self) -> &AgentConfig { &self.cfg }

    /// Pick a move for `state`, learn from its reward, and export the updated parameters.
    ///
    /// A supplied `training` state reseeds the agent unless it is the agent's
    /// own latest export (same step count and weights), in which case learning
    /// continues in place with replay memory intact.
    pub fn choose_move(&mut self, state: &GameState, training: Option<&TrainingState>) -> Result<Choice, AgentError> {
        if let Some(training) = training {
            if training.steps != self.steps || training.network != self.network {
                self.reseed(training)?;
            }
        }
        let inputs = encode(state);
        let action = self.act(inputs);
        let mv = Move::from_index(action).ok_or(AgentError::ActionOutOfRange(action))?;
        let reward = calculate_reward(state, mv);
        self.learn(reward);
        debug!("agent step={} move={} reward={:.4}", self.steps, mv, reward);
        Ok(Choice { mv, reward, training_state: self.export() })
    }

    /// Epsilon-greedy action for `inputs`; shifts the pending transition window.
    pub fn act(&mut self, inputs: Vec<f64>) -> usize {
        let action = if self.rng.gen::<f64>() < self.cfg.epsilon {
            self.rng.gen_range(0..NUM_ACTIONS)
        } else {
            self.network.argmax(&inputs)
        };
        self.pending.s0 = self.pending.s1.take();
        self.pending.a0 = self.pending.a1.take();
        self.pending.s1 = Some(inputs);
        self.pending.a1 = Some(action);
        action
    }

    /// Record `reward` for the latest action and train on the previous transition.
    pub fn learn(&mut self, reward: f64) {
        if let (Some(r0), Some(s0), Some(a0), Some(s1)) =
            (self.pending.r0, self.pending.s0.clone(), self.pending.a0, self.pending.s1.clone())
        {
            if self.cfg.alpha > 0.0 {
                let exp = Experience { s0, a0, r0, s1 };
                self.learn_from(&exp);
                if self.steps % self.cfg.experience_add_every.max(1) == 0 {
                    self.memory.push(exp);
                }
                for _ in 0..self.cfg.learning_steps_per_iteration {
                    if let Some(replayed) = self.memory.sample(&mut self.rng).cloned() {
                        self.learn_from(&replayed);
                    }
                }
            }
        }
        self.pending.r0 = Some(reward);
        self.steps += 1;
    }

    fn learn_from(&mut self, exp: &Experience) {
        let target = exp.r0 + self.cfg.gamma * self.network.max_q(&exp.s1);
        let fwd = self.network.forward(&exp.s0);
        let clamp = self.cfg.tderror_clamp;
        let td_error = (fwd.q[exp.a0] - target).clamp(-clamp, clamp);
        self.network.backprop(&exp.s0, &fwd, exp.a0, td_error, self.cfg.alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: [[u32; 4]; 4]) -> GameState { GameState::from_rows(rows, 0).unwrap() }

    fn small() -> AgentConfig { AgentConfig { hidden_units: 8, experience_size: 32, ..AgentConfig::default() } }

    #[test]
    fn first_step_only_stores_the_reward() {
        let mut agent = LearningAgent::new(small());
        let before = agent.export();
        let choice = agent.choose_move(&state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]), None).unwrap();
        assert_eq!(choice.training_state.steps(), 1);
        // No previous transition yet, so the weights are untouched.
        assert_eq!(choice.training_state.network, before.network);
        assert!(agent.memory.is_empty());
    }

    #[test]
    fn second_step_trains_and_fills_memory() {
        let mut agent = LearningAgent::new(small());
        let s = state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let first = agent.choose_move(&s, None).unwrap();
        let second = agent.choose_move(&s, Some(&first.training_state)).unwrap();
        assert_eq!(second.training_state.steps(), 2);
        assert_ne!(second.training_state.network, first.training_state.network);
        assert_eq!(agent.memory.len(), 1);
    }

    #[test]
    fn same_seed_same_choices() {
        let s = state([[2, 4, 8, 2], [0, 2, 0, 0], [0; 4], [0; 4]]);
        let mut a = LearningAgent::new(small());
        let mut b = LearningAgent::new(small());
        for _ in 0..5 {
            let ca = a.choose_move(&s, None).unwrap();
            let cb = b.choose_move(&s, None).unwrap();
            assert_eq!(ca, cb);
        }
    }

    #[test]
    fn foreign_training_state_reseeds() {
        let s = state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut donor = LearningAgent::new(AgentConfig { seed: 99, ..small() });
        for _ in 0..3 {
            donor.choose_move(&s, None).unwrap();
        }
        let exported = donor.export();

        let mut agent = LearningAgent::new(small());
        agent.choose_move(&s, None).unwrap();
        let choice = agent.choose_move(&s, Some(&exported)).unwrap();
        assert_eq!(choice.training_state.steps(), exported.steps() + 1);
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let wide = LearningAgent::new(AgentConfig { hidden_units: 12, ..small() }).export();
        let mut agent = LearningAgent::new(small());
        let s = state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert!(matches!(agent.choose_move(&s, Some(&wide)), Err(AgentError::Shape(_))));
        assert!(LearningAgent::from_training_state(small(), &wide).is_err());
    }

    #[test]
    fn greedy_agent_follows_the_network() {
        let cfg = AgentConfig { epsilon: 0.0, alpha: 0.0, ..small() };
        let mut agent = LearningAgent::new(cfg);
        let s = state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let expected = agent.network.argmax(&encode(&s));
        let choice = agent.choose_move(&s, None).unwrap();
        assert_eq!(choice.mv.index(), expected);
    }
}
