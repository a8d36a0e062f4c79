//! Tabular Q-learning.
//!
//! The update blends the old estimate with the new sample,
//!
//! `Q(s,a) <- lr * Q(s,a) + (1 - lr) * (r + discount * max_a' Q(s',a'))`
//!
//! so `lr` weighs the past rather than the observation. It starts at the
//! configured value and decays as `1 / n^LEARNING_RATE_DECAY` with the number
//! of updates `n`, making the table increasingly conservative.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::agent::Agent;
use crate::environment::{Action, Environment, State};
use crate::policy::EpsilonGreedy;

/// Exponent of the learning-rate schedule.
pub const LEARNING_RATE_DECAY: f64 = 0.75;

/// Learning rate after `iterations` updates.
pub fn decayed_learning_rate(iterations: u64) -> f64 {
    1.0 / (iterations as f64).powf(LEARNING_RATE_DECAY)
}

/// Q-values keyed by (state, action). Pairs never written read as `0.0`.
#[derive(Debug, Clone, Default)]
pub struct QValues {
    values: HashMap<(State, Action), f64>,
}

/// A Q-table written by a learner and read by the policy acting on it.
pub type SharedQValues = Rc<RefCell<QValues>>;

impl QValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedQValues {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn get(&self, state: State, action: Action) -> f64 {
        self.values.get(&(state, action)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: State, action: Action, value: f64) {
        self.values.insert((state, action), value);
    }

    /// Highest Q-value among `actions`, `0.0` when there are none.
    pub fn max_q(&self, state: State, actions: &[Action]) -> f64 {
        if actions.is_empty() {
            return 0.0;
        }
        actions
            .iter()
            .map(|&action| self.get(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Action with the highest Q-value. On ties the earliest action in
    /// `actions` wins.
    pub fn greedy_action(&self, state: State, actions: &[Action]) -> Option<Action> {
        let mut best: Option<(Action, f64)> = None;
        for &action in actions {
            let q = self.get(state, action);
            match best {
                Some((_, best_q)) if q <= best_q => {}
                _ => best = Some((action, q)),
            }
        }
        best.map(|(action, _)| action)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Applies the Q-learning update to a shared table.
#[derive(Debug, Clone)]
pub struct QLearning {
    q_values: SharedQValues,
    learning_rate: f64,
    discount: f64,
    iterations: u64,
}

impl QLearning {
    pub fn new(learning_rate: f64, discount: f64) -> Self {
        Self::with_q_values(QValues::shared(), learning_rate, discount)
    }

    pub fn with_q_values(q_values: SharedQValues, learning_rate: f64, discount: f64) -> Self {
        Self {
            q_values,
            learning_rate,
            discount,
            iterations: 0,
        }
    }

    /// Handle on the table this learner writes.
    pub fn q_values(&self) -> SharedQValues {
        Rc::clone(&self.q_values)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Number of updates applied so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Learns from one observed transition and returns the new Q-value.
    pub fn update<E: Environment + ?Sized>(
        &mut self,
        env: &E,
        state: State,
        action: Action,
        next_state: State,
        reward: f64,
    ) -> f64 {
        let mut q_values = self.q_values.borrow_mut();
        let old_q = q_values.get(state, action);
        let max_next_q = if env.is_terminal(next_state) {
            0.0
        } else {
            q_values.max_q(next_state, &env.legal_actions(next_state))
        };
        let new_q = self.learning_rate * old_q
            + (1.0 - self.learning_rate) * (reward + self.discount * max_next_q);
        q_values.set(state, action, new_q);

        self.iterations += 1;
        self.learning_rate = decayed_learning_rate(self.iterations);
        new_q
    }
}

/// Acts epsilon-greedily on the table it learns.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    learner: QLearning,
    policy: EpsilonGreedy,
}

impl QLearningAgent {
    pub fn new(learning_rate: f64, discount: f64, epsilon: f64) -> Self {
        let learner = QLearning::new(learning_rate, discount);
        let policy = EpsilonGreedy::new(learner.q_values(), epsilon);
        Self { learner, policy }
    }

    pub fn learner(&self) -> &QLearning {
        &self.learner
    }

    pub fn policy(&self) -> &EpsilonGreedy {
        &self.policy
    }

    pub fn q_values(&self) -> SharedQValues {
        self.learner.q_values()
    }
}

impl<E: Environment + ?Sized> Agent<E> for QLearningAgent {
    fn choose_action(&mut self, env: &E, state: State) -> Option<Action> {
        self.policy.choose_action(env, state)
    }

    fn learn(&mut self, env: &E, state: State, action: Action, next_state: State, reward: f64) {
        self.learner.update(env, state, action, next_state, reward);
    }
}
