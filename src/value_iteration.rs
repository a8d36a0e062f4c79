//! Value iteration over the full transition model.

use std::collections::HashMap;

use ndarray::Array2;
use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::environment::{Action, Model, State};

/// Planning stops once no state value moves by more than this in a sweep.
pub const CONVERGENCE_THRESHOLD: f64 = 0.001;

/// Planner holding one value per state.
///
/// Terminal states keep value `0.0`. Before [`ValueIteration::plan`] every
/// value reads as zero, so the extracted policy is degenerate.
#[derive(Debug, Clone)]
pub struct ValueIteration {
    discount: f64,
    threshold: f64,
    values: HashMap<State, f64>,
}

impl ValueIteration {
    /// `discount` must be below 1 for planning to terminate.
    pub fn new(discount: f64) -> Self {
        Self {
            discount,
            threshold: CONVERGENCE_THRESHOLD,
            values: HashMap::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn value(&self, state: State) -> f64 {
        self.values.get(&state).copied().unwrap_or(0.0)
    }

    /// Resets every value to zero and sweeps until convergence. Returns the
    /// number of sweeps.
    pub fn plan<M: Model + ?Sized>(&mut self, env: &M) -> usize {
        self.values = env.all_states().into_iter().map(|s| (s, 0.0)).collect();
        let mut sweeps = 0;
        loop {
            let max_diff = self.sweep(env);
            sweeps += 1;
            debug!(sweeps, max_diff, "value iteration sweep");
            if max_diff <= self.threshold {
                break;
            }
        }
        info!(sweeps, start_value = self.value(env.initial_state()), "value iteration converged");
        sweeps
    }

    /// One synchronous Bellman sweep over the non-terminal states, computed
    /// from the values as they stood before the sweep. Returns the largest
    /// absolute change.
    pub fn sweep<M: Model + ?Sized>(&mut self, env: &M) -> f64 {
        let updated: Vec<(State, f64)> = env
            .all_states()
            .into_iter()
            .filter(|&state| !env.is_terminal(state))
            .map(|state| {
                let value = self.best_action(env, state).map_or(0.0, |(_, value)| value);
                (state, value)
            })
            .collect();

        let max_diff = updated
            .iter()
            .map(|&(state, value)| OrderedFloat((value - self.value(state)).abs()))
            .max()
            .map_or(0.0, |diff| diff.into_inner());
        self.values.extend(updated);
        max_diff
    }

    /// `reward(s,a) + discount * sum_{s'} p(s'|s,a) V(s')`
    pub fn action_value<M: Model + ?Sized>(&self, env: &M, state: State, action: Action) -> f64 {
        let expected: f64 = env
            .legal_transitions(state, action)
            .iter()
            .map(|t| t.probability * self.value(t.state))
            .sum();
        env.reward(state, action) + self.discount * expected
    }

    // Strict comparison keeps the first action in canonical order on ties.
    fn best_action<M: Model + ?Sized>(&self, env: &M, state: State) -> Option<(Action, f64)> {
        let mut best: Option<(Action, f64)> = None;
        for action in env.legal_actions(state) {
            let value = self.action_value(env, state, action);
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((action, value)),
            }
        }
        best
    }

    /// The greedy action under the current values, `None` in terminal states.
    pub fn policy<M: Model + ?Sized>(&self, env: &M, state: State) -> Option<Action> {
        if env.is_terminal(state) {
            return None;
        }
        self.best_action(env, state).map(|(action, _)| action)
    }

    /// State values laid out on the grid.
    pub fn value_grid<M: Model + ?Sized>(&self, env: &M) -> Array2<f64> {
        Array2::from_shape_fn((env.rows(), env.cols()), |(row, col)| {
            self.value(State::at(row, col))
        })
    }
}

impl<M: Model + ?Sized> Agent<M> for ValueIteration {
    fn choose_action(&mut self, env: &M, state: State) -> Option<Action> {
        self.policy(env, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{CoffeeEnv, Environment, OpenCoffeeEnv};
    use float_eq::*;
    use ndarray::arr2;

    #[test]
    fn unplanned_values_are_zero() {
        let env = OpenCoffeeEnv::new(CoffeeEnv::random(2, 2, Some(1)).unwrap());
        let planner = ValueIteration::new(0.9);
        for state in env.all_states() {
            assert_eq!(planner.value(state), 0.0);
        }
        // Every move ties at zero, so the first legal one wins.
        assert_eq!(planner.policy(&env, env.initial_state()), Some(Action::Down));
    }

    #[test]
    fn sweep_uses_values_from_before_the_sweep() {
        let env = OpenCoffeeEnv::new(CoffeeEnv::new(arr2(&[[0.0, 0.0, 0.0]]), None).unwrap());
        let mut planner = ValueIteration::new(0.5);

        planner.sweep(&env);
        assert_eq!(planner.value(State::at(0, 2)), 1.0);
        assert_eq!(planner.value(State::at(0, 1)), 0.0);

        planner.sweep(&env);
        assert_eq!(planner.value(State::at(0, 1)), 0.5);
        assert_eq!(planner.value(State::at(0, 0)), 0.0);
    }

    #[test]
    fn spill_risk_lowers_values() {
        let env = OpenCoffeeEnv::new(
            CoffeeEnv::new(arr2(&[[0.0, 0.5], [0.0, 0.0]]), None).unwrap(),
        );
        let mut planner = ValueIteration::new(0.9);
        planner.plan(&env);

        // Going right risks a spill, going down does not.
        assert_eq!(planner.policy(&env, State::at(0, 0)), Some(Action::Down));
        assert_float_eq!(planner.value(State::at(1, 0)), 0.9, abs <= 1e-9);
        assert_float_eq!(planner.value(State::at(0, 0)), 0.81, abs <= 1e-9);
        assert_float_eq!(
            planner.action_value(&env, State::at(0, 0), Action::Right),
            0.9 * 0.5 * 0.9,
            abs <= 1e-9
        );
        assert_eq!(planner.value(State::Terminal), 0.0);
    }

    #[test]
    fn value_grid_matches_state_values() {
        let env = OpenCoffeeEnv::new(CoffeeEnv::random(2, 3, Some(4)).unwrap());
        let mut planner = ValueIteration::new(0.8);
        planner.plan(&env);
        let grid = planner.value_grid(&env);
        assert_eq!(grid.dim(), (2, 3));
        for pos in env.cells() {
            assert_eq!(grid[[pos.row, pos.col]], planner.value(State::Cell(pos)));
        }
        assert_eq!(grid[[1, 2]], 1.0);
    }
}
