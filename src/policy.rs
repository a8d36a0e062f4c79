use std::rc::Rc;

use crate::agent::Agent;
use crate::environment::{Action, Environment, State};
use crate::rl::SharedQValues;

/// Picks uniformly among the legal actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl RandomPolicy {
    pub fn new() -> Self {
        Self
    }
}

fn random_action<E: Environment + ?Sized>(env: &E, state: State) -> Option<Action> {
    let actions = env.legal_actions(state);
    if actions.is_empty() {
        return None;
    }
    Some(actions[env.sample_index(actions.len())])
}

impl<E: Environment + ?Sized> Agent<E> for RandomPolicy {
    fn choose_action(&mut self, env: &E, state: State) -> Option<Action> {
        random_action(env, state)
    }
}

/// Explores with probability `epsilon`, otherwise takes the action with the
/// highest Q-value in a table it reads but never writes.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    q_values: SharedQValues,
    epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(q_values: SharedQValues, epsilon: f64) -> Self {
        Self { q_values, epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn q_values(&self) -> SharedQValues {
        Rc::clone(&self.q_values)
    }

    pub fn greedy_action<E: Environment + ?Sized>(&self, env: &E, state: State) -> Option<Action> {
        self.q_values
            .borrow()
            .greedy_action(state, &env.legal_actions(state))
    }
}

impl<E: Environment + ?Sized> Agent<E> for EpsilonGreedy {
    fn choose_action(&mut self, env: &E, state: State) -> Option<Action> {
        if env.sample_unit() < self.epsilon {
            random_action(env, state)
        } else {
            self.greedy_action(env, state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::CoffeeEnv;
    use crate::rl::QValues;
    use ndarray::Array2;

    fn env() -> CoffeeEnv {
        CoffeeEnv::new(Array2::from_elem((3, 3), 0.3), Some(17)).unwrap()
    }

    #[test]
    fn random_policy_only_picks_legal_actions() {
        let env = env();
        let mut policy = RandomPolicy::new();
        for pos in env.cells() {
            let state = State::Cell(pos);
            for _ in 0..20 {
                let action = policy.choose_action(&env, state).unwrap();
                assert!(env.is_legal(state, action));
            }
        }
        assert_eq!(policy.choose_action(&env, State::Terminal), None);
    }

    #[test]
    fn greedy_never_explores_with_zero_epsilon() {
        let env = env();
        let table = QValues::shared();
        let state = State::at(1, 1);
        table.borrow_mut().set(state, Action::Left, 0.8);
        table.borrow_mut().set(state, Action::Up, 0.4);
        let mut policy = EpsilonGreedy::new(table, 0.0);

        for _ in 0..1000 {
            assert_eq!(policy.choose_action(&env, state), Some(Action::Left));
        }
    }

    #[test]
    fn policy_does_not_write_the_table() {
        let env = env();
        let table = QValues::shared();
        let mut policy = EpsilonGreedy::new(Rc::clone(&table), 0.5);
        for _ in 0..100 {
            policy.choose_action(&env, env.initial_state());
        }
        assert!(table.borrow().is_empty());
    }
}
