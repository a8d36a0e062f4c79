use std::rc::Rc;

use coffee_world::rl::decayed_learning_rate;
use coffee_world::{
    run_episode, run_episodes, Action, CoffeeEnv, Environment, QLearning, QLearningAgent, QValues,
    State,
};
use float_eq::assert_float_eq;
use ndarray::{arr2, Array2};

#[test]
fn first_update_matches_hand_computation() {
    let env = CoffeeEnv::new(Array2::zeros((1, 2)), Some(1)).unwrap();
    let mut learner = QLearning::new(0.5, 0.9);

    let new_q = learner.update(&env, env.coffee_state(), Action::Drink, State::Terminal, 1.0);

    // 0.5 * 0 + 0.5 * (1.0 + 0.9 * 0)
    assert_float_eq!(new_q, 0.5, abs <= 1e-12);
}

#[test]
fn schedule_values() {
    assert_float_eq!(decayed_learning_rate(1), 1.0, abs <= 1e-12);
    assert_float_eq!(decayed_learning_rate(16), 0.125, abs <= 1e-12);
}

#[test]
fn learner_and_policy_share_one_table() {
    let env = CoffeeEnv::new(Array2::zeros((2, 2)), Some(4)).unwrap();
    let agent = QLearningAgent::new(1.0, 0.9, 0.1);
    assert!(Rc::ptr_eq(&agent.q_values(), &agent.policy().q_values()));

    let table = QValues::shared();
    let mut learner = QLearning::with_q_values(Rc::clone(&table), 0.0, 0.9);
    learner.update(&env, env.coffee_state(), Action::Drink, State::Terminal, 1.0);
    assert_eq!(table.borrow().get(env.coffee_state(), Action::Drink), 1.0);
}

#[test]
fn terminal_next_state_contributes_nothing() {
    let env = CoffeeEnv::new(Array2::zeros((2, 2)), Some(4)).unwrap();
    let table = QValues::shared();
    table.borrow_mut().set(State::Terminal, Action::Up, 10.0);
    let mut learner = QLearning::with_q_values(Rc::clone(&table), 0.0, 0.9);

    let new_q = learner.update(&env, State::at(0, 0), Action::Right, State::Terminal, 0.0);
    assert_eq!(new_q, 0.0);
}

#[test]
fn learned_policy_avoids_spills() {
    // Stepping onto the top row always spills; the safe route goes down first.
    let env = CoffeeEnv::new(arr2(&[[0.0, 1.0, 1.0], [0.0, 0.0, 0.0]]), Some(2024)).unwrap();
    let mut agent = QLearningAgent::new(1.0, 0.9, 0.3);
    run_episodes(&env, &mut agent, 5_000, 0.9);

    let q = agent.q_values();
    let q = q.borrow();
    let start = env.initial_state();
    assert_eq!(q.get(start, Action::Right), 0.0);
    assert!(q.get(start, Action::Down) > 0.5);
    assert_float_eq!(q.get(env.coffee_state(), Action::Drink), 1.0, abs <= 0.01);
}

#[test]
fn episodes_always_terminate_in_a_slippery_world() {
    let env = CoffeeEnv::random(3, 3, Some(71)).unwrap();
    let mut agent = QLearningAgent::new(1.0, 0.9, 0.1);
    for _ in 0..500 {
        let episode = run_episode(&env, &mut agent, 0.9);
        assert_eq!(episode.state, State::Terminal);
        assert!(episode.discounted_return >= 0.0 && episode.discounted_return <= 1.0);
    }
    assert!(agent.learner().iterations() >= 500);
}
