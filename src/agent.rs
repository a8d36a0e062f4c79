use crate::environment::{Action, Environment, State};

/// Anything that can act in a coffee world.
///
/// Model-free agents implement this for every `E: Environment`; planners only
/// for environments that expose their [`Model`](crate::environment::Model).
pub trait Agent<E: Environment + ?Sized> {
    /// A member of `env.legal_actions(state)`, or `None` in a terminal state.
    fn choose_action(&mut self, env: &E, state: State) -> Option<Action>;

    /// Observe one transition. Agents that do not learn ignore it.
    fn learn(&mut self, _env: &E, _state: State, _action: Action, _next_state: State, _reward: f64) {}
}

/// Progress of one episode: where the robot is and what it has collected.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub state: State,
    pub discounted_return: f64,
    pub steps: usize,
    discount: f64,
    weight: f64,
}

impl Episode {
    pub fn new<E: Environment + ?Sized>(env: &E, discount: f64) -> Self {
        Self {
            state: env.initial_state(),
            discounted_return: 0.0,
            steps: 0,
            discount,
            weight: 1.0,
        }
    }

    pub fn is_over<E: Environment + ?Sized>(&self, env: &E) -> bool {
        env.is_terminal(self.state)
    }

    /// Lets the agent pick an action, applies it and feeds the outcome back to
    /// the agent. Returns the reward of the step.
    ///
    /// # Panics
    ///
    /// If the agent has no action for a non-terminal state.
    pub fn step<E, A>(&mut self, env: &E, agent: &mut A) -> f64
    where
        E: Environment + ?Sized,
        A: Agent<E> + ?Sized,
    {
        let state = self.state;
        let action = agent
            .choose_action(env, state)
            .unwrap_or_else(|| panic!("Agent chose no action in non-terminal state {}", state));
        let (next_state, reward) = env.apply(state, action);
        agent.learn(env, state, action, next_state, reward);

        self.discounted_return += self.weight * reward;
        self.weight *= self.discount;
        self.steps += 1;
        self.state = next_state;
        reward
    }
}

/// Runs one episode from the initial state until a terminal state.
pub fn run_episode<E, A>(env: &E, agent: &mut A, discount: f64) -> Episode
where
    E: Environment + ?Sized,
    A: Agent<E> + ?Sized,
{
    let mut episode = Episode::new(env, discount);
    while !episode.is_over(env) {
        episode.step(env, agent);
    }
    episode
}

/// Average discounted return over `episodes` episodes.
pub fn run_episodes<E, A>(env: &E, agent: &mut A, episodes: usize, discount: f64) -> f64
where
    E: Environment + ?Sized,
    A: Agent<E> + ?Sized,
{
    if episodes == 0 {
        return 0.0;
    }
    let total: f64 = (0..episodes)
        .map(|_| run_episode(env, agent, discount).discounted_return)
        .sum();
    total / episodes as f64
}
