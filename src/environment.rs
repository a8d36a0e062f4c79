use std::cell::RefCell;
use std::fmt;

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::error::{Error, Result};

/// Reward for drinking the coffee in the coffee-in-hand cell. Every other
/// action, including a move that spills, is worth nothing.
pub const DRINK_REWARD: f64 = 1.0;

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Right,
    Left,
    Drink,
}

impl Action {
    /// Directional moves in canonical order.
    pub const MOVES: [Action; 4] = [Action::Up, Action::Down, Action::Right, Action::Left];

    /// Every action in canonical order, used for deterministic tie-breaks.
    pub const ALL: [Action; 5] = [
        Action::Up,
        Action::Down,
        Action::Right,
        Action::Left,
        Action::Drink,
    ];

    /// `(delta_row, delta_col)` of a move. Drinking has no displacement.
    pub fn into_vector(self) -> Option<(isize, isize)> {
        match self {
            Action::Up => Some((-1, 0)),
            Action::Down => Some((1, 0)),
            Action::Right => Some((0, 1)),
            Action::Left => Some((0, -1)),
            Action::Drink => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Action::Up => "^",
            Action::Down => "v",
            Action::Right => ">",
            Action::Left => "<",
            Action::Drink => "D",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A grid cell holding the robot with the coffee, or the single terminal
/// state reached after drinking or spilling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum State {
    Cell(Pos),
    Terminal,
}

impl State {
    pub fn at(row: usize, col: usize) -> Self {
        State::Cell(Pos::new(row, col))
    }

    pub fn pos(self) -> Option<Pos> {
        match self {
            State::Cell(pos) => Some(pos),
            State::Terminal => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Cell(pos) => write!(f, "({},{})", pos.row, pos.col),
            State::Terminal => f.write_str("terminal"),
        }
    }
}

/// One outcome of applying an action, with the probability of reaching it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transition {
    pub state: State,
    pub probability: f64,
}

/// What any agent may observe about the world.
///
/// The spill probabilities stay hidden: model-free agents only learn about
/// them through the outcomes of [`Environment::apply`].
pub trait Environment {
    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    fn initial_state(&self) -> State;

    /// The cell where the coffee reaches your hand.
    fn coffee_state(&self) -> State;

    fn is_legal(&self, state: State, action: Action) -> bool;

    /// Samples the outcome of a legal action, returning the new state and the reward.
    ///
    /// # Panics
    ///
    /// If `action` is not legal in `state`.
    fn apply(&self, state: State, action: Action) -> (State, f64);

    /// Uniform draw from `[0, 1)` out of the environment's generator.
    fn sample_unit(&self) -> f64;

    /// Uniform index in `0..len` out of the environment's generator.
    fn sample_index(&self, len: usize) -> usize;

    fn is_terminal(&self, state: State) -> bool {
        state == State::Terminal
    }

    fn legal_actions(&self, state: State) -> Vec<Action> {
        if state == self.coffee_state() {
            return vec![Action::Drink];
        }
        Action::MOVES
            .iter()
            .copied()
            .filter(|&action| self.is_legal(state, action))
            .collect()
    }

    fn reward(&self, state: State, action: Action) -> f64 {
        if state == self.coffee_state() && action == Action::Drink {
            DRINK_REWARD
        } else {
            0.0
        }
    }
}

/// The full model, needed by planners.
pub trait Model: Environment {
    /// Every grid cell in row-major order followed by the terminal state.
    fn all_states(&self) -> Vec<State>;

    /// The exact distribution [`Environment::apply`] samples from.
    ///
    /// # Panics
    ///
    /// If `action` is not legal in `state`.
    fn legal_transitions(&self, state: State, action: Action) -> Vec<Transition>;
}

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// The coffee world as seen by model-free agents.
pub struct CoffeeEnv {
    spill: Array2<f64>,
    rng: RefCell<StdRng>,
}

impl CoffeeEnv {
    pub fn new(spill: Array2<f64>, seed: Option<u64>) -> Result<Self> {
        let (rows, cols) = spill.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGrid { rows, cols });
        }
        for ((row, col), &value) in spill.indexed_iter() {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidSpillProbability { row, col, value });
            }
        }
        debug!(rows, cols, ?seed, "coffee world created");
        Ok(Self {
            spill,
            rng: RefCell::new(build_rng(seed)),
        })
    }

    /// Builds the world from one vector of spill probabilities per row.
    pub fn from_rows(spill: &[Vec<f64>], seed: Option<u64>) -> Result<Self> {
        let rows = spill.len();
        let cols = spill.first().map_or(0, Vec::len);
        if spill.iter().any(|row| row.len() != cols) {
            return Err(Error::InvalidGrid { rows, cols });
        }
        let flat: Vec<f64> = spill.iter().flatten().copied().collect();
        let matrix =
            Array2::from_shape_vec((rows, cols), flat).map_err(|_| Error::InvalidGrid { rows, cols })?;
        Self::new(matrix, seed)
    }

    /// A world whose spill probabilities are drawn uniformly from `[0, 1)`.
    pub fn random(rows: usize, cols: usize, seed: Option<u64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGrid { rows, cols });
        }
        let mut rng = build_rng(seed);
        let spill = Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>());
        debug!(rows, cols, ?seed, "random coffee world created");
        Ok(Self {
            spill,
            rng: RefCell::new(rng),
        })
    }

    pub fn cells(&self) -> CellIter {
        CellIter::new(self.rows(), self.cols())
    }

    fn contains(&self, pos: Pos) -> bool {
        pos.row < self.rows() && pos.col < self.cols()
    }

    fn destination(&self, pos: Pos, action: Action) -> Option<Pos> {
        let (delta_row, delta_col) = action.into_vector()?;
        let row = pos.row.checked_add_signed(delta_row)?;
        let col = pos.col.checked_add_signed(delta_col)?;
        let next = Pos::new(row, col);
        self.contains(next).then_some(next)
    }

    fn spill_at(&self, pos: Pos) -> f64 {
        self.spill[[pos.row, pos.col]]
    }

    fn assert_legal(&self, state: State, action: Action) {
        assert!(
            self.is_legal(state, action),
            "Illegal action {:?} in state {}",
            action,
            state
        );
    }
}

impl Environment for CoffeeEnv {
    fn rows(&self) -> usize {
        self.spill.nrows()
    }

    fn cols(&self) -> usize {
        self.spill.ncols()
    }

    fn initial_state(&self) -> State {
        State::at(0, 0)
    }

    fn coffee_state(&self) -> State {
        State::at(self.rows() - 1, self.cols() - 1)
    }

    fn is_legal(&self, state: State, action: Action) -> bool {
        match state {
            State::Terminal => false,
            State::Cell(pos) if !self.contains(pos) => false,
            _ if state == self.coffee_state() => action == Action::Drink,
            State::Cell(pos) => self.destination(pos, action).is_some(),
        }
    }

    fn apply(&self, state: State, action: Action) -> (State, f64) {
        self.assert_legal(state, action);
        let reward = self.reward(state, action);
        if action == Action::Drink {
            return (State::Terminal, reward);
        }

        // Legal moves always start from a cell and land on one.
        let next = match state.pos().and_then(|pos| self.destination(pos, action)) {
            Some(next) => next,
            None => unreachable!("legal move without destination"),
        };
        if self.sample_unit() > self.spill_at(next) {
            (State::Cell(next), reward)
        } else {
            (State::Terminal, reward)
        }
    }

    fn sample_unit(&self) -> f64 {
        self.rng.borrow_mut().gen::<f64>()
    }

    fn sample_index(&self, len: usize) -> usize {
        self.rng.borrow_mut().gen_range(0..len)
    }
}

/// The coffee world with its transition model exposed, for planning agents.
pub struct OpenCoffeeEnv {
    env: CoffeeEnv,
}

impl OpenCoffeeEnv {
    pub fn new(env: CoffeeEnv) -> Self {
        Self { env }
    }

    pub fn cells(&self) -> CellIter {
        self.env.cells()
    }

    pub fn into_inner(self) -> CoffeeEnv {
        self.env
    }
}

impl From<CoffeeEnv> for OpenCoffeeEnv {
    fn from(env: CoffeeEnv) -> Self {
        Self::new(env)
    }
}

impl Environment for OpenCoffeeEnv {
    fn rows(&self) -> usize {
        self.env.rows()
    }

    fn cols(&self) -> usize {
        self.env.cols()
    }

    fn initial_state(&self) -> State {
        self.env.initial_state()
    }

    fn coffee_state(&self) -> State {
        self.env.coffee_state()
    }

    fn is_legal(&self, state: State, action: Action) -> bool {
        self.env.is_legal(state, action)
    }

    fn apply(&self, state: State, action: Action) -> (State, f64) {
        self.env.apply(state, action)
    }

    fn sample_unit(&self) -> f64 {
        self.env.sample_unit()
    }

    fn sample_index(&self, len: usize) -> usize {
        self.env.sample_index(len)
    }
}

impl Model for OpenCoffeeEnv {
    fn all_states(&self) -> Vec<State> {
        self.cells()
            .map(State::Cell)
            .chain(std::iter::once(State::Terminal))
            .collect()
    }

    fn legal_transitions(&self, state: State, action: Action) -> Vec<Transition> {
        self.env.assert_legal(state, action);
        let next = match state.pos().and_then(|pos| self.env.destination(pos, action)) {
            Some(next) if action != Action::Drink => next,
            _ => {
                return vec![Transition {
                    state: State::Terminal,
                    probability: 1.0,
                }]
            }
        };
        let spill = self.env.spill_at(next);
        vec![
            Transition {
                state: State::Cell(next),
                probability: 1.0 - spill,
            },
            Transition {
                state: State::Terminal,
                probability: spill,
            },
        ]
    }
}

impl fmt::Display for OpenCoffeeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.env.spill.rows() {
            for value in row.iter() {
                write!(f, "{:.2}\t", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Row-major iterator over the cells of a grid.
pub struct CellIter {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
}

impl CellIter {
    fn new(rows: usize, cols: usize) -> CellIter {
        CellIter {
            row: 0,
            col: 0,
            rows,
            cols,
        }
    }
}

impl Iterator for CellIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.row >= self.rows || self.cols == 0 {
            return None;
        }
        let pos = Pos::new(self.row, self.col);
        self.col += 1;
        if self.col == self.cols {
            self.col = 0;
            self.row += 1;
        }
        Some(pos)
    }
}
