//! Experiment configuration

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::environment::CoffeeEnv;
use crate::error::{Error, Result};

/// The agents an experiment can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    Random,
    QLearning,
    ValueIteration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub agent: AgentKind,

    pub rows: usize,

    pub cols: usize,

    /// Spill probability per cell, one vector per row. Drawn at random when absent.
    pub spill_probabilities: Option<Vec<Vec<f64>>>,

    pub discount: f64,

    /// Exploration rate of the Q-learning agent
    pub epsilon: f64,

    /// Initial learning rate of the Q-learning agent
    pub learning_rate: f64,

    /// Episodes per run
    pub episodes: usize,

    /// Independent runs, each with a fresh agent on the same world
    pub runs: usize,

    /// Episodes per learning-curve point
    pub report_every: usize,

    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            agent: AgentKind::QLearning,
            rows: 2,
            cols: 4,
            spill_probabilities: None,
            discount: 0.9,
            epsilon: 0.1,
            learning_rate: 1.0,
            episodes: 100_000,
            runs: 1,
            report_every: 500,
            seed: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            operation: format!("read config {}", path.display()),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::InvalidGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if let Some(spill) = &self.spill_probabilities {
            let shape_matches =
                spill.len() == self.rows && spill.iter().all(|row| row.len() == self.cols);
            if !shape_matches {
                return Err(Error::config(format!(
                    "spill probabilities must form a {}x{} matrix",
                    self.rows, self.cols
                )));
            }
        }
        if !(0.0..1.0).contains(&self.discount) {
            return Err(Error::config(format!(
                "discount {} must lie in [0, 1)",
                self.discount
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(Error::config(format!(
                "epsilon {} must lie in [0, 1]",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(Error::config(format!(
                "learning rate {} must lie in [0, 1]",
                self.learning_rate
            )));
        }
        if self.episodes == 0 || self.runs == 0 || self.report_every == 0 {
            return Err(Error::config(
                "episodes, runs and report interval must be positive",
            ));
        }
        Ok(())
    }

    /// Builds the world described by this configuration.
    pub fn build_env(&self) -> Result<CoffeeEnv> {
        self.validate()?;
        match &self.spill_probabilities {
            Some(spill) => CoffeeEnv::from_rows(spill, self.seed),
            None => CoffeeEnv::random(self.rows, self.cols, self.seed),
        }
    }
}
