//! Repeated runs of one agent kind on one world, with learning curves.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::agent::{run_episode, Agent};
use crate::config::{AgentKind, ExperimentConfig};
use crate::environment::{Environment, OpenCoffeeEnv};
use crate::error::{Error, Result};
use crate::policy::RandomPolicy;
use crate::rl::QLearningAgent;
use crate::value_iteration::ValueIteration;

/// Mean discounted return over one reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub run: usize,
    pub episode: usize,
    pub mean_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run: usize,
    pub average_return: f64,
    pub curve: Vec<CurvePoint>,
}

pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Builds the world once, then evaluates a fresh agent per run.
    pub fn run(&self) -> Result<Vec<RunReport>> {
        let config = &self.config;
        let env = config.build_env()?;
        let reports: Vec<RunReport> = match config.agent {
            AgentKind::Random => (0..config.runs)
                .map(|run| self.run_agent(&env, &mut RandomPolicy::new(), run))
                .collect(),
            AgentKind::QLearning => (0..config.runs)
                .map(|run| {
                    let mut agent =
                        QLearningAgent::new(config.learning_rate, config.discount, config.epsilon);
                    self.run_agent(&env, &mut agent, run)
                })
                .collect(),
            AgentKind::ValueIteration => {
                let env = OpenCoffeeEnv::new(env);
                (0..config.runs)
                    .map(|run| {
                        let mut planner = ValueIteration::new(config.discount);
                        planner.plan(&env);
                        self.run_agent(&env, &mut planner, run)
                    })
                    .collect()
            }
        };
        Ok(reports)
    }

    fn run_agent<E, A>(&self, env: &E, agent: &mut A, run: usize) -> RunReport
    where
        E: Environment,
        A: Agent<E>,
    {
        let config = &self.config;
        let mut total = 0.0;
        let mut window = 0.0;
        let mut curve = Vec::with_capacity(config.episodes / config.report_every);

        for episode in 1..=config.episodes {
            let episode_return = run_episode(env, agent, config.discount).discounted_return;
            total += episode_return;
            window += episode_return;
            if episode % config.report_every == 0 {
                curve.push(CurvePoint {
                    run,
                    episode,
                    mean_return: window / config.report_every as f64,
                });
                window = 0.0;
            }
        }

        let average_return = total / config.episodes as f64;
        info!(run, agent = ?config.agent, episodes = config.episodes, average_return, "run finished");
        RunReport {
            run,
            average_return,
            curve,
        }
    }
}

/// Writes the learning curves of all runs as `run,episode,mean_return` rows.
pub fn write_curves<W: io::Write>(reports: &[RunReport], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for point in reports.iter().flat_map(|report| report.curve.iter()) {
        writer.serialize(point)?;
    }
    writer.flush().map_err(|source| Error::Io {
        operation: "flush learning curve".to_string(),
        source,
    })?;
    Ok(())
}

pub fn write_curves_file(reports: &[RunReport], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::Io {
        operation: format!("create {}", path.display()),
        source,
    })?;
    write_curves(reports, file)
}
