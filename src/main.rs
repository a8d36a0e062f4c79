use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coffee_world::experiment::{write_curves_file, Experiment};
use coffee_world::{AgentKind, Environment, ExperimentConfig, OpenCoffeeEnv, State, ValueIteration};

#[derive(Parser)]
#[command(name = "coffee-world")]
#[command(version, about = "Learning and planning agents for the coffee world", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes with an agent and report the average discounted return
    Run(RunArgs),

    /// Solve the world with value iteration and print values and policy
    Plan(WorldArgs),
}

#[derive(Args)]
struct WorldArgs {
    /// JSON experiment configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    rows: Option<usize>,

    #[arg(long)]
    cols: Option<usize>,

    #[arg(long)]
    discount: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    world: WorldArgs,

    #[arg(long, value_enum)]
    agent: Option<AgentKind>,

    #[arg(long)]
    episodes: Option<usize>,

    #[arg(long)]
    runs: Option<usize>,

    #[arg(long)]
    epsilon: Option<f64>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    report_every: Option<usize>,

    /// Write the learning curve as CSV
    #[arg(long)]
    output: Option<PathBuf>,
}

impl WorldArgs {
    fn load(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.cols = cols;
        }
        if let Some(discount) = self.discount {
            config.discount = discount;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

impl RunArgs {
    fn load(&self) -> Result<ExperimentConfig> {
        let mut config = self.world.load()?;
        if let Some(agent) = self.agent {
            config.agent = agent;
        }
        if let Some(episodes) = self.episodes {
            config.episodes = episodes;
        }
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if let Some(epsilon) = self.epsilon {
            config.epsilon = epsilon;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(report_every) = self.report_every {
            config.report_every = report_every;
        }
        Ok(config)
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = args.load()?;
    let experiment = Experiment::new(config).context("invalid experiment configuration")?;
    let reports = experiment.run()?;

    let config = experiment.config();
    for report in &reports {
        println!(
            "{:?} run {}: average discounted return over {} episodes is {:.3}",
            config.agent, report.run, config.episodes, report.average_return
        );
    }
    if let Some(path) = &args.output {
        write_curves_file(&reports, path)
            .with_context(|| format!("writing learning curve to {}", path.display()))?;
        println!("Learning curve written to {}", path.display());
    }
    Ok(())
}

fn plan(args: WorldArgs) -> Result<()> {
    let config = args.load()?;
    let env = OpenCoffeeEnv::new(config.build_env().context("invalid world configuration")?);
    println!("Spill probabilities:\n{}", env);

    let mut planner = ValueIteration::new(config.discount);
    let sweeps = planner.plan(&env);
    println!("Converged after {} sweeps", sweeps);
    println!("Values:\n{:.3}", planner.value_grid(&env));

    println!("Policy:");
    for row in 0..env.rows() {
        let line: Vec<String> = (0..env.cols())
            .map(|col| match planner.policy(&env, State::at(row, col)) {
                Some(action) => action.to_string(),
                None => "-".to_string(),
            })
            .collect();
        println!("{}", line.join(" "));
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Plan(args) => plan(args),
    }
}
