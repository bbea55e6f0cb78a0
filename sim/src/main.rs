//! MCL SIM: a command-line driver for the landmark-ranging particle filter.
//!
//! A simulated agent moves through a rectangular world while a range sensor reports its distance to a handful
//! of known landmarks. Every tick the particle filter is stepped with the commanded displacement and those
//! ranges, and the estimate, the true pose and the mean error are recorded.
//!
//! You can run simulations either by:
//!   1. Loading all parameters from a configuration file (TOML/JSON/YAML)
//!   2. Specifying parameters via command-line flags

mod common;

use clap::{Args, Parser, Subcommand, ValueEnum};
use common::{ensure_parent_dir, init_logger, validate_csv_path};
use log::{error, info};
use mcl::resample::ResamplingStrategy;
use mcl::sim::{SimulationConfig, SimulationResult, Trajectory, run_simulation};
use mcl::{FilterConfig, Point2D, WorldBounds};
use std::error::Error;
use std::path::{Path, PathBuf};

const LONG_ABOUT: &str = "MCL SIM: Monte Carlo localization of a planar agent from ranges to known landmarks.

A ground-truth agent follows a trajectory inside a width x height world. A simulated range sensor measures
the distance from the agent to every landmark, and a particle filter estimates the agent's position from the
commanded motion and those ranges. Per-step results (truth, estimate, mean error, effective sample size) are
written to CSV.

You can run simulations either by:
  1. Loading all parameters from a configuration file (TOML/JSON/YAML) with --config
  2. Specifying parameters via command-line flags with the `run` subcommand

Use the `config` subcommand to write a template configuration file.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Monte Carlo localization simulator.", long_about = LONG_ABOUT)]
struct Cli {
    /// Run simulation from a configuration file (TOML/JSON/YAML)
    /// This option overrides any subcommand arguments
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command to execute (ignored if --config is provided)
    #[command(subcommand)]
    command: Option<Command>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "run",
        about = "Run a simulation configured from flags",
        long_about = "Run a closed-loop simulation: move the ground-truth agent along the chosen trajectory, simulate range measurements to every landmark, and step the particle filter once per tick."
    )]
    Run(RunArgs),

    #[command(name = "config", about = "Generate a template configuration file")]
    CreateConfig(CreateConfigArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TrajectoryKind {
    Stationary,
    Square,
    Scripted,
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Per-step results CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Final particle cloud CSV
    #[arg(long)]
    particles_out: Option<PathBuf>,

    /// Number of simulation steps
    #[arg(long, default_value_t = 300)]
    steps: usize,

    /// Number of particles
    #[arg(long, default_value_t = 1000)]
    particles: usize,

    /// Number of randomly placed landmarks
    #[arg(long, default_value_t = 2)]
    landmarks: usize,

    /// Motion noise standard deviation per axis (world units)
    #[arg(long, default_value_t = 5.0)]
    motion_noise: f64,

    /// Sensor noise standard deviation assumed by the filter (world units)
    #[arg(long, default_value_t = 10.5)]
    sensor_noise: f64,

    /// Noise added to the simulated ranges (world units)
    #[arg(long, default_value_t = 0.0)]
    range_noise: f64,

    #[arg(long, default_value_t = 800.0)]
    width: f64,

    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Agent speed in world units per step
    #[arg(long, default_value_t = 5.0)]
    speed: f64,

    /// Starting x coordinate (defaults to the world centre)
    #[arg(long, requires = "start_y")]
    start_x: Option<f64>,

    /// Starting y coordinate (defaults to the world centre)
    #[arg(long, requires = "start_x")]
    start_y: Option<f64>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = ResamplingStrategy::Multinomial)]
    resampling: ResamplingStrategy,

    #[arg(long, value_enum, default_value_t = TrajectoryKind::Square)]
    trajectory: TrajectoryKind,

    /// Steps per side of the square trajectory
    #[arg(long, default_value_t = 40)]
    side_steps: usize,

    /// CSV of dx,dy commands for the scripted trajectory
    #[arg(long, required_if_eq("trajectory", "scripted"))]
    script: Option<PathBuf>,
}

impl RunArgs {
    fn to_config(&self) -> Result<SimulationConfig, Box<dyn Error>> {
        let trajectory = match self.trajectory {
            TrajectoryKind::Stationary => Trajectory::Stationary,
            TrajectoryKind::Square => Trajectory::Square {
                side_steps: self.side_steps,
            },
            TrajectoryKind::Scripted => {
                let path = self
                    .script
                    .clone()
                    .ok_or("--script is required for the scripted trajectory")?;
                Trajectory::Scripted { path }
            }
        };
        let robot_start = match (self.start_x, self.start_y) {
            (Some(x), Some(y)) => Some(Point2D::new(x, y)),
            _ => None,
        };
        Ok(SimulationConfig {
            landmark_count: self.landmarks,
            robot_speed: self.speed,
            range_noise_std: self.range_noise,
            steps: self.steps,
            seed: self.seed,
            output: self.output.clone(),
            particles_output: self.particles_out.clone(),
            robot_start,
            filter: FilterConfig {
                particle_count: self.particles,
                motion_noise_std: self.motion_noise,
                sensor_noise_std: self.sensor_noise,
                world_bounds: WorldBounds::new(self.width, self.height),
                resampling: self.resampling,
            },
            trajectory,
            ..SimulationConfig::default()
        })
    }
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Where to write the template (.toml, .json, .yaml or .yml)
    #[arg(short, long, default_value = "mcl_config.toml")]
    output: PathBuf,
}

/// Run the simulation and write whichever outputs the configuration asks for.
fn execute(config: &SimulationConfig) -> Result<(), Box<dyn Error>> {
    for path in [&config.output, &config.particles_output].into_iter().flatten() {
        validate_csv_path(path)?;
    }

    let result = run_simulation(config)?;
    report(&result);

    if let Some(path) = &config.output {
        ensure_parent_dir(path)?;
        result.to_csv(path)?;
        info!("Wrote {} step records to {}", result.records.len(), path.display());
    }
    if let Some(path) = &config.particles_output {
        ensure_parent_dir(path)?;
        result.particles_to_csv(path)?;
        info!("Wrote {} particles to {}", result.particles.len(), path.display());
    }
    Ok(())
}

fn report(result: &SimulationResult) {
    for (i, landmark) in result.landmarks.iter().enumerate() {
        info!("Landmark {i}: {landmark}");
    }
    if let Some(last) = result.records.last() {
        let tail = &result.records[result.records.len().saturating_sub(10)..];
        let tail_error = tail.iter().map(|r| r.mean_error).sum::<f64>() / tail.len() as f64;
        info!(
            "Final estimate ({:.3}, {:.3}) vs truth ({:.3}, {:.3}); mean error {:.3}, last {} steps {:.3}",
            last.estimate_x,
            last.estimate_y,
            last.true_x,
            last.true_y,
            last.mean_error,
            tail.len(),
            tail_error
        );
    }
}

/// Run a configuration that was already loaded from `config_path`.
fn run_from_config(config_path: &Path, config: &SimulationConfig) -> Result<(), Box<dyn Error>> {
    info!("Running configuration from {}", config_path.display());
    execute(config)
}

fn create_config_file(args: &CreateConfigArgs) -> Result<(), Box<dyn Error>> {
    let config = SimulationConfig {
        output: Some(PathBuf::from("mcl_run.csv")),
        particles_output: Some(PathBuf::from("mcl_particles.csv")),
        ..SimulationConfig::default()
    };
    ensure_parent_dir(&args.output)?;
    config.to_file(&args.output)?;

    println!(
        "Configuration file successfully created: {}",
        args.output.display()
    );
    println!("\nYou can now run the simulation with:");
    println!("  mcl-sim --config {}", args.output.display());
    Ok(())
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(ref config_path) = cli.config {
        // Logging preferences come from the file; --log-file still wins.
        let config = SimulationConfig::from_file(config_path)?;
        let log_file = cli.log_file.as_deref().or(config.logging.file.as_deref());
        init_logger(&config.logging.level, log_file)?;
        return run_from_config(config_path, &config);
    }

    init_logger(&cli.log_level, cli.log_file.as_deref())?;

    match cli.command {
        Some(Command::Run(args)) => {
            info!(
                "Running {} steps with {} particles and {} landmarks",
                args.steps, args.particles, args.landmarks
            );
            execute(&args.to_config()?)
        }
        Some(Command::CreateConfig(args)) => create_config_file(&args),
        None => Err("No command provided. Use -h or --help for usage information.".into()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    dispatch(cli).inspect_err(|e| error!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_args_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["mcl-sim", "run"]).unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run subcommand");
        };
        let config = args.to_config().unwrap();
        let defaults = SimulationConfig::default();
        assert_eq!(config.filter, defaults.filter);
        assert_eq!(config.steps, defaults.steps);
        assert_eq!(config.landmark_count, defaults.landmark_count);
        assert_eq!(config.robot_speed, defaults.robot_speed);
        assert_eq!(config.trajectory, defaults.trajectory);
        assert_eq!(config.seed, defaults.seed);
        assert!(config.robot_start.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_run_args_flags() {
        let cli = Cli::try_parse_from([
            "mcl-sim",
            "run",
            "--particles",
            "250",
            "--resampling",
            "systematic",
            "--trajectory",
            "stationary",
            "--start-x",
            "10",
            "--start-y",
            "20",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run subcommand");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.filter.particle_count, 250);
        assert_eq!(config.filter.resampling, ResamplingStrategy::Systematic);
        assert_eq!(config.trajectory, Trajectory::Stationary);
        assert_eq!(config.robot_start, Some(Point2D::new(10.0, 20.0)));
    }

    #[test]
    fn test_scripted_trajectory_requires_script() {
        assert!(Cli::try_parse_from(["mcl-sim", "run", "--trajectory", "scripted"]).is_err());
        let cli = Cli::try_parse_from([
            "mcl-sim",
            "run",
            "--trajectory",
            "scripted",
            "--script",
            "moves.csv",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(
            args.to_config().unwrap().trajectory,
            Trajectory::Scripted {
                path: PathBuf::from("moves.csv")
            }
        );
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["mcl-sim", "--config", "run.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("run.toml")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_create_config_then_execute() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("configs").join("template.yaml");
        create_config_file(&CreateConfigArgs {
            output: config_path.clone(),
        })
        .unwrap();
        assert!(config_path.exists());

        let mut config = SimulationConfig::from_file(&config_path).unwrap();
        assert_eq!(config.steps, SimulationConfig::default().steps);
        config.steps = 5;
        config.filter.particle_count = 100;
        config.output = Some(dir.path().join("out").join("run.csv"));
        config.particles_output = Some(dir.path().join("out").join("particles.csv"));
        execute(&config).unwrap();

        let records = SimulationResult::records_from_csv(dir.path().join("out").join("run.csv")).unwrap();
        assert_eq!(records.len(), 5);
        assert!(dir.path().join("out").join("particles.csv").exists());
    }

    #[test]
    fn test_run_from_loaded_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("run.json");
        let output = dir.path().join("run.csv");
        SimulationConfig {
            steps: 3,
            output: Some(output.clone()),
            filter: FilterConfig {
                particle_count: 50,
                ..FilterConfig::default()
            },
            ..SimulationConfig::default()
        }
        .to_file(&config_path)
        .unwrap();

        let config = SimulationConfig::from_file(&config_path).unwrap();
        run_from_config(&config_path, &config).unwrap();
        assert_eq!(SimulationResult::records_from_csv(&output).unwrap().len(), 3);
    }

    #[test]
    fn test_execute_rejects_non_csv_output() {
        let config = SimulationConfig {
            steps: 1,
            output: Some(PathBuf::from("run.json")),
            ..SimulationConfig::default()
        };
        assert!(execute(&config).is_err());
    }
}
