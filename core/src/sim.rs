//! Simulation driver: a ground-truth agent, its commanded trajectory, and a closed loop around the filter.
//!
//! The agent is moved by axis-aligned commands at a fixed speed (think arrow keys) and
//! stops at the world edges (it is clamped, whereas particles are reflected). Every tick the simulated sensor
//! ranges the true pose to each landmark, the filter steps with the commanded displacement and those ranges,
//! and a [`StepRecord`] is kept for later analysis.
//!
//! Results can be written to CSV for plotting:
//!
//! ```no_run
//! use mcl::sim::{SimulationConfig, run_simulation};
//!
//! let config = SimulationConfig::default();
//! let result = run_simulation(&config).expect("simulation failed");
//! result.to_csv("mcl_run.csv").expect("failed to write results");
//! ```
use crate::error::{MclError, Result};
use crate::filter::{Estimate, FilterConfig, FilterController};
use crate::geometry::{Point2D, WorldBounds};
use crate::landmarks::LandmarkSet;
use crate::particle::ParticleSet;
use crate::sensor::SensorSimulator;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Axis-aligned movement directions in screen coordinates (`y` grows downward).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    North,
    South,
    East,
    West,
    Hold,
}

impl Heading {
    pub fn command(&self, speed: f64) -> Command {
        match self {
            Heading::North => Command::new(0.0, -speed),
            Heading::South => Command::new(0.0, speed),
            Heading::East => Command::new(speed, 0.0),
            Heading::West => Command::new(-speed, 0.0),
            Heading::Hold => Command::new(0.0, 0.0),
        }
    }
}

/// A commanded displacement for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub dx: f64,
    pub dy: f64,
}

impl Command {
    pub const fn new(dx: f64, dy: f64) -> Self {
        Command { dx, dy }
    }
}

/// How the ground-truth agent is driven.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trajectory {
    /// Stand still.
    Stationary,
    /// Repeat east, south, west, north legs of `side_steps` ticks each.
    Square { side_steps: usize },
    /// Read `dx,dy` rows from a CSV file; hold position once the file runs out.
    Scripted { path: PathBuf },
}

impl Default for Trajectory {
    fn default() -> Self {
        Trajectory::Square { side_steps: 40 }
    }
}

impl Trajectory {
    /// Expand into exactly `steps` commands.
    pub fn commands(&self, steps: usize, speed: f64) -> Result<Vec<Command>> {
        match self {
            Trajectory::Stationary => Ok(vec![Command::default(); steps]),
            Trajectory::Square { side_steps } => {
                if *side_steps == 0 {
                    return Err(MclError::InvalidConfig(
                        "square trajectory needs at least one step per side".to_string(),
                    ));
                }
                let legs = [Heading::East, Heading::South, Heading::West, Heading::North];
                Ok((0..steps)
                    .map(|i| legs[(i / side_steps) % legs.len()].command(speed))
                    .collect())
            }
            Trajectory::Scripted { path } => {
                let mut commands = read_commands_csv(path)?;
                if commands.len() < steps {
                    warn!(
                        "Scripted trajectory {} has {} commands for {} steps; holding position afterwards",
                        path.display(),
                        commands.len(),
                        steps
                    );
                }
                commands.resize(steps, Command::default());
                Ok(commands)
            }
        }
    }
}

/// Read a `dx,dy` CSV (with header) of commanded displacements.
pub fn read_commands_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Command>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut commands = Vec::new();
    for row in reader.deserialize() {
        let command: Command = row?;
        if !command.dx.is_finite() || !command.dy.is_finite() {
            return Err(MclError::NonFiniteCommand {
                dx: command.dx,
                dy: command.dy,
            });
        }
        commands.push(command);
    }
    Ok(commands)
}

/// Ground-truth agent. Walls stop it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Robot {
    pub position: Point2D,
}

impl Robot {
    pub fn new(position: Point2D) -> Self {
        Robot { position }
    }

    pub fn apply(&mut self, command: &Command, bounds: &WorldBounds) {
        self.position = bounds.clamp(self.position.translate(command.dx, command.dy));
    }
}

/// Logger settings honoured by the `mcl-sim` binary when a run is loaded from a file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of off, error, warn, info, debug, trace.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parameters for a complete simulated run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Landmarks scattered at random when `landmarks` is not given.
    pub landmark_count: usize,
    /// Agent speed in world units per tick for heading-based trajectories.
    pub robot_speed: f64,
    /// Standard deviation of the simulated range noise. Zero gives exact ranges.
    pub range_noise_std: f64,
    pub steps: usize,
    /// Seed for landmark placement, sensor noise, and the filter.
    pub seed: u64,
    /// Per-step CSV written by the `mcl-sim` binary.
    pub output: Option<PathBuf>,
    /// Final particle cloud CSV written by the `mcl-sim` binary.
    pub particles_output: Option<PathBuf>,
    /// Starting pose; the world centre when omitted.
    pub robot_start: Option<Point2D>,
    pub filter: FilterConfig,
    pub trajectory: Trajectory,
    pub logging: LoggingConfig,
    /// Explicit landmark positions, overriding `landmark_count`.
    pub landmarks: Option<Vec<Point2D>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            landmark_count: 2,
            robot_speed: 5.0,
            range_noise_std: 0.0,
            steps: 300,
            seed: 42,
            output: None,
            particles_output: None,
            robot_start: None,
            filter: FilterConfig::default(),
            trajectory: Trajectory::default(),
            logging: LoggingConfig::default(),
            landmarks: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        if !self.robot_speed.is_finite() || self.robot_speed < 0.0 {
            return Err(MclError::InvalidConfig(format!(
                "robot speed must be finite and non-negative, got {}",
                self.robot_speed
            )));
        }
        if let Some(start) = &self.robot_start
            && !start.is_finite()
        {
            return Err(MclError::InvalidConfig(format!(
                "robot start {start} is not finite"
            )));
        }
        if let Some(landmarks) = &self.landmarks
            && landmarks.iter().any(|l| !l.is_finite())
        {
            return Err(MclError::InvalidConfig(
                "landmark positions must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        Ok(toml::from_str(&s)?)
    }

    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(unsupported_extension(p)),
        }
    }

    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(unsupported_extension(p)),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn unsupported_extension(path: &Path) -> MclError {
    MclError::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "unsupported config extension for '{}' (expected .json, .yaml, .yml or .toml)",
            path.display()
        ),
    ))
}

/// One row of simulation output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub command_dx: f64,
    pub command_dy: f64,
    pub true_x: f64,
    pub true_y: f64,
    pub estimate_x: f64,
    pub estimate_y: f64,
    pub mean_error: f64,
    pub effective_sample_size: f64,
}

/// What a renderer needs to draw one tick.
#[derive(Debug)]
pub struct Frame<'a> {
    pub step: usize,
    pub robot: Point2D,
    pub landmarks: &'a LandmarkSet,
    pub particles: &'a ParticleSet,
    pub estimate: &'a Estimate,
}

#[derive(Clone, Debug, Default)]
pub struct SimulationResult {
    pub records: Vec<StepRecord>,
    pub landmarks: Vec<Point2D>,
    /// Particle positions after the final step.
    pub particles: Vec<Point2D>,
}

impl SimulationResult {
    pub fn final_mean_error(&self) -> Option<f64> {
        self.records.last().map(|r| r.mean_error)
    }

    /// Write one row per step.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read step records previously written by [`SimulationResult::to_csv`].
    pub fn records_from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<StepRecord>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Write the final particle cloud as `x,y` rows.
    pub fn particles_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_points_csv(path, &self.particles)
    }

    pub fn landmarks_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_points_csv(path, &self.landmarks)
    }
}

fn write_points_csv<P: AsRef<Path>>(path: P, points: &[Point2D]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

/// Run a complete simulation described by `config`.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult> {
    run_simulation_with(config, |_| {})
}

/// Run a simulation, handing every tick's [`Frame`] to `on_frame` (for example a renderer).
pub fn run_simulation_with<F>(config: &SimulationConfig, mut on_frame: F) -> Result<SimulationResult>
where
    F: FnMut(&Frame<'_>),
{
    config.validate()?;
    let bounds = config.filter.world_bounds;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let landmarks = match &config.landmarks {
        Some(positions) => LandmarkSet::new(positions.clone()),
        None => LandmarkSet::random(config.landmark_count, &bounds, &mut rng),
    };
    let sensor = SensorSimulator::new(config.range_noise_std)?;
    let commands = config.trajectory.commands(config.steps, config.robot_speed)?;
    let mut robot = Robot::new(bounds.clamp(config.robot_start.unwrap_or_else(|| bounds.center())));
    let filter_seed: u64 = rng.random();
    let mut filter = FilterController::seeded(config.filter.clone(), landmarks.clone(), filter_seed)?;

    info!(
        "Starting simulation: {} steps, {} landmarks, robot at {}",
        config.steps,
        landmarks.len(),
        robot.position
    );

    let mut records = Vec::with_capacity(commands.len());
    for (step, command) in commands.iter().enumerate() {
        robot.apply(command, &bounds);
        let observed = sensor.measure(&robot.position, &landmarks, &mut rng);
        let estimate = filter.step_with_truth(command.dx, command.dy, &observed, &robot.position)?;
        on_frame(&Frame {
            step,
            robot: robot.position,
            landmarks: &landmarks,
            particles: filter.particles(),
            estimate: &estimate,
        });
        records.push(StepRecord {
            step,
            command_dx: command.dx,
            command_dy: command.dy,
            true_x: robot.position.x,
            true_y: robot.position.y,
            estimate_x: estimate.mean_position.x,
            estimate_y: estimate.mean_position.y,
            mean_error: estimate.mean_error.unwrap_or(f64::NAN),
            effective_sample_size: estimate.effective_sample_size,
        });
    }
    filter.stop();

    let result = SimulationResult {
        records,
        landmarks: landmarks.positions(),
        particles: filter.particles().positions(),
    };
    match result.final_mean_error() {
        Some(error) => info!("Simulation finished: final mean error {error:.3}"),
        None => info!("Simulation finished without any steps"),
    }
    Ok(result)
}
