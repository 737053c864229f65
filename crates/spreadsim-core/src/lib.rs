//! Core disease-spread simulation shared across the SpreadSim workspace.
//!
//! The world is a fixed population of point entities held in parallel
//! columns. Each tick integrates motion, rebuilds a quadtree over the new
//! positions, scans partitioned index ranges in parallel to apply medical
//! state transitions, and folds the per-worker tallies into cumulative
//! statistics after all workers have joined.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use spreadsim_index::{IndexError, Quadtree, Rect};
use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, warn};

/// High level simulation clock (ticks processed since creation).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Axis-aligned 2D position (SoA column representation).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Velocity in world units per tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    /// Construct a new velocity vector.
    #[must_use]
    pub const fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }
}

/// Per-entity wander acceleration, fixed at creation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Acceleration {
    pub ax: f32,
    pub ay: f32,
}

impl Acceleration {
    /// Construct a new acceleration vector.
    #[must_use]
    pub const fn new(ax: f32, ay: f32) -> Self {
        Self { ax, ay }
    }
}

/// Medical state of one entity.
///
/// `Cured` and `Dead` are terminal. Hospitalized entities occupy space in
/// the index but are isolated from open-air transmission.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MedicalStatus {
    #[default]
    Healthy,
    Infected,
    Hospitalized,
    Cured,
    Dead,
}

impl MedicalStatus {
    /// Whether no further transition is defined from this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cured | Self::Dead)
    }

    /// Whether this entity can transmit the infection through proximity.
    #[must_use]
    pub const fn is_contagious(self) -> bool {
        matches!(self, Self::Infected)
    }
}

/// Collection of per-entity columns for hot-path iteration.
///
/// All columns share one fixed length; index `i` refers to the same entity
/// in every column for the lifetime of the simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityColumns {
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
    accelerations: Vec<Acceleration>,
    statuses: Vec<MedicalStatus>,
    timers: Vec<u32>,
}

impl EntityColumns {
    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when the population is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    #[must_use]
    pub fn velocities(&self) -> &[Velocity] {
        &self.velocities
    }

    #[must_use]
    pub fn velocities_mut(&mut self) -> &mut [Velocity] {
        &mut self.velocities
    }

    #[must_use]
    pub fn accelerations(&self) -> &[Acceleration] {
        &self.accelerations
    }

    #[must_use]
    pub fn statuses(&self) -> &[MedicalStatus] {
        &self.statuses
    }

    #[must_use]
    pub fn statuses_mut(&mut self) -> &mut [MedicalStatus] {
        &mut self.statuses
    }

    #[must_use]
    pub fn timers(&self) -> &[u32] {
        &self.timers
    }

    #[must_use]
    pub fn timers_mut(&mut self) -> &mut [u32] {
        &mut self.timers
    }
}

/// Errors raised while creating or advancing a simulator.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    /// Indicates an invalid configuration value; no simulator is returned.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Spatial index construction failed; the tick aborts before the
    /// parallel phase and stats stay untouched.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// A worker failed mid-scan; sibling workers' per-index writes stand.
    #[error("worker {worker} fault: {reason}")]
    WorkerFault { worker: usize, reason: String },
}

/// Static configuration for a spread simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadConfig {
    /// Number of simulated entities; fixed for the simulator's lifetime.
    pub population: usize,
    /// Entities seeded as Infected at creation.
    pub initial_infected: usize,
    /// Width of the world in world units.
    pub world_width: f32,
    /// Height of the world in world units.
    pub world_height: f32,
    /// Transmission radius around each healthy entity.
    pub infection_radius: f32,
    /// Per-contact infection probability per contagious neighbor.
    pub infection_chance: f32,
    /// Ticks an infection lasts before its outcome is resolved.
    pub infection_duration: u32,
    /// Probability of dying when an infection or hospital stay resolves.
    pub death_chance: f32,
    /// Probability of being hospitalized when an infection resolves.
    pub hospital_chance: f32,
    /// Total hospital beds; hospitalization stops once occupied.
    pub hospital_capacity: usize,
    /// Ticks a hospital stay lasts before discharge is resolved.
    pub hospital_duration: u32,
    /// Number of fixed points of interest that attract movement.
    pub central_location_count: usize,
    /// Acceleration magnitude toward the nearest central location.
    pub central_pull: f32,
    /// Velocity magnitude cap in world units per tick.
    pub max_speed: f32,
    /// Worker threads used for the parallel transition phase.
    pub thread_count: usize,
    /// Maximum number of recent tick reports retained in memory.
    pub history_capacity: usize,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            population: 1_000,
            initial_infected: 5,
            world_width: 1_000.0,
            world_height: 1_000.0,
            infection_radius: 15.0,
            infection_chance: 0.2,
            infection_duration: 45,
            death_chance: 0.1,
            hospital_chance: 0.15,
            hospital_capacity: 50,
            hospital_duration: 30,
            central_location_count: 4,
            central_pull: 0.005,
            max_speed: 2.5,
            thread_count: 4,
            history_capacity: 256,
            rng_seed: None,
        }
    }
}

impl SpreadConfig {
    /// Validates the configuration before any allocation happens.
    fn validate(&self) -> Result<(), SimulationError> {
        if self.population == 0 {
            return Err(SimulationError::InvalidConfig(
                "population must be non-zero",
            ));
        }
        if self.initial_infected > self.population {
            return Err(SimulationError::InvalidConfig(
                "initial_infected cannot exceed population",
            ));
        }
        if !self.world_width.is_finite() || self.world_width <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "world_width must be positive",
            ));
        }
        if !self.world_height.is_finite() || self.world_height <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "world_height must be positive",
            ));
        }
        if !self.infection_radius.is_finite() || self.infection_radius <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "infection_radius must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.infection_chance)
            || !(0.0..=1.0).contains(&self.death_chance)
            || !(0.0..=1.0).contains(&self.hospital_chance)
        {
            return Err(SimulationError::InvalidConfig(
                "probabilities must lie in [0, 1]",
            ));
        }
        if self.infection_duration == 0 || self.hospital_duration == 0 {
            return Err(SimulationError::InvalidConfig(
                "durations must be non-zero",
            ));
        }
        if self.thread_count == 0 {
            return Err(SimulationError::InvalidConfig(
                "thread_count must be non-zero",
            ));
        }
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "max_speed must be positive",
            ));
        }
        if self.central_pull < 0.0 {
            return Err(SimulationError::InvalidConfig(
                "central_pull must be non-negative",
            ));
        }
        if self.history_capacity == 0 {
            return Err(SimulationError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// World bounds as the index rectangle.
    #[must_use]
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.world_width, self.world_height)
    }
}

/// Cumulative simulation counters plus the current tick.
///
/// `infected` and `hospitalized` are running gauges; the remaining fields
/// only ever grow. Mutated exclusively by the single-threaded aggregation
/// step after the worker join barrier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulatorStats {
    pub tick: Tick,
    pub ever_infected: usize,
    pub infected: usize,
    pub cured: usize,
    pub dead: usize,
    pub hospitalized: usize,
}

impl SimulatorStats {
    /// Folds one joined worker tally into the cumulative counters.
    fn absorb(&mut self, tally: &TickTally) {
        self.ever_infected += tally.infected;
        self.cured += tally.cured;
        self.dead += tally.died;
        // Discharges resolve to cure or death, so the remainder left the
        // Infected state directly.
        let resolved_from_infection = tally.cured + tally.died - tally.discharged;
        self.infected =
            self.infected + tally.infected - tally.hospitalized - resolved_from_infection;
        self.hospitalized = self.hospitalized + tally.hospitalized - tally.discharged;
    }

    /// Machine-parsable single line: tick, ever infected, currently
    /// infected, cured, dead, currently hospitalized.
    #[must_use]
    pub fn raw_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.tick.0, self.ever_infected, self.infected, self.cured, self.dead,
            self.hospitalized
        )
    }
}

impl fmt::Display for SimulatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tick:         {}", self.tick.0)?;
        writeln!(f, "ever infected: {}", self.ever_infected)?;
        writeln!(f, "infected:     {}", self.infected)?;
        writeln!(f, "cured:        {}", self.cured)?;
        writeln!(f, "dead:         {}", self.dead)?;
        write!(f, "hospitalized: {}", self.hospitalized)
    }
}

/// Local per-worker tally of state transitions applied in one tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickTally {
    /// Entities newly transitioned to Infected.
    pub infected: usize,
    /// Entities newly transitioned to Cured (from infection or hospital).
    pub cured: usize,
    /// Entities newly transitioned to Dead (from infection or hospital).
    pub died: usize,
    /// Entities newly admitted to hospital.
    pub hospitalized: usize,
    /// Entities whose hospital stay ended this tick.
    pub discharged: usize,
}

impl TickTally {
    /// Combine another worker's tally into this one.
    pub fn merge(&mut self, other: &Self) {
        self.infected += other.infected;
        self.cured += other.cured;
        self.died += other.died;
        self.hospitalized += other.hospitalized;
        self.discharged += other.discharged;
    }
}

/// Outcome of one completed tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    pub tally: TickTally,
}

/// Split `[0, len)` into `thread_count` contiguous near-equal ranges.
///
/// Sizes differ by at most one, every index is covered exactly once in
/// order, and `thread_count` is clamped to `[1, len]`. A zero-length input
/// yields no ranges.
#[must_use]
pub fn partition_ranges(len: usize, thread_count: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let workers = thread_count.clamp(1, len);
    let base = len / workers;
    let remainder = len % workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for worker in 0..workers {
        let size = base + usize::from(worker < remainder);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Near-equal split of a scalar budget across `parts` consumers.
fn split_evenly(total: usize, parts: usize) -> Vec<usize> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let remainder = total % parts;
    (0..parts)
        .map(|part| base + usize::from(part < remainder))
        .collect()
}

/// Scalar parameters the transition scan needs, copied out of the config
/// so workers borrow nothing mutable.
#[derive(Debug, Clone, Copy)]
struct TransitionParams {
    infection_radius: f32,
    infection_chance: f32,
    infection_duration: u32,
    death_chance: f32,
    hospital_chance: f32,
    hospital_duration: u32,
}

/// One worker's slice of the entity store plus its private inputs.
struct RangeJob<'a> {
    worker: usize,
    start: usize,
    statuses: &'a mut [MedicalStatus],
    timers: &'a mut [u32],
    seed: u64,
    hospital_budget: usize,
}

/// Scan one owned index range, mutating only its own status/timer chunk.
///
/// Neighbor checks read the start-of-phase status snapshot, so infections
/// applied elsewhere in the same tick are never visible here; that fixed
/// visibility point sits inside the bounded nondeterminism the model
/// accepts for the parallel phase.
fn scan_range(
    mut job: RangeJob<'_>,
    tree: &Quadtree,
    positions: &[Position],
    snapshot: &[MedicalStatus],
    params: &TransitionParams,
) -> Result<TickTally, SimulationError> {
    let mut rng = SmallRng::seed_from_u64(job.seed);
    let mut tally = TickTally::default();
    let mut beds_left = job.hospital_budget;

    for local in 0..job.statuses.len() {
        let index = job.start + local;
        match job.statuses[local] {
            MedicalStatus::Healthy => {
                let pos = positions[index];
                for neighbor in tree.query((pos.x, pos.y), params.infection_radius) {
                    if neighbor == index {
                        continue;
                    }
                    let Some(status) = snapshot.get(neighbor) else {
                        return Err(SimulationError::WorkerFault {
                            worker: job.worker,
                            reason: format!("index {neighbor} outside status snapshot"),
                        });
                    };
                    if !status.is_contagious() {
                        continue;
                    }
                    if rng.random::<f32>() < params.infection_chance {
                        job.statuses[local] = MedicalStatus::Infected;
                        job.timers[local] = params.infection_duration;
                        tally.infected += 1;
                        break;
                    }
                }
            }
            MedicalStatus::Infected => {
                if job.timers[local] > 1 {
                    job.timers[local] -= 1;
                } else {
                    job.timers[local] = 0;
                    if beds_left > 0 && rng.random::<f32>() < params.hospital_chance {
                        beds_left -= 1;
                        job.statuses[local] = MedicalStatus::Hospitalized;
                        job.timers[local] = params.hospital_duration;
                        tally.hospitalized += 1;
                    } else if rng.random::<f32>() < params.death_chance {
                        job.statuses[local] = MedicalStatus::Dead;
                        tally.died += 1;
                    } else {
                        job.statuses[local] = MedicalStatus::Cured;
                        tally.cured += 1;
                    }
                }
            }
            MedicalStatus::Hospitalized => {
                if job.timers[local] > 1 {
                    job.timers[local] -= 1;
                } else {
                    job.timers[local] = 0;
                    tally.discharged += 1;
                    if rng.random::<f32>() < params.death_chance {
                        job.statuses[local] = MedicalStatus::Dead;
                        tally.died += 1;
                    } else {
                        job.statuses[local] = MedicalStatus::Cured;
                        tally.cured += 1;
                    }
                }
            }
            MedicalStatus::Cured | MedicalStatus::Dead => {}
        }
    }
    Ok(tally)
}

fn nearest_central(centrals: &[Position], pos: Position) -> Option<Position> {
    centrals
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (a.x - pos.x).powi(2) + (a.y - pos.y).powi(2);
            let db = (b.x - pos.x).powi(2) + (b.y - pos.y).powi(2);
            da.total_cmp(&db)
        })
}

/// Aggregate simulation state: configuration, entity columns, statistics,
/// and the fixed central locations.
pub struct Simulator {
    config: SpreadConfig,
    stats: SimulatorStats,
    rng: SmallRng,
    columns: EntityColumns,
    central_locations: Vec<Position>,
    history: VecDeque<TickReport>,
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("population", &self.columns.len())
            .finish()
    }
}

impl Simulator {
    /// Instantiate a new simulator from the supplied configuration.
    ///
    /// Positions scatter uniformly inside the world bounds, every entity
    /// starts Healthy, and `initial_infected` distinct entities are then
    /// seeded as Infected with full timers.
    pub fn new(config: SpreadConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let population = config.population;

        let positions: Vec<Position> = (0..population)
            .map(|_| {
                Position::new(
                    rng.random_range(0.0..config.world_width),
                    rng.random_range(0.0..config.world_height),
                )
            })
            .collect();
        let half_speed = config.max_speed * 0.5;
        let velocities: Vec<Velocity> = (0..population)
            .map(|_| {
                Velocity::new(
                    rng.random_range(-half_speed..half_speed),
                    rng.random_range(-half_speed..half_speed),
                )
            })
            .collect();
        let wander = config.max_speed * 0.02;
        let accelerations: Vec<Acceleration> = (0..population)
            .map(|_| {
                Acceleration::new(
                    rng.random_range(-wander..wander),
                    rng.random_range(-wander..wander),
                )
            })
            .collect();

        let mut statuses = vec![MedicalStatus::Healthy; population];
        let mut timers = vec![0_u32; population];
        for index in rand::seq::index::sample(&mut rng, population, config.initial_infected) {
            statuses[index] = MedicalStatus::Infected;
            timers[index] = config.infection_duration;
        }

        let central_locations: Vec<Position> = (0..config.central_location_count)
            .map(|_| {
                Position::new(
                    rng.random_range(0.0..config.world_width),
                    rng.random_range(0.0..config.world_height),
                )
            })
            .collect();

        let stats = SimulatorStats {
            tick: Tick::zero(),
            ever_infected: config.initial_infected,
            infected: config.initial_infected,
            cured: 0,
            dead: 0,
            hospitalized: 0,
        };
        let history_capacity = config.history_capacity;

        Ok(Self {
            columns: EntityColumns {
                positions,
                velocities,
                accelerations,
                statuses,
                timers,
            },
            stats,
            rng,
            central_locations,
            history: VecDeque::with_capacity(history_capacity),
            config,
        })
    }

    /// Advance the simulation by one time unit.
    ///
    /// Stage order is strict: motion, index rebuild, parallel transitions,
    /// join and aggregation. An index failure aborts before the parallel
    /// phase with stats and tick counter untouched.
    pub fn tick(&mut self) -> Result<TickReport, SimulationError> {
        self.stage_motion();
        let tree = self.build_index()?;
        let tally = self.stage_transitions(&tree)?;

        self.stats.absorb(&tally);
        self.stats.tick = self.stats.tick.next();
        let report = TickReport {
            tick: self.stats.tick,
            tally,
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(report);
        debug!(
            tick = self.stats.tick.0,
            infected = self.stats.infected,
            newly_infected = tally.infected,
            "tick complete"
        );
        Ok(report)
    }

    /// Semi-implicit Euler over every non-Dead entity: steer toward the
    /// nearest central location, cap speed, then reflect at world bounds.
    fn stage_motion(&mut self) {
        let width = self.config.world_width;
        let height = self.config.world_height;
        let max_speed = self.config.max_speed;
        let pull = self.config.central_pull;
        let centrals = &self.central_locations;

        let EntityColumns {
            positions,
            velocities,
            accelerations,
            statuses,
            ..
        } = &mut self.columns;

        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .zip(accelerations.par_iter())
            .zip(statuses.par_iter())
            .for_each(|(((pos, vel), acc), status)| {
                if *status == MedicalStatus::Dead {
                    return;
                }
                let mut ax = acc.ax;
                let mut ay = acc.ay;
                if pull > 0.0 {
                    if let Some(target) = nearest_central(centrals, *pos) {
                        let dx = target.x - pos.x;
                        let dy = target.y - pos.y;
                        let dist = (dx * dx + dy * dy).sqrt();
                        if dist > f32::EPSILON {
                            ax += pull * dx / dist;
                            ay += pull * dy / dist;
                        }
                    }
                }

                vel.vx += ax;
                vel.vy += ay;
                let speed = (vel.vx * vel.vx + vel.vy * vel.vy).sqrt();
                if speed > max_speed {
                    let scale = max_speed / speed;
                    vel.vx *= scale;
                    vel.vy *= scale;
                }

                pos.x += vel.vx;
                pos.y += vel.vy;
                if pos.x < 0.0 {
                    pos.x = -pos.x;
                    vel.vx = -vel.vx;
                } else if pos.x > width {
                    pos.x = 2.0 * width - pos.x;
                    vel.vx = -vel.vx;
                }
                if pos.y < 0.0 {
                    pos.y = -pos.y;
                    vel.vy = -vel.vy;
                } else if pos.y > height {
                    pos.y = 2.0 * height - pos.y;
                    vel.vy = -vel.vy;
                }
                pos.x = pos.x.clamp(0.0, width);
                pos.y = pos.y.clamp(0.0, height);
            });
    }

    /// Rebuild the quadtree over post-motion positions. Dead and
    /// Hospitalized entities stay in the tree; queries filter by status.
    fn build_index(&self) -> Result<Quadtree, SimulationError> {
        let points: Vec<(f32, f32)> = self
            .columns
            .positions
            .iter()
            .map(|p| (p.x, p.y))
            .collect();
        Ok(Quadtree::build(&points, self.config.bounds())?)
    }

    /// Run the partitioned parallel scan and return the merged tally.
    fn stage_transitions(&mut self, tree: &Quadtree) -> Result<TickTally, SimulationError> {
        let population = self.columns.len();
        if population == 0 {
            return Ok(TickTally::default());
        }

        let ranges = partition_ranges(population, self.config.thread_count);
        let seeds: Vec<u64> = ranges.iter().map(|_| self.rng.random()).collect();
        let occupied = self
            .columns
            .statuses
            .iter()
            .filter(|status| **status == MedicalStatus::Hospitalized)
            .count();
        let free_beds = self.config.hospital_capacity.saturating_sub(occupied);
        let budgets = split_evenly(free_beds, ranges.len());
        let params = TransitionParams {
            infection_radius: self.config.infection_radius,
            infection_chance: self.config.infection_chance,
            infection_duration: self.config.infection_duration,
            death_chance: self.config.death_chance,
            hospital_chance: self.config.hospital_chance,
            hospital_duration: self.config.hospital_duration,
        };

        let EntityColumns {
            positions,
            statuses,
            timers,
            ..
        } = &mut self.columns;
        let positions: &[Position] = positions;
        let snapshot: Vec<MedicalStatus> = statuses.clone();

        let mut jobs = Vec::with_capacity(ranges.len());
        let mut status_rest: &mut [MedicalStatus] = statuses;
        let mut timer_rest: &mut [u32] = timers;
        for (worker, range) in ranges.iter().enumerate() {
            let (status_chunk, remaining_statuses) = status_rest.split_at_mut(range.len());
            let (timer_chunk, remaining_timers) = timer_rest.split_at_mut(range.len());
            status_rest = remaining_statuses;
            timer_rest = remaining_timers;
            jobs.push(RangeJob {
                worker,
                start: range.start,
                statuses: status_chunk,
                timers: timer_chunk,
                seed: seeds[worker],
                hospital_budget: budgets[worker],
            });
        }

        let joined: Result<Vec<TickTally>, SimulationError> = jobs
            .into_par_iter()
            .map(|job| scan_range(job, tree, positions, &snapshot, &params))
            .collect();
        let tallies = match joined {
            Ok(tallies) => tallies,
            Err(err) => {
                warn!(%err, "transition phase reported a worker fault");
                return Err(err);
            }
        };

        let mut total = TickTally::default();
        for tally in &tallies {
            total.merge(tally);
        }
        Ok(total)
    }

    /// Read-only copy of the cumulative statistics.
    #[must_use]
    pub fn stats(&self) -> SimulatorStats {
        self.stats
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &SpreadConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick_count(&self) -> Tick {
        self.stats.tick
    }

    /// Read-only access to the entity columns.
    #[must_use]
    pub fn columns(&self) -> &EntityColumns {
        &self.columns
    }

    /// Mutable access to the entity columns (scenario setup, tooling).
    #[must_use]
    pub fn columns_mut(&mut self) -> &mut EntityColumns {
        &mut self.columns
    }

    /// Fixed points of interest influencing movement.
    #[must_use]
    pub fn central_locations(&self) -> &[Position] {
        &self.central_locations
    }

    /// Iterate over retained tick reports, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickReport> {
        self.history.iter()
    }

    /// Number of entities currently in the given medical state.
    #[must_use]
    pub fn status_count(&self, status: MedicalStatus) -> usize {
        self.columns
            .statuses
            .iter()
            .filter(|s| **s == status)
            .count()
    }
}
