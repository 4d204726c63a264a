use crate::config::Config;
use crate::metrics::Metrics;
use crate::model::{Agent, Grid, Health, NEIGHBOR_OFFSETS, State};
use crate::render::Surface;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Record of the simulation at a single save point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Simulation step the record was taken at.
    pub step: usize,

    /// Fraction of agents currently sick.
    pub sick_fraction: f64,

    /// Fraction of agents currently vaccinated.
    pub vaccinated_fraction: f64,

    /// Full simulation state at this step.
    pub state: State,
}

/// Simulation engine.
///
/// Holds the configuration, current state, per-tick metrics, and random
/// number generator, and provides methods to initialize, run, save, and
/// load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    step: usize,
    state: State,
    metrics: Metrics,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a randomly
    /// populated initial state.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let state = populate(&cfg, &mut rng).context("failed to populate the grid")?;

        Ok(Self {
            cfg,
            step: 0,
            state,
            metrics: Metrics::new(),
            rng,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Perform the simulation and save the resulting records to a binary file.
    ///
    /// The grid is handed to `surface` once per tick for display.
    pub fn perform_simulation<P: AsRef<Path>>(
        &mut self,
        file: P,
        surface: &mut dyn Surface,
    ) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        for i_save in 0..self.cfg.output.saves_per_file {
            for _ in 0..self.cfg.output.steps_per_save {
                self.perform_step(surface).context("failed to perform step")?;
            }

            let record = Record {
                step: self.step,
                sick_fraction: self.state.health_fraction(Health::Sick),
                vaccinated_fraction: self.state.health_fraction(Health::Vaccinated),
                state: self.state.clone(),
            };
            encode::write(&mut writer, &record).context("failed to serialize record")?;

            let progress = 100.0 * (i_save + 1) as f64 / self.cfg.output.saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    fn perform_step(&mut self, surface: &mut dyn Surface) -> Result<()> {
        // Record metrics before any mutation so the first sample reflects
        // the initial condition.
        self.metrics.record(&self.state);

        surface
            .render(&self.state.grid, &self.state.agents)
            .context("failed to render grid")?;

        // Update the health of every agent.
        self.update_health().context("failed to update health")?;

        // Move every agent to a random empty neighboring cell.
        self.update_positions();

        // Reshuffle the processing order for the next step.
        self.state.order.shuffle(&mut self.rng);

        self.step += 1;

        Ok(())
    }

    /// Apply the state machine to every agent in processing order.
    ///
    /// Neighbor counts are taken against the live grid, so a transition of an
    /// earlier agent is visible to agents processed after it in the same
    /// sweep. This sequential visibility is part of the model.
    fn update_health(&mut self) -> Result<()> {
        let infection = Bernoulli::new(self.cfg.model.prob_infection)?;
        let breakthrough = Bernoulli::new(self.cfg.model.prob_breakthrough)?;
        let sick_duration = self.cfg.model.sick_duration;

        for slot in 0..self.state.order.len() {
            let idx = self.state.order[slot];
            let (row, col) = self.state.agents[idx].position();
            let sick_count = count_sick_neighbors(&self.state.grid, &self.state.agents, row, col);

            let dist = match self.state.agents[idx].health() {
                Health::Sick => {
                    self.state.agents[idx].advance_sickness();
                    continue;
                }
                Health::Healthy => infection,
                Health::Vaccinated => breakthrough,
            };

            // One Bernoulli trial per sick neighbor, stopping at the first
            // success.
            for _ in 0..sick_count {
                if dist.sample(&mut self.rng) {
                    self.state.agents[idx].infect(sick_duration);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Move every agent, in processing order, to a random empty neighbor.
    ///
    /// Moves are applied one agent at a time against the live grid: a cell
    /// taken by an earlier agent is no longer available to a later one.
    fn update_positions(&mut self) {
        for slot in 0..self.state.order.len() {
            let idx = self.state.order[slot];
            let (row, col) = self.state.agents[idx].position();
            if let Some((new_row, new_col)) =
                pick_empty_neighbor(&self.state.grid, row, col, &mut self.rng)
            {
                self.state.grid.vacate(row, col);
                self.state.grid.place(new_row, new_col, idx);
                self.state.agents[idx].relocate(new_row, new_col);
            }
        }
    }
}

/// Populate the grid with agents on distinct cells drawn without replacement.
///
/// The first `vaccinated` sampled cells get vaccinated agents, the next
/// `sick` get sick agents, and the rest of the population is healthy. Cells
/// beyond the population stay empty.
fn populate(cfg: &Config, rng: &mut ChaCha12Rng) -> Result<State> {
    let n_cells = cfg.grid.height * cfg.grid.width;
    let population = cfg.init.population;

    // Config validation already enforces these; the sampling below silently
    // misbehaves if they do not hold, so they are checked again here.
    let n_seeded = cfg.init.sick.checked_add(cfg.init.vaccinated);
    if n_seeded.is_none_or(|n_seeded| n_seeded > population) {
        bail!("cannot place more sick and vaccinated agents than the population");
    }
    if population > n_cells {
        bail!("cannot place more agents than there are grid cells");
    }

    let mut grid = Grid::new(cfg.grid.height, cfg.grid.width);
    let mut agents = Vec::with_capacity(population);

    let cells = rand::seq::index::sample(rng, n_cells, population);
    for (i_agt, cell) in cells.iter().enumerate() {
        let health = if i_agt < cfg.init.vaccinated {
            Health::Vaccinated
        } else if i_agt < cfg.init.vaccinated + cfg.init.sick {
            Health::Sick
        } else {
            Health::Healthy
        };

        let row = cell / cfg.grid.width;
        let col = cell % cfg.grid.width;
        grid.place(row, col, agents.len());
        agents.push(Agent::new(health, row, col, cfg.model.sick_duration));
    }

    let order = (0..population).collect();

    Ok(State {
        grid,
        agents,
        order,
    })
}

/// Count the sick occupants of the 8 toroidal neighbors of a cell.
///
/// On grids narrower than 3 cells several offsets wrap onto the same cell,
/// which is then counted once per offset.
pub fn count_sick_neighbors(grid: &Grid, agents: &[Agent], row: usize, col: usize) -> usize {
    NEIGHBOR_OFFSETS
        .iter()
        .filter(|&&(d_row, d_col)| {
            let (n_row, n_col) = grid.wrap(row as isize + d_row, col as isize + d_col);
            grid.occupant(n_row, n_col)
                .is_some_and(|idx| agents[idx].health() == Health::Sick)
        })
        .count()
}

/// Pick a uniformly random empty cell among the 8 toroidal neighbors.
///
/// Returns `None` when every neighbor is occupied; staying put is a defined
/// behavior, not an error.
fn pick_empty_neighbor(
    grid: &Grid,
    row: usize,
    col: usize,
    rng: &mut ChaCha12Rng,
) -> Option<(usize, usize)> {
    let options: Vec<_> = NEIGHBOR_OFFSETS
        .iter()
        .map(|&(d_row, d_col)| grid.wrap(row as isize + d_row, col as isize + d_col))
        .filter(|&(n_row, n_col)| grid.occupant(n_row, n_col).is_none())
        .collect();
    options.choose(rng).copied()
}
