use serde::{Deserialize, Serialize};

/// Health state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Healthy,
    Sick,
    Vaccinated,
}

impl Health {
    /// RGB color used by rendering surfaces.
    pub fn color(self) -> [u8; 3] {
        match self {
            Health::Healthy => [0, 0, 255],
            Health::Sick => [255, 0, 0],
            Health::Vaccinated => [0, 255, 0],
        }
    }
}

/// Agent of the simulation.
///
/// Each agent has a health state, the number of ticks left before a sick
/// agent recovers, and its cell coordinates on the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    health: Health,
    countdown: u32,
    row: usize,
    col: usize,
}

impl Agent {
    /// Create a new agent at the given cell.
    ///
    /// Agents created sick start with their full sickness duration.
    pub fn new(health: Health, row: usize, col: usize, sick_duration: u32) -> Self {
        let countdown = match health {
            Health::Sick => sick_duration,
            _ => 0,
        };
        Self {
            health,
            countdown,
            row,
            col,
        }
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Infect the agent and reset its recovery countdown.
    pub fn infect(&mut self, sick_duration: u32) {
        self.health = Health::Sick;
        self.countdown = sick_duration;
    }

    /// Advance the sickness of a sick agent by one tick.
    ///
    /// The agent becomes vaccinated (immune, until breakthrough) when the
    /// countdown runs out. Must only be called on sick agents.
    pub fn advance_sickness(&mut self) {
        self.countdown -= 1;
        if self.countdown == 0 {
            self.health = Health::Vaccinated;
        }
    }

    /// Update the stored position after a move.
    pub fn relocate(&mut self, row: usize, col: usize) {
        self.row = row;
        self.col = col;
    }
}

/// Offsets of the 8-cell Moore neighborhood.
///
/// The center offset (0, 0) is deliberately excluded: the center cell always
/// holds the agent under consideration, so it is never empty as a move target
/// and never counts as a sick neighbor on the branches that read the count.
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Toroidal grid of cells.
///
/// Each cell holds at most one index into the agent vector. The grid never
/// owns agents; [`State`] does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    height: usize,
    width: usize,
    cells: Vec<Option<usize>>,
}

impl Grid {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            cells: vec![None; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Wrap possibly-negative coordinates onto the torus.
    pub fn wrap(&self, row: isize, col: isize) -> (usize, usize) {
        let row = row.rem_euclid(self.height as isize) as usize;
        let col = col.rem_euclid(self.width as isize) as usize;
        (row, col)
    }

    /// Index of the agent occupying the cell, if any.
    pub fn occupant(&self, row: usize, col: usize) -> Option<usize> {
        self.cells[row * self.width + col]
    }

    pub fn place(&mut self, row: usize, col: usize, agent_idx: usize) {
        debug_assert!(self.cells[row * self.width + col].is_none());
        self.cells[row * self.width + col] = Some(agent_idx);
    }

    pub fn vacate(&mut self, row: usize, col: usize) {
        self.cells[row * self.width + col] = None;
    }
}

/// State of the simulation at a given step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Grid of cells referencing agents by index.
    pub grid: Grid,

    /// Vector of agents; never grows or shrinks after population.
    pub agents: Vec<Agent>,

    /// Processing order of the agents, reshuffled once per step.
    pub order: Vec<usize>,
}

impl State {
    /// Fraction of agents currently in the given health state.
    pub fn health_fraction(&self, health: Health) -> f64 {
        let count = self
            .agents
            .iter()
            .filter(|agt| agt.health() == health)
            .count();
        count as f64 / self.agents.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sick_agent_starts_with_full_countdown() {
        let agt = Agent::new(Health::Sick, 0, 0, 7);
        assert_eq!(agt.countdown(), 7);
        let agt = Agent::new(Health::Healthy, 0, 0, 7);
        assert_eq!(agt.countdown(), 0);
    }

    #[test]
    fn countdown_reaches_zero_then_vaccinated() {
        let mut agt = Agent::new(Health::Sick, 0, 0, 3);
        agt.advance_sickness();
        assert_eq!((agt.health(), agt.countdown()), (Health::Sick, 2));
        agt.advance_sickness();
        assert_eq!((agt.health(), agt.countdown()), (Health::Sick, 1));
        agt.advance_sickness();
        assert_eq!((agt.health(), agt.countdown()), (Health::Vaccinated, 0));
    }

    #[test]
    fn wrap_is_toroidal() {
        let grid = Grid::new(10, 20);
        assert_eq!(grid.wrap(-1, -1), (9, 19));
        assert_eq!(grid.wrap(10, 20), (0, 0));
        assert_eq!(grid.wrap(3, 7), (3, 7));
    }

    #[test]
    fn place_and_vacate_update_occupancy() {
        let mut grid = Grid::new(4, 4);
        assert_eq!(grid.occupant(2, 3), None);
        grid.place(2, 3, 5);
        assert_eq!(grid.occupant(2, 3), Some(5));
        grid.vacate(2, 3);
        assert_eq!(grid.occupant(2, 3), None);
    }

    #[test]
    fn neighborhood_excludes_center() {
        assert_eq!(NEIGHBOR_OFFSETS.len(), 8);
        assert!(!NEIGHBOR_OFFSETS.contains(&(0, 0)));
    }
}
