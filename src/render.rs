use crate::model::{Agent, Grid};
use anyhow::Result;

/// One colored cell to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub row: usize,
    pub col: usize,
    pub color: [u8; 3],
}

/// Rendering surface the engine hands the grid to once per tick.
///
/// Actual display backends live outside this crate; they implement this
/// trait and typically consume [`draw_commands`].
pub trait Surface {
    fn render(&mut self, grid: &Grid, agents: &[Agent]) -> Result<()>;
}

/// Surface that discards every frame, used by the headless CLI.
pub struct NullSurface;

impl Surface for NullSurface {
    fn render(&mut self, _grid: &Grid, _agents: &[Agent]) -> Result<()> {
        Ok(())
    }
}

/// Draw command for every cell of the grid, occupied cells colored by the
/// occupant's health state and empty cells black.
pub fn draw_commands<'a>(
    grid: &'a Grid,
    agents: &'a [Agent],
) -> impl Iterator<Item = DrawCommand> + 'a {
    (0..grid.height()).flat_map(move |row| {
        (0..grid.width()).map(move |col| {
            let color = match grid.occupant(row, col) {
                Some(idx) => agents[idx].health().color(),
                None => [0, 0, 0],
            };
            DrawCommand { row, col, color }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, Grid, Health};

    #[test]
    fn commands_cover_the_whole_grid() {
        let mut grid = Grid::new(3, 4);
        let agents = vec![
            Agent::new(Health::Sick, 0, 0, 5),
            Agent::new(Health::Vaccinated, 2, 3, 5),
        ];
        grid.place(0, 0, 0);
        grid.place(2, 3, 1);

        let cmds: Vec<_> = draw_commands(&grid, &agents).collect();
        assert_eq!(cmds.len(), 12);
        assert_eq!(cmds[0].color, [255, 0, 0]);
        assert_eq!(cmds[11].color, [0, 255, 0]);
        assert!(cmds[1..11].iter().all(|cmd| cmd.color == [0, 0, 0]));
    }
}
