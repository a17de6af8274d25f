use crate::sequencer::lane::{Lane, LANE_COUNT};
use crate::sequencer::pattern::STEPS;

use super::grid::GridGeometry;

// state local to the tui: the keyboard cursor and where the grid was last
// drawn, so mouse coordinates can be resolved into lane/step
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub cursor_lane: usize,
    pub cursor_step: usize,
    // refreshed after every draw
    pub grid: Option<GridGeometry>,
    // a left-button drag that started on a cell
    pub painting: bool,
}

impl TuiState {
    pub fn cursor(&self) -> (Lane, usize) {
        (Lane::ALL[self.cursor_lane], self.cursor_step)
    }

    pub fn move_cursor(&mut self, d_lane: isize, d_step: isize) {
        self.cursor_lane = (self.cursor_lane as isize + d_lane).rem_euclid(LANE_COUNT as isize) as usize;
        self.cursor_step = (self.cursor_step as isize + d_step).rem_euclid(STEPS as isize) as usize;
    }

    pub fn place_cursor(&mut self, lane: Lane, step: usize) {
        self.cursor_lane = lane.index();
        self.cursor_step = step;
    }
}

#[cfg(test)]
mod tests {
    use super::TuiState;
    use crate::sequencer::lane::Lane;

    #[test]
    fn cursor_wraps_around_the_grid() {
        let mut ts = TuiState::default();
        ts.move_cursor(-1, -1);
        assert_eq!(ts.cursor(), (Lane::Adlib, 15));
        ts.move_cursor(1, 2);
        assert_eq!(ts.cursor(), (Lane::Kick, 1));
    }
}
