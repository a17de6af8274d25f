use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::sequencer::lane::Lane;
use crate::sequencer::pattern::STEPS;
use crate::shared::DisplayState;

use super::mode::TuiState;

const LABEL_WIDTH: u16 = 7;
const CELL_WIDTH: u16 = 3;
const BEAT: u16 = 4;
// one blank column between beats
const GROUP_WIDTH: u16 = BEAT * CELL_WIDTH + 1;

const GRID_WIDTH: u16 = LABEL_WIDTH + (STEPS as u16 / BEAT) * GROUP_WIDTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridHit {
    Label(Lane),
    Cell { lane: Lane, step: usize },
}

/// Where the grid landed on screen, for mouse hit testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub x: u16,
    pub y: u16,
}

impl GridGeometry {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    pub fn hit(&self, col: u16, row: u16) -> Option<GridHit> {
        let lane_row = usize::from(row.checked_sub(self.y)?);
        let lane = *Lane::ALL.get(lane_row)?;
        let rel = col.checked_sub(self.x)?;
        if rel < LABEL_WIDTH {
            return Some(GridHit::Label(lane));
        }
        let rel = rel - LABEL_WIDTH;
        let within = rel % GROUP_WIDTH;
        if within >= BEAT * CELL_WIDTH {
            return None;
        }
        let step = usize::from((rel / GROUP_WIDTH) * BEAT + within / CELL_WIDTH);
        (step < STEPS).then_some(GridHit::Cell { lane, step })
    }
}

fn cell_span(state: &DisplayState, ts: &TuiState, lane: Lane, step: usize) -> Span<'static> {
    let on = state.pattern[lane][step];
    let muted = !state.active[lane];
    let mut style = match (on, muted) {
        (true, false) => Style::default().fg(Color::LightMagenta),
        (true, true) => Style::default().fg(Color::DarkGray),
        (false, _) if step % 4 == 0 => Style::default().fg(Color::Gray),
        (false, _) => Style::default().fg(Color::DarkGray),
    };
    if state.playhead == Some(step) {
        style = style.bg(Color::Rgb(40, 20, 60));
    }
    if ts.cursor() == (lane, step) {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(if on { " ■ " } else { " · " }, style)
}

fn lane_line(state: &DisplayState, ts: &TuiState, lane: Lane) -> Line<'static> {
    let label_style = if state.active[lane] {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
    };
    let mut spans = vec![Span::styled(
        format!("{:<width$}", lane.name(), width = usize::from(LABEL_WIDTH)),
        label_style,
    )];
    for step in 0..STEPS {
        spans.push(cell_span(state, ts, lane, step));
        if step % usize::from(BEAT) == usize::from(BEAT) - 1 {
            spans.push(Span::raw(" "));
        }
    }
    Line::from(spans)
}

// volume and randomize density, to the right of the cells
fn mix_line(state: &DisplayState, lane: Lane) -> Line<'static> {
    Line::styled(
        format!("{:>4.0}dB {:>3.0}%", state.volumes[lane], state.density[lane] * 100.0),
        Style::default().fg(Color::DarkGray),
    )
}

pub fn draw_step_grid(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) -> GridGeometry {
    let [cells, mix] = Layout::horizontal([Constraint::Length(GRID_WIDTH), Constraint::Min(0)]).areas(area);
    let lines: Vec<Line> = Lane::ALL.iter().map(|&lane| lane_line(state, ts, lane)).collect();
    frame.render_widget(Paragraph::new(lines), cells);
    let mix_lines: Vec<Line> = Lane::ALL.iter().map(|&lane| mix_line(state, lane)).collect();
    frame.render_widget(Paragraph::new(mix_lines), mix);
    GridGeometry::new(cells.x, cells.y)
}
