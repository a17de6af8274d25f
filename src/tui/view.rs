use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::sequencer::clock::TransportState;
use crate::sequencer::lane::LANE_COUNT;
use crate::shared::DisplayState;

use super::grid::{draw_step_grid, GridGeometry};
use super::mode::TuiState;

const HELP: &str = "space play  . stop  arrows/enter edit  m mute  r rand  c/C clear  -/= vol  _/+ master  p test  \
[ ] bpm  { } swing  K key  e/E verb  y/Y delay  d kit  t ratchet  g groove  v/V vibe  1-4 scene  !@#$ save  o rec  esc quit";

// draws one frame and returns where the step grid went
pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) -> GridGeometry {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),                      // transport + presets
            Constraint::Length(LANE_COUNT as u16 + 2), // step grid
            Constraint::Min(2),                         // status + help
        ])
        .split(area);

    draw_header(frame, sections[0], state);

    let block = Block::default().borders(Borders::ALL).title(" neonbeat ");
    let grid_area = block.inner(sections[1]);
    frame.render_widget(block, sections[1]);
    let geometry = draw_step_grid(frame, grid_area, state, ts);

    draw_footer(frame, sections[2], state);
    geometry
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (icon, color) = match state.transport {
        TransportState::Running => ("▶ PLAY ", Color::LightGreen),
        TransportState::Paused => ("❚❚ PAUSE", Color::Yellow),
        TransportState::Stopped => ("■ STOP ", Color::Gray),
    };
    let dim = Style::default().fg(Color::DarkGray);

    let mut top = vec![
        Span::styled(icon, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {:.1} bpm", state.bpm)),
        Span::styled("  swing ", dim),
        Span::raw(format!("{:.2}", state.swing)),
        Span::styled("  key ", dim),
        Span::raw(format!("{} minor", state.key.label())),
        Span::styled("  kit ", dim),
        Span::raw(state.kit.label()),
        Span::styled("  ratchet ", dim),
        Span::raw(if state.ratchet { "on" } else { "off" }),
    ];
    if state.recording {
        top.push(Span::styled("  ● REC", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)));
    }

    let mut bottom = vec![Span::styled("vibe ", dim), Span::raw(state.vibe_name), Span::styled("  scenes ", dim)];
    for (slot, saved) in state.saved_scenes.iter().enumerate() {
        let style = if state.queued_scene == Some(slot) {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else if slot == state.scene_index {
            Style::default().fg(Color::LightMagenta).add_modifier(Modifier::BOLD)
        } else if *saved {
            Style::default()
        } else {
            dim
        };
        bottom.push(Span::styled(format!("[{}]", slot + 1), style));
    }
    bottom.push(Span::styled("  reverb ", dim));
    bottom.push(Span::raw(format!("{:.2}", state.fx.reverb_wet)));
    bottom.push(Span::styled("  delay ", dim));
    bottom.push(Span::raw(format!("{:.2}", state.fx.delay_wet)));
    bottom.push(Span::styled("  master ", dim));
    bottom.push(Span::raw(format!("{:.0} dB", state.master_db)));

    let header = Paragraph::new(vec![Line::from(top), Line::from(bottom)])
        .block(Block::default().borders(Borders::TOP | Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines = vec![
        Line::from(Span::styled(state.message.clone(), Style::default().fg(Color::LightCyan))),
        Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::render;
    use crate::sequencer::lane::Lane;
    use crate::sequencer::Sequencer;
    use crate::tui::grid::GridHit;
    use crate::tui::mode::TuiState;

    #[test]
    fn grid_geometry_matches_what_was_drawn() {
        let mut middle = {
            let (_tx, rx) = crossbeam_channel::unbounded();
            crate::middle::Middle::new(Sequencer::default().into_shared(), crate::audio::AudioClock::wall(), rx)
        };
        let state = middle.display_state();
        let ts = TuiState::default();

        let mut terminal = Terminal::new(TestBackend::new(120, 24)).expect("terminal");
        let mut geometry = None;
        terminal
            .draw(|frame| geometry = Some(render(frame, frame.area(), &state, &ts)))
            .expect("draw");
        let geometry = geometry.expect("geometry");

        let buffer = terminal.backend().buffer();
        let row: String = (geometry.x..geometry.x + 5).map(|x| buffer[(x, geometry.y)].symbol()).collect();
        assert_eq!(row, "kick ");
        assert_eq!(geometry.hit(geometry.x, geometry.y + 2), Some(GridHit::Label(Lane::Hihat)));
    }
}
