use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};

use crate::shared::InputEvent;

use super::grid::GridHit;
use super::mode::TuiState;

const VOLUME_STEP_DB: f32 = 1.0;
const MASTER_STEP_DB: f32 = 1.0;
const DENSITY_STEP: f32 = 0.1;
const BPM_STEP: f64 = 1.0;
const SWING_STEP: f64 = 0.02;
const FX_STEP: f32 = 0.05;

// poll for input from the terminal, keep the cursor in tuistate, and resolve
// keys and mouse gestures into semantic input events for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    match event::read()? {
        // repeats are fine for cursor movement and knobs
        Event::Key(key) if key.kind != KeyEventKind::Release => Ok(handle_key(key.code, ts)),
        Event::Mouse(mouse) => Ok(handle_mouse(mouse, ts)),
        _ => Ok(vec![]),
    }
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    let (lane, step) = ts.cursor();
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],

        KeyCode::Up => { ts.move_cursor(-1, 0); vec![] }
        KeyCode::Down => { ts.move_cursor(1, 0); vec![] }
        KeyCode::Left => { ts.move_cursor(0, -1); vec![] }
        KeyCode::Right => { ts.move_cursor(0, 1); vec![] }
        KeyCode::Enter => vec![InputEvent::ToggleStep { lane, step }],

        KeyCode::Char(c) => match c {
            ' ' => vec![InputEvent::TogglePlay],
            '.' => vec![InputEvent::Stop],

            // lane under the cursor
            'm' => vec![InputEvent::ToggleLane(lane)],
            'c' => vec![InputEvent::ClearLane(lane)],
            'C' => vec![InputEvent::ClearAll],
            'r' => vec![InputEvent::RandomizeLane(lane)],
            'n' => vec![InputEvent::AdjustDensity(lane, -DENSITY_STEP)],
            'N' => vec![InputEvent::AdjustDensity(lane, DENSITY_STEP)],
            '-' => vec![InputEvent::AdjustVolume(lane, -VOLUME_STEP_DB)],
            '=' => vec![InputEvent::AdjustVolume(lane, VOLUME_STEP_DB)],
            'g' => vec![InputEvent::NextGroove],
            '_' => vec![InputEvent::AdjustMaster(-MASTER_STEP_DB)],
            '+' => vec![InputEvent::AdjustMaster(MASTER_STEP_DB)],
            'p' => vec![InputEvent::Audition],

            // globals, lowercase = down and shifted = up
            '[' => vec![InputEvent::AdjustBpm(-BPM_STEP)],
            ']' => vec![InputEvent::AdjustBpm(BPM_STEP)],
            '{' => vec![InputEvent::AdjustSwing(-SWING_STEP)],
            '}' => vec![InputEvent::AdjustSwing(SWING_STEP)],
            'e' => vec![InputEvent::AdjustReverb(-FX_STEP)],
            'E' => vec![InputEvent::AdjustReverb(FX_STEP)],
            'y' => vec![InputEvent::AdjustDelay(-FX_STEP)],
            'Y' => vec![InputEvent::AdjustDelay(FX_STEP)],
            'K' => vec![InputEvent::CycleKey],
            'd' => vec![InputEvent::ToggleKit],
            't' => vec![InputEvent::ToggleRatchet],

            'v' => vec![InputEvent::StepVibe(1)],
            'V' => vec![InputEvent::StepVibe(-1)],
            '1'..='4' => vec![InputEvent::QueueScene(scene_slot(c))],
            '!' | '@' | '#' | '$' => vec![InputEvent::SaveScene(scene_slot(c))],

            'w' => vec![InputEvent::SaveState],
            'o' => vec![InputEvent::ToggleRecording],
            _ => vec![],
        },
        _ => vec![],
    }
}

// 1-4 and their shifted symbols on a US layout
fn scene_slot(c: char) -> usize {
    match c {
        '1' | '!' => 0,
        '2' | '@' => 1,
        '3' | '#' => 2,
        _ => 3,
    }
}

fn handle_mouse(mouse: MouseEvent, ts: &mut TuiState) -> Vec<InputEvent> {
    let hit = ts.grid.and_then(|g| g.hit(mouse.column, mouse.row));
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => match hit {
            Some(GridHit::Label(lane)) => vec![InputEvent::ToggleLane(lane)],
            Some(GridHit::Cell { lane, step }) => {
                ts.place_cursor(lane, step);
                ts.painting = true;
                vec![InputEvent::PaintStart { lane, step }]
            }
            None => vec![],
        },
        MouseEventKind::Drag(MouseButton::Left) if ts.painting => match hit {
            Some(GridHit::Cell { lane, step }) => vec![InputEvent::PaintEnter { lane, step }],
            _ => vec![],
        },
        // release anywhere ends the gesture, even off the grid
        MouseEventKind::Up(MouseButton::Left) if ts.painting => {
            ts.painting = false;
            vec![InputEvent::PaintEnd]
        }
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

    use super::{handle_key, handle_mouse};
    use crate::sequencer::lane::Lane;
    use crate::shared::InputEvent;
    use crate::tui::grid::GridGeometry;
    use crate::tui::mode::TuiState;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent { kind, column, row, modifiers: KeyModifiers::NONE }
    }

    #[test]
    fn keys_act_on_the_cursor_lane() {
        let mut ts = TuiState::default();
        assert!(handle_key(KeyCode::Down, &mut ts).is_empty());
        assert!(handle_key(KeyCode::Right, &mut ts).is_empty());
        assert_eq!(
            handle_key(KeyCode::Enter, &mut ts),
            vec![InputEvent::ToggleStep { lane: Lane::Snare, step: 1 }]
        );
        assert_eq!(handle_key(KeyCode::Char('m'), &mut ts), vec![InputEvent::ToggleLane(Lane::Snare)]);
        assert_eq!(handle_key(KeyCode::Char('r'), &mut ts), vec![InputEvent::RandomizeLane(Lane::Snare)]);
    }

    #[test]
    fn scene_keys_pick_slots() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Char('3'), &mut ts), vec![InputEvent::QueueScene(2)]);
        assert_eq!(handle_key(KeyCode::Char('$'), &mut ts), vec![InputEvent::SaveScene(3)]);
        assert_eq!(handle_key(KeyCode::Char('!'), &mut ts), vec![InputEvent::SaveScene(0)]);
        assert_eq!(handle_key(KeyCode::Esc, &mut ts), vec![InputEvent::Quit]);
    }

    #[test]
    fn master_and_sound_check_keys() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Char('_'), &mut ts), vec![InputEvent::AdjustMaster(-1.0)]);
        assert_eq!(handle_key(KeyCode::Char('+'), &mut ts), vec![InputEvent::AdjustMaster(1.0)]);
        assert_eq!(handle_key(KeyCode::Char('p'), &mut ts), vec![InputEvent::Audition]);
    }

    #[test]
    fn mouse_drag_paints_one_gesture() {
        let mut ts = TuiState { grid: Some(GridGeometry::new(0, 0)), ..TuiState::default() };

        let down = handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 8, 2), &mut ts);
        assert_eq!(down, vec![InputEvent::PaintStart { lane: Lane::Hihat, step: 0 }]);
        assert_eq!(ts.cursor(), (Lane::Hihat, 0));

        let drag = handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 11, 2), &mut ts);
        assert_eq!(drag, vec![InputEvent::PaintEnter { lane: Lane::Hihat, step: 1 }]);

        // released well outside the grid
        let up = handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 200, 40), &mut ts);
        assert_eq!(up, vec![InputEvent::PaintEnd]);
        assert!(!ts.painting);
    }

    #[test]
    fn clicking_a_label_mutes_instead_of_painting() {
        let mut ts = TuiState { grid: Some(GridGeometry::new(0, 0)), ..TuiState::default() };
        let down = handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 1, 3), &mut ts);
        assert_eq!(down, vec![InputEvent::ToggleLane(Lane::Bass)]);
        assert!(!ts.painting);
        assert!(handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 1, 3), &mut ts).is_empty());
    }
}
