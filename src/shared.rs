// Types shared by the TUI and the middle layer.
//
// Key plan (resolved into semantic InputEvents by tui::input):
//
//   arrows          move the cursor over the lane × step grid
//   Enter           toggle the step under the cursor
//   mouse drag      paint steps along one lane (first cell decides on/off)
//   click a name    mute / unmute that lane
//   Space           play / pause       .   stop
//   m               mute / unmute the cursor's lane
//   c / C           clear lane / clear everything
//   r               randomize lane at its density   n / N  density - / +
//   - / =           lane volume - / +  _ / +  master volume - / +
//   p               play the kick once (sound check)
//   [ / ]           bpm - / +          { / }  swing - / +
//   K               next minor key
//   e / E           reverb wet - / +   y / Y  delay wet - / +
//   d               drum kit synth/grime          t  hi-hat ratchet
//   g               stamp the next groove preset
//   v / V           next / previous vibe
//   1-4             queue scene        ! @ # $  save scene 1-4
//   w               save state now     o  start/stop recording
//                   (the state also saves itself a moment after each change)
//   Esc             quit (saves)
//
// The idea of the rendering process: only the middle layer touches the
// sequencer; the TUI draws a DisplayState built once per frame.

use crate::sequencer::clock::TransportState;
use crate::sequencer::dispatch::DrumKit;
use crate::sequencer::lane::{Lane, LaneMap};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::preset::{FxLevels, NUM_SCENES};
use crate::sequencer::scale::MinorKey;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // transport
    TogglePlay,
    Stop,

    // grid editing
    ToggleStep { lane: Lane, step: usize },
    PaintStart { lane: Lane, step: usize },
    PaintEnter { lane: Lane, step: usize },
    PaintEnd,
    ToggleLane(Lane),
    ClearLane(Lane),
    ClearAll,
    RandomizeLane(Lane),
    NextGroove,

    // mixer / lane settings
    AdjustVolume(Lane, f32),
    AdjustDensity(Lane, f32),
    AdjustMaster(f32),
    Audition,

    // globals
    AdjustBpm(f64),
    AdjustSwing(f64),
    CycleKey,
    AdjustReverb(f32),
    AdjustDelay(f32),
    ToggleKit,
    ToggleRatchet,

    // presets
    StepVibe(i8),
    SaveScene(usize),
    QueueScene(usize),

    // host
    SaveState,
    ToggleRecording,
    Quit,
}

/// Things only the host loop can do (files, devices, exit).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostAction {
    SaveState,
    ToggleRecording,
    Quit,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub pattern: Pattern,
    pub active: LaneMap<bool>,
    pub volumes: LaneMap<f32>,
    pub density: LaneMap<f32>,
    pub playhead: Option<usize>, // step currently sounding, if playing
    pub transport: TransportState,
    pub bpm: f64,
    pub swing: f64,
    pub key: MinorKey,
    pub kit: DrumKit,
    pub ratchet: bool,
    pub fx: FxLevels,
    pub master_db: f32,
    pub vibe_name: &'static str,
    pub scene_index: usize,
    pub saved_scenes: [bool; NUM_SCENES],
    pub queued_scene: Option<usize>,
    pub recording: bool,
    pub message: String, // last status line
}
