// The middle layer: turns semantic input events into sequencer calls and
// builds the per-frame DisplayState. It is the only UI-side code that locks
// the shared sequencer.

use std::collections::VecDeque;

use crossbeam_channel::Receiver;

use crate::audio::AudioClock;
use crate::scheduler::START_LATENCY;
use crate::sequencer::clock::TransportState;
use crate::sequencer::dispatch::StepMarker;
use crate::sequencer::lane::Lane;
use crate::sequencer::pattern::{Groove, MAX_VOLUME_DB, MIN_VOLUME_DB};
use crate::sequencer::preset::FxLevels;
use crate::sequencer::SharedSequencer;
use crate::shared::{DisplayState, HostAction, InputEvent};

pub struct Middle {
    sequencer: SharedSequencer,
    clock: AudioClock,
    playhead_rx: Receiver<StepMarker>,
    // markers arrive one lookahead early; they wait here until they're audible
    upcoming: VecDeque<StepMarker>,
    playhead: Option<usize>,
    next_groove: usize,
    recording: bool,
    message: String,
}

impl Middle {
    pub fn new(sequencer: SharedSequencer, clock: AudioClock, playhead_rx: Receiver<StepMarker>) -> Self {
        Self {
            sequencer,
            clock,
            playhead_rx,
            upcoming: VecDeque::new(),
            playhead: None,
            next_groove: 0,
            recording: false,
            message: String::from("space to play, esc to quit"),
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Option<HostAction> {
        let now = self.clock.now();
        let mut seq = self.sequencer.lock();
        match event {
            InputEvent::TogglePlay => {
                seq.toggle_play(now + START_LATENCY);
                self.upcoming.clear();
                if !seq.is_running() {
                    self.playhead = None;
                }
            }
            InputEvent::Stop => {
                seq.stop();
                self.upcoming.clear();
                self.playhead = None;
            }

            InputEvent::ToggleStep { lane, step } => seq.store_mut().toggle_step(lane, step),
            InputEvent::PaintStart { lane, step } => seq.store_mut().begin_paint(lane, step),
            InputEvent::PaintEnter { lane, step } => seq.store_mut().paint_enter(lane, step),
            InputEvent::PaintEnd => seq.store_mut().end_paint(),
            InputEvent::ToggleLane(lane) => seq.store_mut().toggle_active(lane),
            InputEvent::ClearLane(lane) => {
                seq.store_mut().clear_lane(lane);
                self.message = format!("cleared {lane}");
            }
            InputEvent::ClearAll => {
                seq.store_mut().clear_all();
                self.message = "cleared all lanes".into();
            }
            InputEvent::RandomizeLane(lane) => {
                seq.store_mut().randomize_lane(lane);
                let density = seq.store().density()[lane];
                self.message = format!("randomized {lane} at {:.0}%", density * 100.0);
            }
            InputEvent::NextGroove => {
                let groove = Groove::ALL[self.next_groove % Groove::ALL.len()];
                self.next_groove += 1;
                seq.store_mut().apply_groove(groove);
                self.message = format!("groove: {}", groove.label());
            }

            InputEvent::AdjustVolume(lane, delta) => {
                let db = (seq.store().volumes()[lane] + delta).clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
                seq.store_mut().set_volume(lane, db);
            }
            InputEvent::AdjustDensity(lane, delta) => {
                let p = seq.store().density()[lane] + delta;
                seq.store_mut().set_density(lane, p);
            }
            InputEvent::AdjustMaster(delta) => {
                let db = seq.master_db() + delta;
                seq.set_master_db(db);
                self.message = format!("master {:.0} dB", seq.master_db());
            }
            InputEvent::Audition => seq.audition(Lane::Kick, now),

            InputEvent::AdjustBpm(delta) => {
                let bpm = seq.bpm() + delta;
                seq.set_tempo(bpm, now);
            }
            InputEvent::AdjustSwing(delta) => {
                let swing = seq.swing() + delta;
                seq.set_swing(swing);
            }
            InputEvent::CycleKey => {
                let key = seq.key().next();
                seq.set_key(key);
                self.message = format!("key: {} minor", key.label());
            }
            InputEvent::AdjustReverb(delta) => {
                let fx = seq.fx();
                seq.set_fx(FxLevels {
                    reverb_wet: fx.reverb_wet + delta,
                    ..fx
                });
            }
            InputEvent::AdjustDelay(delta) => {
                let fx = seq.fx();
                seq.set_fx(FxLevels {
                    delay_wet: fx.delay_wet + delta,
                    ..fx
                });
            }
            InputEvent::ToggleKit => {
                let kit = seq.kit().toggled();
                seq.set_kit(kit);
                self.message = format!("drum kit: {}", kit.label());
            }
            InputEvent::ToggleRatchet => {
                let on = !seq.ratchet_hats();
                seq.set_ratchet_hats(on);
                self.message = format!("hi-hat ratchet {}", if on { "on" } else { "off" });
            }

            InputEvent::StepVibe(delta) => {
                let count = seq.presets().vibes().len() as isize;
                let current = seq.presets().vibe_index() as isize;
                let id = (current + isize::from(delta)).rem_euclid(count) as usize;
                seq.load_vibe(id, now);
                let vibe = &seq.presets().vibes()[id];
                self.message = format!("vibe: {} ({})", vibe.name, vibe.description);
            }
            InputEvent::SaveScene(slot) => {
                seq.save_scene(slot);
                self.message = format!("saved scene {}", slot + 1);
            }
            InputEvent::QueueScene(slot) => {
                if seq.presets().scene(slot).is_none() {
                    self.message = format!("scene {} is empty", slot + 1);
                } else {
                    seq.queue_scene(slot);
                    self.message = match seq.queued_scene() {
                        Some(s) => format!("scene {} on the next bar", s + 1),
                        None => format!("loaded scene {}", slot + 1),
                    };
                }
            }

            InputEvent::SaveState => return Some(HostAction::SaveState),
            InputEvent::ToggleRecording => return Some(HostAction::ToggleRecording),
            InputEvent::Quit => return Some(HostAction::Quit),
        }
        None
    }

    // Moves the playhead to the last marker whose time has come.
    fn advance_playhead(&mut self, now: f64, transport: TransportState) {
        self.upcoming.extend(self.playhead_rx.try_iter());
        if transport == TransportState::Stopped {
            self.upcoming.clear();
            self.playhead = None;
            return;
        }
        while self.upcoming.front().is_some_and(|m| m.at_time <= now) {
            if let Some(marker) = self.upcoming.pop_front() {
                self.playhead = Some(marker.step);
            }
        }
    }

    pub fn display_state(&mut self) -> DisplayState {
        let now = self.clock.now();
        let transport = self.sequencer.lock().state();
        self.advance_playhead(now, transport);

        let seq = self.sequencer.lock();
        let presets = seq.presets();
        DisplayState {
            pattern: seq.store().pattern().clone(),
            active: seq.store().active().clone(),
            volumes: seq.store().volumes().clone(),
            density: seq.store().density().clone(),
            playhead: self.playhead,
            transport,
            bpm: seq.bpm(),
            swing: seq.swing(),
            key: seq.key(),
            kit: seq.kit(),
            ratchet: seq.ratchet_hats(),
            fx: seq.fx(),
            master_db: seq.master_db(),
            vibe_name: presets.vibe(presets.vibe_index()).map_or("", |v| v.name),
            scene_index: presets.scene_index(),
            saved_scenes: presets.saved_scenes(),
            queued_scene: seq.queued_scene(),
            recording: self.recording,
            message: self.message.clone(),
        }
    }
}
