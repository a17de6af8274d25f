pub mod clock;
pub mod dispatch;
pub mod duck;
pub mod lane;
pub mod pattern;
pub mod preset;
pub mod scale;
pub mod snapshot;

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use clock::{OneShotId, Transport, TransportState};
use dispatch::{DispatchContext, Dispatcher, DrumKit, SoundEngine, StepMarker};
use lane::Lane;
use pattern::{PatternStore, MAX_VOLUME_DB, MIN_VOLUME_DB};
use preset::{FxLevels, Presets, NUM_SCENES};
use scale::MinorKey;
use snapshot::{Snapshot, SnapshotPatch};

pub const DEFAULT_BPM: f64 = 110.0;
pub const DEFAULT_SWING: f64 = 0.18;
pub const DEFAULT_MASTER_DB: f32 = -6.0;

/// Work deferred to the next bar line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarAction {
    LoadScene(usize),
}

pub type SharedSequencer = Arc<Mutex<Sequencer>>;

/// The one live instance: transport, grid, key, fx and presets. The
/// scheduler thread renders from it and the UI mutates it, both through
/// `SharedSequencer`.
pub struct Sequencer {
    transport: Transport<BarAction>,
    store: PatternStore,
    presets: Presets,
    dispatcher: Dispatcher,
    key: MinorKey,
    fx: FxLevels,
    fx_dirty: bool,
    // output level; never part of the snapshot
    master_db: f32,
    master_dirty: bool,
    auditions: Vec<(Lane, f64)>,
    kit: DrumKit,
    ratchet_hats: bool,
    // slot plus the bar one-shot that will load it
    queued_scene: Option<(usize, OneShotId)>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::with_playhead(None)
    }
}

impl Sequencer {
    pub fn with_playhead(playhead: Option<Sender<StepMarker>>) -> Self {
        Self {
            transport: Transport::new(DEFAULT_BPM, DEFAULT_SWING),
            store: PatternStore::default(),
            presets: Presets::default(),
            dispatcher: Dispatcher::new(playhead),
            key: MinorKey::default(),
            fx: FxLevels::default(),
            fx_dirty: true,
            master_db: DEFAULT_MASTER_DB,
            master_dirty: true,
            auditions: Vec::new(),
            kit: DrumKit::default(),
            ratchet_hats: false,
            queued_scene: None,
        }
    }

    pub fn into_shared(self) -> SharedSequencer {
        Arc::new(Mutex::new(self))
    }

    // ---- transport ----

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    pub fn bpm(&self) -> f64 {
        self.transport.bpm()
    }

    pub fn swing(&self) -> f64 {
        self.transport.swing()
    }

    pub fn start(&mut self, now: f64) {
        self.queued_scene = None;
        self.transport.start(now);
        log::info!("transport started at {now:.3}s, {:.1} bpm", self.bpm());
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        log::info!("transport paused at step {}", self.transport.position());
    }

    pub fn stop(&mut self) {
        if self.queued_scene.take().is_some() {
            log::debug!("stop abandons the queued scene");
        }
        self.transport.stop();
        log::info!("transport stopped");
    }

    /// Play/pause button semantics: pause when running, otherwise restart.
    pub fn toggle_play(&mut self, now: f64) {
        if self.is_running() {
            self.pause();
        } else {
            self.start(now);
        }
    }

    pub fn set_tempo(&mut self, bpm: f64, now: f64) -> bool {
        self.transport.set_tempo(bpm, now)
    }

    pub fn set_swing(&mut self, amount: f64) {
        self.transport.set_swing(amount);
    }

    // ---- global performance settings ----

    pub fn key(&self) -> MinorKey {
        self.key
    }

    pub fn set_key(&mut self, key: MinorKey) {
        self.key = key;
    }

    pub fn fx(&self) -> FxLevels {
        self.fx
    }

    pub fn set_fx(&mut self, fx: FxLevels) {
        self.fx = fx.clamped();
        self.fx_dirty = true;
    }

    pub fn master_db(&self) -> f32 {
        self.master_db
    }

    pub fn set_master_db(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        self.master_db = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
        self.master_dirty = true;
    }

    /// Plays one synth hit of `lane` at the next render, running or not.
    pub fn audition(&mut self, lane: Lane, now: f64) {
        self.auditions.push((lane, now));
    }

    pub fn kit(&self) -> DrumKit {
        self.kit
    }

    pub fn set_kit(&mut self, kit: DrumKit) {
        self.kit = kit;
    }

    pub fn ratchet_hats(&self) -> bool {
        self.ratchet_hats
    }

    pub fn set_ratchet_hats(&mut self, on: bool) {
        self.ratchet_hats = on;
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PatternStore {
        &mut self.store
    }

    // ---- presets ----

    pub fn presets(&self) -> &Presets {
        &self.presets
    }

    pub fn queued_scene(&self) -> Option<usize> {
        self.queued_scene.map(|(slot, _)| slot)
    }

    /// Replaces tempo, swing, fx, active lanes, volumes and the grid in one
    /// go. The grid is copied out of the vibe.
    pub fn load_vibe(&mut self, id: usize, now: f64) {
        let Some(vibe) = self.presets.vibe(id).cloned() else {
            panic!("vibe {id} out of range");
        };
        self.transport.set_tempo(vibe.bpm, now);
        self.transport.set_swing(vibe.swing);
        self.set_fx(vibe.fx);
        self.store.replace_active(vibe.active);
        self.store.replace_volumes(vibe.volumes);
        self.store.replace_pattern(vibe.pattern);
        self.presets.select_vibe(id);
        log::info!("loaded vibe '{}'", vibe.name);
    }

    pub fn save_scene(&mut self, slot: usize) {
        self.presets.save_scene(slot, self.store.pattern());
        log::info!("saved scene {}", slot + 1);
    }

    /// Loads a saved scene now, whatever the transport is doing. Returns
    /// false for an empty slot.
    pub fn load_scene(&mut self, slot: usize) -> bool {
        let Some(pattern) = self.presets.scene(slot).cloned() else {
            log::debug!("scene {} is empty", slot + 1);
            return false;
        };
        self.store.replace_pattern(pattern);
        self.presets.select_scene(slot);
        log::info!("loaded scene {}", slot + 1);
        true
    }

    /// Immediate when not running; otherwise the load happens on the next bar
    /// line, reading whatever the slot holds at that point.
    pub fn queue_scene(&mut self, slot: usize) {
        assert!(slot < NUM_SCENES, "scene slot {slot} out of range");
        // a newer request replaces the one still waiting
        if let Some((_, id)) = self.queued_scene.take() {
            self.transport.cancel(id);
        }
        match self.transport.schedule_at_next_bar(BarAction::LoadScene(slot)) {
            Some(id) => {
                self.queued_scene = Some((slot, id));
                log::debug!(
                    "scene {} queued for the next bar ({} pending)",
                    slot + 1,
                    self.transport.pending_one_shots()
                );
            }
            None => {
                self.load_scene(slot);
            }
        }
    }

    fn run_bar_action(&mut self, action: BarAction) {
        match action {
            BarAction::LoadScene(slot) => {
                if self.queued_scene() == Some(slot) {
                    self.queued_scene = None;
                }
                self.load_scene(slot);
            }
        }
    }

    // ---- rendering ----

    /// Dispatches every pulse scheduled before `until`. Bar actions due on a
    /// pulse run before that pulse is dispatched.
    pub fn render(&mut self, until: f64, engine: &mut dyn SoundEngine) -> usize {
        if self.fx_dirty {
            engine.set_fx(self.fx);
            self.fx_dirty = false;
        }
        if self.master_dirty {
            engine.set_master(self.master_db);
            self.master_dirty = false;
        }
        let mut fired = 0;
        if !self.auditions.is_empty() {
            let sixteenth = 15.0 / self.bpm();
            let ctx = DispatchContext {
                store: &self.store,
                key: self.key,
                kit: self.kit,
                ratchet_hats: self.ratchet_hats,
            };
            for (lane, at_time) in self.auditions.drain(..) {
                fired += self.dispatcher.audition(lane, at_time, sixteenth, &ctx, engine);
            }
        }
        while let Some(pulse) = self.transport.next_pulse_before(until) {
            for action in self.transport.take_due(pulse.index) {
                self.run_bar_action(action);
            }
            let ctx = DispatchContext {
                store: &self.store,
                key: self.key,
                kit: self.kit,
                ratchet_hats: self.ratchet_hats,
            };
            fired += self.dispatcher.dispatch(&pulse, &ctx, engine);
        }
        fired
    }

    // ---- snapshot ----

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pattern: self.store.pattern().clone(),
            active: self.store.active().clone(),
            bpm: self.bpm(),
            swing: self.swing(),
            minor_key: self.key,
            reverb_wet: self.fx.reverb_wet,
            delay_wet: self.fx.delay_wet,
            volumes: self.store.volumes().clone(),
        }
    }

    /// Applies whatever the patch carries; absent fields keep their current
    /// values and bad ones are skipped.
    pub fn apply_snapshot(&mut self, patch: &SnapshotPatch, now: f64) {
        for (lane, row) in patch.rows() {
            self.store.set_row(lane, row);
        }
        for (lane, on) in patch.active_flags() {
            self.store.set_active(lane, on);
        }
        for (lane, db) in patch.volume_levels() {
            self.store.set_volume(lane, db);
        }
        if let Some(bpm) = patch.bpm {
            self.transport.set_tempo(bpm, now);
        }
        if let Some(swing) = patch.swing {
            self.transport.set_swing(swing);
        }
        if let Some(key) = patch.key() {
            self.key = key;
        }
        let fx = FxLevels {
            reverb_wet: patch.reverb_wet.unwrap_or(self.fx.reverb_wet),
            delay_wet: patch.delay_wet.unwrap_or(self.fx.delay_wet),
        };
        self.set_fx(fx);
    }
}
