// Per-pulse bridge from the pattern store to the sound engine.

use crossbeam_channel::Sender;
use rand::Rng;

use super::clock::Pulse;
use super::lane::{Lane, LaneMap};
use super::pattern::PatternStore;
use super::preset::FxLevels;
use super::scale::{chord, degree_to_pitch, MinorKey, Note, BASS_SCALE, LEAD_SCALE};

pub const ADLIB_POOL_SIZE: usize = 4;
pub const RATCHET_HITS: usize = 2;
const RATCHET_VELOCITY: f32 = 1.0;
const KICK_NOTE: Note = Note(24); // C1

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteLength {
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl NoteLength {
    pub fn in_sixteenths(self) -> f64 {
        match self {
            NoteLength::Half => 8.0,
            NoteLength::Quarter => 4.0,
            NoteLength::Eighth => 2.0,
            NoteLength::Sixteenth => 1.0,
            NoteLength::ThirtySecond => 0.5,
            NoteLength::SixtyFourth => 0.25,
        }
    }

    pub fn seconds(self, sixteenth: f64) -> f64 {
        self.in_sixteenths() * sixteenth
    }

    pub fn tag(self) -> &'static str {
        match self {
            NoteLength::Half => "2n",
            NoteLength::Quarter => "4n",
            NoteLength::Eighth => "8n",
            NoteLength::Sixteenth => "16n",
            NoteLength::ThirtySecond => "32n",
            NoteLength::SixtyFourth => "64n",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTable {
    Bass,
    Lead,
}

impl ScaleTable {
    fn notes(self) -> &'static [Note] {
        match self {
            ScaleTable::Bass => &BASS_SCALE,
            ScaleTable::Lead => &LEAD_SCALE,
        }
    }
}

/// How a step index becomes a table index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DegreeRule {
    Step,
    StepTimes(usize),
    // one chord per beat
    Beat,
    Fixed(usize),
}

impl DegreeRule {
    fn index(self, step: usize) -> usize {
        match self {
            DegreeRule::Step => step,
            DegreeRule::StepTimes(n) => step * n,
            DegreeRule::Beat => step / 4,
            DegreeRule::Fixed(i) => i,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Percussive { note: Option<Note> },
    Pitched { table: ScaleTable, degree: DegreeRule, shift: i8 },
    Chord { degree: DegreeRule, shift: i8 },
    SamplePool { size: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneDef {
    pub kind: TriggerKind,
    pub length: NoteLength,
    pub velocity: f32,
}

pub fn lane_def(lane: Lane) -> LaneDef {
    use TriggerKind::*;
    let (kind, length, velocity) = match lane {
        Lane::Kick => (Percussive { note: Some(KICK_NOTE) }, NoteLength::Eighth, 1.0),
        Lane::Snare => (Percussive { note: None }, NoteLength::Eighth, 1.0),
        Lane::Hihat => (Percussive { note: None }, NoteLength::ThirtySecond, 0.2),
        Lane::Bass => (
            Pitched { table: ScaleTable::Bass, degree: DegreeRule::Step, shift: 0 },
            NoteLength::Eighth,
            1.0,
        ),
        Lane::Sub => (
            Pitched { table: ScaleTable::Bass, degree: DegreeRule::Step, shift: -12 },
            NoteLength::Eighth,
            1.0,
        ),
        Lane::Lead => (
            Pitched { table: ScaleTable::Lead, degree: DegreeRule::Step, shift: 0 },
            NoteLength::Sixteenth,
            1.0,
        ),
        Lane::Arp => (
            Pitched { table: ScaleTable::Lead, degree: DegreeRule::StepTimes(3), shift: 0 },
            NoteLength::Sixteenth,
            1.0,
        ),
        Lane::Pad => (Chord { degree: DegreeRule::Beat, shift: 0 }, NoteLength::Half, 1.0),
        Lane::Stab => (Chord { degree: DegreeRule::Fixed(0), shift: 12 }, NoteLength::Eighth, 1.0),
        Lane::Vox => (Chord { degree: DegreeRule::Beat, shift: 12 }, NoteLength::Quarter, 0.6),
        Lane::Adlib => (SamplePool { size: ADLIB_POOL_SIZE }, NoteLength::Quarter, 1.0),
    };
    LaneDef { kind, length, velocity }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pitch {
    Unpitched,
    Note(Note),
    Chord([Note; 3]),
}

pub fn resolve_pitch(kind: TriggerKind, key: MinorKey, step: usize) -> Pitch {
    match kind {
        TriggerKind::Percussive { note } => note.map_or(Pitch::Unpitched, Pitch::Note),
        TriggerKind::Pitched { table, degree, shift } => {
            Pitch::Note(degree_to_pitch(table.notes(), key, degree.index(step)).transpose(shift))
        }
        TriggerKind::Chord { degree, shift } => {
            Pitch::Chord(chord(key, degree.index(step)).map(|n| n.transpose(shift)))
        }
        TriggerKind::SamplePool { .. } => Pitch::Unpitched,
    }
}

/// Which voice of a lane plays an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Voice {
    Synth,
    Sample(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrumKit {
    #[default]
    Synth,
    Grime,
}

impl DrumKit {
    pub fn toggled(self) -> Self {
        match self {
            DrumKit::Synth => DrumKit::Grime,
            DrumKit::Grime => DrumKit::Synth,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DrumKit::Synth => "Synth",
            DrumKit::Grime => "Grime",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerEvent {
    pub lane: Lane,
    pub pitch: Pitch,
    pub length: NoteLength,
    pub duration: f64,
    pub velocity: f32,
    pub volume_db: f32,
    pub voice: Voice,
    /// Scheduler time of the hit, not "now".
    pub at_time: f64,
}

/// What the dispatcher needs from whoever makes the sound.
pub trait SoundEngine {
    fn trigger(&mut self, event: &TriggerEvent) -> anyhow::Result<()>;

    /// Dip the shared music bus starting at `at_time`.
    fn duck(&mut self, at_time: f64) -> anyhow::Result<()>;

    fn voice_available(&self, _lane: Lane, voice: Voice) -> bool {
        voice == Voice::Synth
    }

    fn set_fx(&mut self, _levels: FxLevels) {}

    /// Output level in dB; the engine ramps to it.
    fn set_master(&mut self, _db: f32) {}
}

/// Playhead update for the UI, consumed at draw time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepMarker {
    pub step: usize,
    pub at_time: f64,
}

/// Live values the dispatcher reads on every pulse.
pub struct DispatchContext<'a> {
    pub store: &'a PatternStore,
    pub key: MinorKey,
    pub kit: DrumKit,
    pub ratchet_hats: bool,
}

pub struct Dispatcher {
    playhead: Option<Sender<StepMarker>>,
    failures: LaneMap<u32>,
}

impl Dispatcher {
    pub fn new(playhead: Option<Sender<StepMarker>>) -> Self {
        Self {
            playhead,
            failures: LaneMap::splat(0),
        }
    }

    /// Fires every audible lane for `pulse`; returns the number of events the
    /// engine accepted. Never fails: a broken voice is logged and skipped.
    pub fn dispatch(
        &mut self,
        pulse: &Pulse,
        ctx: &DispatchContext<'_>,
        engine: &mut dyn SoundEngine,
    ) -> usize {
        if let Some(tx) = &self.playhead {
            let _ = tx.try_send(StepMarker {
                step: pulse.step,
                at_time: pulse.time,
            });
        }

        let mut fired = 0;
        for lane in Lane::ALL {
            if ctx.store.is_audible(lane, pulse.step) {
                fired += self.fire_lane(lane, pulse, ctx, engine);
            }
        }
        fired
    }

    fn fire_lane(
        &mut self,
        lane: Lane,
        pulse: &Pulse,
        ctx: &DispatchContext<'_>,
        engine: &mut dyn SoundEngine,
    ) -> usize {
        let def = lane_def(lane);
        let Some(voice) = pick_voice(lane, def.kind, ctx.kit, engine) else {
            log::trace!("{lane}: no voice loaded, skipping step {}", pulse.step);
            return 0;
        };

        let event = TriggerEvent {
            lane,
            pitch: resolve_pitch(def.kind, ctx.key, pulse.step),
            length: def.length,
            duration: def.length.seconds(pulse.sixteenth),
            velocity: def.velocity,
            volume_db: ctx.store.volumes()[lane],
            voice,
            at_time: pulse.time,
        };
        let mut fired = self.send(engine, &event);

        if lane == Lane::Kick {
            if let Err(err) = engine.duck(pulse.time) {
                self.report(lane, &err);
            }
        }

        if lane == Lane::Hihat && ctx.ratchet_hats {
            let gap = pulse.sixteenth / (RATCHET_HITS + 1) as f64;
            for hit in 1..=RATCHET_HITS {
                let ratchet = TriggerEvent {
                    length: NoteLength::SixtyFourth,
                    duration: NoteLength::SixtyFourth.seconds(pulse.sixteenth),
                    velocity: RATCHET_VELOCITY,
                    at_time: pulse.time + gap * hit as f64,
                    ..event
                };
                fired += self.send(engine, &ratchet);
            }
        }
        fired
    }

    /// One synth hit of `lane` outside the grid, as if it sat on step 0.
    /// Ignores the lane's mute and never ducks.
    pub fn audition(
        &mut self,
        lane: Lane,
        at_time: f64,
        sixteenth: f64,
        ctx: &DispatchContext<'_>,
        engine: &mut dyn SoundEngine,
    ) -> usize {
        let def = lane_def(lane);
        let event = TriggerEvent {
            lane,
            pitch: resolve_pitch(def.kind, ctx.key, 0),
            length: def.length,
            duration: def.length.seconds(sixteenth),
            velocity: def.velocity,
            volume_db: ctx.store.volumes()[lane],
            voice: Voice::Synth,
            at_time,
        };
        self.send(engine, &event)
    }

    fn send(&mut self, engine: &mut dyn SoundEngine, event: &TriggerEvent) -> usize {
        match engine.trigger(event) {
            Ok(()) => 1,
            Err(err) => {
                self.report(event.lane, &err);
                0
            }
        }
    }

    fn report(&mut self, lane: Lane, err: &anyhow::Error) {
        let count = &mut self.failures[lane];
        *count += 1;
        if *count == 1 {
            log::warn!("{lane}: trigger failed: {err:#}");
        } else {
            log::debug!("{lane}: trigger failed ({} so far): {err:#}", *count);
        }
    }
}

fn pick_voice(lane: Lane, kind: TriggerKind, kit: DrumKit, engine: &dyn SoundEngine) -> Option<Voice> {
    match kind {
        TriggerKind::SamplePool { size } => {
            let voice = Voice::Sample(rand::thread_rng().gen_range(0..size));
            engine.voice_available(lane, voice).then_some(voice)
        }
        _ if lane.is_drum() && kit == DrumKit::Grime => {
            let sample = Voice::Sample(0);
            if engine.voice_available(lane, sample) {
                Some(sample)
            } else {
                Some(Voice::Synth)
            }
        }
        _ => Some(Voice::Synth),
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::{
        lane_def, resolve_pitch, DispatchContext, Dispatcher, DrumKit, NoteLength, Pitch,
        SoundEngine, TriggerEvent, Voice,
    };
    use crate::sequencer::clock::Pulse;
    use crate::sequencer::lane::Lane;
    use crate::sequencer::pattern::PatternStore;
    use crate::sequencer::scale::{MinorKey, Note, BASS_SCALE, LEAD_SCALE, PAD_CHORDS};

    #[derive(Default)]
    struct Recording {
        events: Vec<TriggerEvent>,
        ducks: Vec<f64>,
        samples: Vec<(Lane, usize)>,
        broken: Vec<Lane>,
    }

    impl SoundEngine for Recording {
        fn trigger(&mut self, event: &TriggerEvent) -> anyhow::Result<()> {
            if self.broken.contains(&event.lane) {
                anyhow::bail!("voice for {} is gone", event.lane);
            }
            self.events.push(*event);
            Ok(())
        }

        fn duck(&mut self, at_time: f64) -> anyhow::Result<()> {
            self.ducks.push(at_time);
            Ok(())
        }

        fn voice_available(&self, lane: Lane, voice: Voice) -> bool {
            match voice {
                Voice::Synth => true,
                Voice::Sample(v) => self.samples.contains(&(lane, v)),
            }
        }
    }

    fn pulse(step: usize, time: f64) -> Pulse {
        Pulse {
            index: step as u64,
            step,
            time,
            sixteenth: 0.15,
        }
    }

    fn ctx(store: &PatternStore) -> DispatchContext<'_> {
        DispatchContext {
            store,
            key: MinorKey::C,
            kit: DrumKit::Synth,
            ratchet_hats: false,
        }
    }

    #[test]
    fn only_active_set_lanes_fire_at_the_pulse_time() {
        let mut store = PatternStore::default();
        store.set_step(Lane::Kick, 2, true);
        store.set_step(Lane::Snare, 2, true);
        store.set_step(Lane::Stab, 2, true); // inactive by default
        let mut engine = Recording::default();
        let mut dispatcher = Dispatcher::new(None);

        let fired = dispatcher.dispatch(&pulse(2, 4.2), &ctx(&store), &mut engine);
        assert_eq!(fired, 2);
        let lanes: Vec<Lane> = engine.events.iter().map(|e| e.lane).collect();
        assert_eq!(lanes, vec![Lane::Kick, Lane::Snare]);
        assert!(engine.events.iter().all(|e| e.at_time == 4.2));
        assert_eq!(engine.ducks, vec![4.2]);
    }

    #[test]
    fn pitched_lanes_follow_scale_rules() {
        let key = MinorKey::G;
        assert_eq!(
            resolve_pitch(lane_def(Lane::Bass).kind, key, 0),
            Pitch::Note(BASS_SCALE[0].transpose(7))
        );
        assert_eq!(
            resolve_pitch(lane_def(Lane::Sub).kind, key, 9),
            Pitch::Note(BASS_SCALE[1].transpose(7 - 12))
        );
        assert_eq!(
            resolve_pitch(lane_def(Lane::Arp).kind, key, 3),
            Pitch::Note(LEAD_SCALE[1].transpose(7))
        );
        assert_eq!(
            resolve_pitch(lane_def(Lane::Pad).kind, key, 13),
            Pitch::Chord(PAD_CHORDS[3].map(|n| n.transpose(7)))
        );
        assert_eq!(
            resolve_pitch(lane_def(Lane::Stab).kind, MinorKey::C, 11),
            Pitch::Chord(PAD_CHORDS[0].map(|n| n.transpose(12)))
        );
        assert_eq!(
            resolve_pitch(lane_def(Lane::Kick).kind, key, 5),
            Pitch::Note(Note(24))
        );
    }

    #[test]
    fn durations_scale_with_the_pulse() {
        let mut store = PatternStore::default();
        store.set_step(Lane::Pad, 0, true);
        let mut engine = Recording::default();
        Dispatcher::new(None).dispatch(&pulse(0, 0.0), &ctx(&store), &mut engine);
        let pad = engine.events[0];
        assert_eq!(pad.length, NoteLength::Half);
        assert!((pad.duration - 1.2).abs() < 1e-9);
        assert_eq!(pad.volume_db, store.volumes()[Lane::Pad]);
    }

    #[test]
    fn ratchet_adds_two_hits_inside_the_step() {
        let mut store = PatternStore::default();
        store.set_step(Lane::Hihat, 1, true);
        let mut engine = Recording::default();
        let context = DispatchContext {
            ratchet_hats: true,
            ..ctx(&store)
        };
        let fired = Dispatcher::new(None).dispatch(&pulse(1, 1.0), &context, &mut engine);
        assert_eq!(fired, 3);
        let times: Vec<f64> = engine.events.iter().map(|e| e.at_time).collect();
        assert!((times[1] - 1.05).abs() < 1e-9);
        assert!((times[2] - 1.10).abs() < 1e-9);
        assert_eq!(engine.events[1].length, NoteLength::SixtyFourth);
    }

    #[test]
    fn grime_kit_falls_back_to_synth_without_samples() {
        let mut store = PatternStore::default();
        store.set_step(Lane::Kick, 0, true);
        store.set_step(Lane::Snare, 0, true);
        let mut engine = Recording {
            samples: vec![(Lane::Snare, 0)],
            ..Recording::default()
        };
        let context = DispatchContext {
            kit: DrumKit::Grime,
            ..ctx(&store)
        };
        Dispatcher::new(None).dispatch(&pulse(0, 0.0), &context, &mut engine);
        assert_eq!(engine.events[0].voice, Voice::Synth);
        assert_eq!(engine.events[1].voice, Voice::Sample(0));
    }

    #[test]
    fn missing_adlib_pool_is_skipped_silently() {
        let mut store = PatternStore::default();
        store.set_active(Lane::Adlib, true);
        store.set_step(Lane::Adlib, 5, true);
        let mut engine = Recording::default();
        let fired = Dispatcher::new(None).dispatch(&pulse(5, 0.0), &ctx(&store), &mut engine);
        assert_eq!(fired, 0);

        engine.samples = (0..4).map(|v| (Lane::Adlib, v)).collect();
        let fired = Dispatcher::new(None).dispatch(&pulse(5, 0.0), &ctx(&store), &mut engine);
        assert_eq!(fired, 1);
        assert!(matches!(engine.events[0].voice, Voice::Sample(v) if v < 4));
    }

    #[test]
    fn a_failing_voice_does_not_stop_the_others() {
        let mut store = PatternStore::default();
        store.set_step(Lane::Snare, 0, true);
        store.set_step(Lane::Bass, 0, true);
        let mut engine = Recording {
            broken: vec![Lane::Snare],
            ..Recording::default()
        };
        let mut dispatcher = Dispatcher::new(None);
        for _ in 0..3 {
            dispatcher.dispatch(&pulse(0, 0.0), &ctx(&store), &mut engine);
        }
        assert_eq!(engine.events.len(), 3);
        assert!(engine.events.iter().all(|e| e.lane == Lane::Bass));
    }

    #[test]
    fn audition_plays_a_muted_kick_without_ducking() {
        let mut store = PatternStore::default();
        store.set_active(Lane::Kick, false);
        let mut engine = Recording::default();
        let fired = Dispatcher::new(None).audition(Lane::Kick, 3.0, 0.15, &ctx(&store), &mut engine);
        assert_eq!(fired, 1);
        let kick = engine.events[0];
        assert_eq!(kick.pitch, Pitch::Note(Note(24)));
        assert_eq!(kick.length.tag(), "8n");
        assert!((kick.duration - 0.3).abs() < 1e-9);
        assert_eq!(kick.at_time, 3.0);
        assert!(engine.ducks.is_empty());
    }

    #[test]
    fn playhead_markers_are_published_per_pulse() {
        let (tx, rx) = unbounded();
        let store = PatternStore::default();
        let mut engine = Recording::default();
        let mut dispatcher = Dispatcher::new(Some(tx));
        dispatcher.dispatch(&pulse(7, 2.5), &ctx(&store), &mut engine);
        let marker = rx.try_recv().expect("marker");
        assert_eq!((marker.step, marker.at_time), (7, 2.5));
    }
}
