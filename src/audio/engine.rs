use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{TryRecvError, TrySendError};

use crate::audio_api::{AudioCommand, AudioTap, SAMPLE_SLOTS};
use crate::sequencer::dispatch::{Pitch, TriggerEvent, Voice as VoiceChoice};
use crate::sequencer::duck::GainAutomation;
use crate::sequencer::lane::{Lane, LaneMap};
use crate::sequencer::pattern::{MAX_VOLUME_DB, MIN_VOLUME_DB};
use crate::sequencer::preset::FxLevels;

use super::effect::{CombReverb, Effect, FeedbackDelay};
use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::{db_to_gain, patch, Bus, Tone, Voice};

const MAX_VOICES: usize = 48; // hard cap so we never malloc in the audio callback
const MAX_PENDING: usize = 1024;
const DELAY_FEEDBACK: f32 = 0.35;
const MASTER_RAMP_SECONDS: f32 = 0.05;

// linear fade toward the last requested output level
struct MasterGain {
    current: f32,
    target: f32,
    step: f32,
}

impl MasterGain {
    fn unity() -> Self {
        Self {
            current: 1.0,
            target: 1.0,
            step: 0.0,
        }
    }

    fn ramp_to(&mut self, db: f32, frames: f32) {
        self.target = db_to_gain(db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB));
        self.step = (self.target - self.current).abs() / frames.max(1.0);
    }

    fn next(&mut self) -> f32 {
        let gain = self.current;
        if self.current < self.target {
            self.current = (self.current + self.step).min(self.target);
        } else {
            self.current = (self.current - self.step).max(self.target);
        }
        gain
    }
}

struct Pending {
    frame: u64,
    event: TriggerEvent,
}

/// Lives on the audio thread. Everything it owns is sized up front; commands
/// come in through `handle_cmd` between blocks.
pub struct Engine {
    sample_rate: f32,
    frame: u64,
    rendered: Option<Arc<AtomicU64>>,
    pending: VecDeque<Pending>,
    voices: Vec<Voice>,
    samples: LaneMap<[Option<Arc<SampleBuffer>>; SAMPLE_SLOTS]>,
    bus_gain: GainAutomation,
    fx: FxLevels,
    master: MasterGain,
    delay: FeedbackDelay,
    reverb: CombReverb,
    mix: Vec<StereoFrame>,
    echo: Vec<StereoFrame>,
    room: Vec<StereoFrame>,
    tap: Option<AudioTap>,
    seed: u32,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        Self {
            sample_rate: sr,
            frame: 0,
            rendered: None,
            pending: VecDeque::with_capacity(MAX_PENDING),
            voices: Vec::with_capacity(MAX_VOICES),
            samples: LaneMap::from_fn(|_| std::array::from_fn(|_| None)),
            bus_gain: GainAutomation::default(),
            fx: FxLevels::default(),
            // unity until the sequencer sends its level
            master: MasterGain::unity(),
            delay: FeedbackDelay::new(sr, FeedbackDelay::DEFAULT_SECONDS, DELAY_FEEDBACK),
            reverb: CombReverb::new(sr),
            mix: Vec::new(),
            echo: Vec::new(),
            room: Vec::new(),
            tap: None,
            seed: 0x9e37_79b9,
        }
    }

    // publish the frame counter the scheduler reads as "now"
    pub fn set_frame_counter(&mut self, rendered: Arc<AtomicU64>) {
        self.rendered = Some(rendered);
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample {
                lane,
                variant,
                buffer,
            } => {
                if let Some(slot) = self.samples[lane].get_mut(variant) {
                    *slot = Some(buffer);
                }
            }
            AudioCommand::Trigger(event) => self.schedule(event),
            AudioCommand::Duck { at_time } => self.bus_gain.duck(at_time),
            AudioCommand::SetFx(levels) => self.fx = levels.clamped(),
            AudioCommand::SetMaster(db) => self.master.ramp_to(db, MASTER_RAMP_SECONDS * self.sample_rate),
            AudioCommand::Tap(tap) => self.tap = tap,
        }
    }

    fn schedule(&mut self, event: TriggerEvent) {
        if self.pending.len() >= MAX_PENDING {
            return; // scheduler is way ahead of us; drop rather than grow
        }
        let frame = (event.at_time.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        let at = self.pending.partition_point(|p| p.frame <= frame);
        self.pending.insert(at, Pending { frame, event });
    }

    fn start_due(&mut self, frame: u64) {
        while self.pending.front().is_some_and(|p| p.frame <= frame) {
            if let Some(p) = self.pending.pop_front() {
                self.start_voice(&p.event);
            }
        }
    }

    fn start_voice(&mut self, event: &TriggerEvent) {
        let gain = event.velocity * db_to_gain(event.volume_db);
        let p = patch(event.lane);

        if let VoiceChoice::Sample(variant) = event.voice {
            let buffer = self.samples[event.lane].get(variant).cloned().flatten();
            if let Some(buffer) = buffer {
                self.push_voice(Voice::sample(buffer, gain, p.bus));
                return;
            }
            // sample vanished; drums fall through to the synth below
        }

        let gate = event.duration as f32;
        match event.pitch {
            Pitch::Note(note) => {
                let seed = self.next_seed();
                self.push_voice(Voice::synth(&p, note.frequency(), gate, gain, self.sample_rate, seed));
            }
            Pitch::Chord(notes) => {
                for note in notes {
                    let seed = self.next_seed();
                    let voice = Voice::synth(&p, note.frequency(), gate, gain / 3.0, self.sample_rate, seed);
                    self.push_voice(voice);
                }
            }
            Pitch::Unpitched if matches!(p.tone, Tone::Noise { .. }) => {
                let seed = self.next_seed();
                self.push_voice(Voice::synth(&p, 0.0, gate, gain, self.sample_rate, seed));
            }
            // an ad-lib without its sample has nothing to play
            Pitch::Unpitched => {}
        }
    }

    fn push_voice(&mut self, voice: Voice) {
        if self.voices.len() >= MAX_VOICES {
            self.voices.remove(0); // steal the oldest
        }
        self.voices.push(voice);
    }

    fn next_seed(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.seed
    }

    fn ensure_scratch(&mut self, n: usize) {
        // only grows when the device hands us a bigger block than before
        if self.mix.len() < n {
            self.mix.resize(n, StereoFrame::ZERO);
            self.echo.resize(n, StereoFrame::ZERO);
            self.room.resize(n, StereoFrame::ZERO);
        }
    }

    /// Renders one block of stereo frames.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        let n = out.len();
        self.ensure_scratch(n);
        let sr = f64::from(self.sample_rate);

        for i in 0..n {
            let frame = self.frame + i as u64;
            self.start_due(frame);

            let mut drums = StereoFrame::ZERO;
            let mut music = StereoFrame::ZERO;
            for voice in &mut self.voices {
                let s = voice.next();
                match voice.bus() {
                    Bus::Drums => drums += s,
                    Bus::Music => music += s,
                }
            }
            music = music * self.bus_gain.value_at(frame as f64 / sr);
            self.mix[i] = drums + music;
            self.echo[i] = music;
            self.room[i] = music;
        }
        self.voices.retain(Voice::is_alive);

        self.delay.process(&mut self.echo[..n]);
        self.reverb.process(&mut self.room[..n]);
        for (i, f) in out.iter_mut().enumerate() {
            let wet = self.echo[i] * self.fx.delay_wet + self.room[i] * self.fx.reverb_wet;
            *f = ((self.mix[i] + wet) * self.master.next()).soft_clip();
        }

        self.frame += n as u64;
        if let Some(rendered) = &self.rendered {
            rendered.store(self.frame, Ordering::Release);
        }
        self.bus_gain.prune_before(self.frame as f64 / sr);

        if let Some(tap) = &self.tap {
            // no free buffer means the writer is behind and this block is lost
            match tap.free.try_recv() {
                Ok(mut buffer) => {
                    buffer.clear();
                    buffer.extend_from_slice(out);
                    if let Err(TrySendError::Disconnected(_)) = tap.blocks.try_send(buffer) {
                        self.tap = None;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.tap = None,
            }
        }
    }

    /// Fills an interleaved device buffer with any channel count.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize, block: &mut Vec<StereoFrame>) {
        let channels = channels.max(1);
        let n = data.len() / channels;
        block.resize(n, StereoFrame::ZERO);
        self.render_block(&mut block[..n]);
        for (chunk, f) in data.chunks_exact_mut(channels).zip(block.iter()) {
            match chunk {
                [mono] => *mono = 0.5 * (f.left + f.right),
                [l, r, rest @ ..] => {
                    *l = f.left;
                    *r = f.right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    #[cfg(test)]
    fn active_voices(&self) -> usize {
        self.voices.len()
    }
}
