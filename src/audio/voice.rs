use std::f32::consts::TAU;
use std::sync::Arc;

use crate::sequencer::lane::Lane;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

/// Which mix bus a voice feeds. Only the music bus is ducked and sent to fx.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bus {
    Drums,
    Music,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    // phase in [0, 1)
    fn at(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tone {
    Osc(Waveform),
    Noise { highpass: bool },
}

/// Fixed synth settings per lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Patch {
    pub tone: Tone,
    pub attack: f32,
    // exponential decay time; None holds until the gate closes
    pub decay: Option<f32>,
    pub release: f32,
    pub level: f32,
    // start at (1 + sweep) × the note's frequency and fall back
    pub sweep: f32,
    pub bus: Bus,
}

pub fn patch(lane: Lane) -> Patch {
    let base = Patch {
        tone: Tone::Osc(Waveform::Sine),
        attack: 0.002,
        decay: None,
        release: 0.05,
        level: 0.5,
        sweep: 0.0,
        bus: Bus::Music,
    };
    match lane {
        Lane::Kick => Patch { decay: Some(0.18), level: 0.9, sweep: 3.0, bus: Bus::Drums, ..base },
        Lane::Snare => Patch {
            tone: Tone::Noise { highpass: false },
            decay: Some(0.09),
            level: 0.5,
            bus: Bus::Drums,
            ..base
        },
        Lane::Hihat => Patch {
            tone: Tone::Noise { highpass: true },
            attack: 0.001,
            decay: Some(0.03),
            level: 0.6,
            bus: Bus::Drums,
            ..base
        },
        Lane::Bass => Patch { tone: Tone::Osc(Waveform::Saw), level: 0.35, ..base },
        Lane::Sub => Patch { level: 0.5, ..base },
        Lane::Lead => Patch { tone: Tone::Osc(Waveform::Square), release: 0.12, level: 0.18, ..base },
        Lane::Arp => Patch { tone: Tone::Osc(Waveform::Triangle), decay: Some(0.12), level: 0.3, ..base },
        Lane::Pad => Patch { tone: Tone::Osc(Waveform::Saw), attack: 0.25, release: 0.8, level: 0.12, ..base },
        Lane::Stab => Patch { tone: Tone::Osc(Waveform::Square), decay: Some(0.1), level: 0.15, ..base },
        Lane::Vox => Patch { tone: Tone::Osc(Waveform::Triangle), attack: 0.08, release: 0.4, level: 0.2, ..base },
        Lane::Adlib => Patch { level: 0.8, ..base },
    }
}

pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

enum Source {
    Osc {
        waveform: Waveform,
        phase: f32,
        inc: f32,
        sweep: f32,
        sweep_fall: f32,
    },
    Noise {
        seed: u32,
        highpass: bool,
        prev_in: f32,
        prev_out: f32,
    },
    Sample {
        buffer: Arc<SampleBuffer>,
        pos: f32,
    },
}

impl Source {
    fn next(&mut self) -> Option<StereoFrame> {
        match self {
            Source::Osc {
                waveform,
                phase,
                inc,
                sweep,
                sweep_fall,
            } => {
                let out = waveform.at(*phase);
                *phase = (*phase + *inc * (1.0 + *sweep)).fract();
                *sweep *= *sweep_fall;
                Some(StereoFrame::mono(out))
            }
            Source::Noise {
                seed,
                highpass,
                prev_in,
                prev_out,
            } => {
                // xorshift32
                *seed ^= *seed << 13;
                *seed ^= *seed >> 17;
                *seed ^= *seed << 5;
                let white = (*seed as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let out = if *highpass {
                    let y = 0.82 * (*prev_out + white - *prev_in);
                    *prev_in = white;
                    *prev_out = y;
                    y
                } else {
                    white
                };
                Some(StereoFrame::mono(out))
            }
            Source::Sample { buffer, pos } => {
                if *pos >= buffer.len() as f32 {
                    return None;
                }
                let out = buffer.frame_at(*pos);
                *pos += 1.0;
                Some(out)
            }
        }
    }
}

// all times in frames
struct Envelope {
    attack: f32,
    decay: Option<f32>,
    gate: f32,
    release: f32,
    age: f32,
}

impl Envelope {
    fn level(&self) -> Option<f32> {
        let t = self.age;
        let rise = if self.attack > 0.0 { (t / self.attack).min(1.0) } else { 1.0 };
        let body = match self.decay {
            Some(d) => {
                let v = (-(t - self.attack).max(0.0) / d).exp();
                if v < 1e-4 {
                    return None;
                }
                v
            }
            None => 1.0,
        };
        let tail = if t <= self.gate {
            1.0
        } else if t < self.gate + self.release {
            1.0 - (t - self.gate) / self.release
        } else {
            return None;
        };
        Some(rise * body * tail)
    }
}

pub struct Voice {
    source: Source,
    env: Envelope,
    gain: f32,
    bus: Bus,
    alive: bool,
}

impl Voice {
    /// `freq` is ignored by noise patches.
    pub fn synth(patch: &Patch, freq: f32, gate_seconds: f32, gain: f32, sample_rate: f32, seed: u32) -> Self {
        let source = match patch.tone {
            Tone::Osc(waveform) => Source::Osc {
                waveform,
                phase: 0.0,
                inc: freq / sample_rate,
                sweep: patch.sweep,
                // sweep falls to ~1% in 60 ms
                sweep_fall: (0.01_f32.ln() / (0.06 * sample_rate)).exp(),
            },
            Tone::Noise { highpass } => Source::Noise {
                seed: seed.max(1),
                highpass,
                prev_in: 0.0,
                prev_out: 0.0,
            },
        };
        Self {
            source,
            env: Envelope {
                attack: patch.attack * sample_rate,
                decay: patch.decay.map(|d| d * sample_rate),
                gate: gate_seconds.max(0.0) * sample_rate,
                release: (patch.release * sample_rate).max(1.0),
                age: 0.0,
            },
            gain: gain * patch.level,
            bus: patch.bus,
            alive: true,
        }
    }

    pub fn sample(buffer: Arc<SampleBuffer>, gain: f32, bus: Bus) -> Self {
        let len = buffer.len() as f32;
        Self {
            source: Source::Sample { buffer, pos: 0.0 },
            env: Envelope {
                attack: 0.0,
                decay: None,
                gate: len,
                release: 1.0,
                age: 0.0,
            },
            gain,
            bus,
            alive: true,
        }
    }

    pub fn bus(&self) -> Bus {
        self.bus
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn next(&mut self) -> StereoFrame {
        if !self.alive {
            return StereoFrame::ZERO;
        }
        let (Some(level), Some(frame)) = (self.env.level(), self.source.next()) else {
            self.alive = false;
            return StereoFrame::ZERO;
        };
        self.env.age += 1.0;
        frame * (level * self.gain)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{db_to_gain, patch, Bus, Voice};
    use crate::audio::frame::StereoFrame;
    use crate::audio::sample_buffer::SampleBuffer;
    use crate::sequencer::lane::Lane;

    const SR: f32 = 8000.0;

    fn run(voice: &mut Voice, frames: usize) -> Vec<StereoFrame> {
        (0..frames).map(|_| voice.next()).collect()
    }

    #[test]
    fn gated_voice_stops_after_gate_plus_release() {
        let p = patch(Lane::Bass);
        let mut voice = Voice::synth(&p, 110.0, 0.1, 1.0, SR, 1);
        run(&mut voice, 800);
        assert!(voice.is_alive());
        run(&mut voice, (p.release * SR) as usize + 10);
        assert!(!voice.is_alive());
    }

    #[test]
    fn percussive_voice_dies_on_its_own() {
        let p = patch(Lane::Hihat);
        let mut voice = Voice::synth(&p, 0.0, 10.0, 1.0, SR, 99);
        let out = run(&mut voice, 8000);
        assert!(!voice.is_alive());
        assert!(out.iter().any(|f| f.left != 0.0));
        assert_eq!(voice.bus(), Bus::Drums);
    }

    #[test]
    fn sample_voice_plays_its_buffer_once() {
        let buffer = Arc::new(SampleBuffer {
            data: vec![StereoFrame::mono(0.5); 4],
        });
        let mut voice = Voice::sample(buffer, 2.0, Bus::Music);
        let out = run(&mut voice, 6);
        assert_eq!(out[0], StereoFrame::mono(1.0));
        assert_eq!(out[3], StereoFrame::mono(1.0));
        assert_eq!(out[4], StereoFrame::ZERO);
        assert!(!voice.is_alive());
    }

    #[test]
    fn decibels_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.501).abs() < 1e-3);
    }
}
