use super::frame::StereoFrame;

// Send effects for the music bus. Each one runs fully wet over a block; the
// engine mixes the result back in at the current wet level.
pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

// Circular buffer of frames, allocated once up front
struct DelayLine {
    buf: Vec<StereoFrame>,
    pos: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![StereoFrame::ZERO; len.max(1)],
            pos: 0,
        }
    }

    fn read(&self) -> StereoFrame {
        self.buf[self.pos]
    }

    fn write_and_advance(&mut self, frame: StereoFrame) {
        self.buf[self.pos] = frame;
        self.pos = (self.pos + 1) % self.buf.len();
    }
}

/// Dotted-eighth-ish echo with ping-pong feedback.
pub struct FeedbackDelay {
    line: DelayLine,
    feedback: f32,
}

impl FeedbackDelay {
    pub const DEFAULT_SECONDS: f32 = 0.28;

    pub fn new(sample_rate: f32, seconds: f32, feedback: f32) -> Self {
        Self {
            line: DelayLine::new((sample_rate * seconds) as usize),
            feedback: feedback.clamp(0.0, 0.95),
        }
    }
}

impl Effect for FeedbackDelay {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            let echo = self.line.read();
            // swap channels on the way back in
            let fed = StereoFrame {
                left: f.left + echo.right * self.feedback,
                right: f.right + echo.left * self.feedback,
            };
            self.line.write_and_advance(fed);
            *f = echo;
        }
    }
}

struct Comb {
    line: DelayLine,
    feedback: f32,
    damp: f32,
    low: StereoFrame,
}

impl Comb {
    fn tick(&mut self, input: StereoFrame) -> StereoFrame {
        let out = self.line.read();
        self.low = out * (1.0 - self.damp) + self.low * self.damp;
        self.line.write_and_advance(input + self.low * self.feedback);
        out
    }
}

struct Allpass {
    line: DelayLine,
}

impl Allpass {
    const GAIN: f32 = 0.5;

    fn tick(&mut self, input: StereoFrame) -> StereoFrame {
        let delayed = self.line.read();
        let out = delayed + input * -Self::GAIN;
        self.line.write_and_advance(input + delayed * Self::GAIN);
        out
    }
}

/// Schroeder-style room: parallel damped combs into series allpasses.
pub struct CombReverb {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

// tunings in ms, picked mutually prime-ish
const COMB_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_MS: [f32; 2] = [5.0, 1.7];

impl CombReverb {
    pub fn new(sample_rate: f32) -> Self {
        let frames = |ms: f32| (sample_rate * ms / 1000.0) as usize;
        Self {
            combs: COMB_MS
                .iter()
                .map(|ms| Comb {
                    line: DelayLine::new(frames(*ms)),
                    feedback: 0.84,
                    damp: 0.2,
                    low: StereoFrame::ZERO,
                })
                .collect(),
            allpasses: ALLPASS_MS
                .iter()
                .map(|ms| Allpass {
                    line: DelayLine::new(frames(*ms)),
                })
                .collect(),
        }
    }
}

impl Effect for CombReverb {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        let scale = 1.0 / self.combs.len() as f32;
        for f in buf.iter_mut() {
            let input = *f;
            let mut wet = StereoFrame::ZERO;
            for comb in &mut self.combs {
                wet += comb.tick(input);
            }
            wet = wet * scale;
            for ap in &mut self.allpasses {
                wet = ap.tick(wet);
            }
            *f = wet;
        }
    }
}
