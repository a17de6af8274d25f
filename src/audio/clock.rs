use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The time domain trigger events are scheduled in.
///
/// With a device attached this is the number of frames the output callback
/// has rendered, so "now" never drifts from what is actually audible. Without
/// one (`--no-audio`, tests) it falls back to wall time.
#[derive(Clone, Debug)]
pub enum AudioClock {
    Frames {
        rendered: Arc<AtomicU64>,
        sample_rate: u32,
    },
    Wall {
        origin: Instant,
    },
}

impl AudioClock {
    pub fn wall() -> Self {
        AudioClock::Wall {
            origin: Instant::now(),
        }
    }

    pub fn frames(sample_rate: u32) -> (Self, Arc<AtomicU64>) {
        let rendered = Arc::new(AtomicU64::new(0));
        let clock = AudioClock::Frames {
            rendered: Arc::clone(&rendered),
            sample_rate,
        };
        (clock, rendered)
    }

    /// Seconds since the clock started.
    pub fn now(&self) -> f64 {
        match self {
            AudioClock::Frames {
                rendered,
                sample_rate,
            } => rendered.load(Ordering::Acquire) as f64 / f64::from(*sample_rate),
            AudioClock::Wall { origin } => origin.elapsed().as_secs_f64(),
        }
    }
}
