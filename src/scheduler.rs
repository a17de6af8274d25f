// The timing thread. It never sleeps on the pattern itself: every `interval`
// it locks the sequencer once and renders everything due before
// `clock.now() + lookahead`, so the audio thread always holds the next
// ~100 ms of triggers with exact timestamps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;

use crate::audio::AudioClock;
use crate::sequencer::dispatch::SoundEngine;
use crate::sequencer::SharedSequencer;

/// Delay between pressing play and the first downbeat, so step 0 is already
/// queued when it comes due.
pub const START_LATENCY: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub lookahead: Duration,
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: Duration::from_millis(100),
            interval: Duration::from_millis(10),
        }
    }
}

pub struct Scheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn<E>(
        sequencer: SharedSequencer,
        clock: AudioClock,
        mut engine: E,
        config: SchedulerConfig,
    ) -> anyhow::Result<Self>
    where
        E: SoundEngine + Send + 'static,
    {
        anyhow::ensure!(
            config.interval < config.lookahead,
            "scheduler interval ({:?}) must be shorter than the lookahead ({:?})",
            config.interval,
            config.lookahead
        );
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let lookahead = config.lookahead.as_secs_f64();

        let handle = std::thread::Builder::new()
            .name("neonbeat-scheduler".into())
            .spawn(move || {
                log::debug!("scheduler running: {config:?}");
                while !thread_stop.load(Ordering::Acquire) {
                    let horizon = clock.now() + lookahead;
                    let fired = sequencer.lock().render(horizon, &mut engine);
                    if fired > 0 {
                        log::trace!("rendered {fired} triggers up to {horizon:.3}s");
                    }
                    std::thread::sleep(config.interval);
                }
                log::debug!("scheduler stopped");
            })
            .context("failed to spawn scheduler thread")?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.join();
    }
}
