// Everything that crosses from the control side to the audio thread.
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{SampleBuffer, StereoFrame};
use crate::sequencer::dispatch::{SoundEngine, TriggerEvent, Voice, ADLIB_POOL_SIZE};
use crate::sequencer::lane::{Lane, LaneMap};
use crate::sequencer::preset::FxLevels;

/// Sample variants per lane; drums only ever use slot 0.
pub const SAMPLE_SLOTS: usize = ADLIB_POOL_SIZE;

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't touch the disk, so buffers are decoded elsewhere and
    // handed over ready to play
    RegisterSample {
        lane: Lane,
        variant: usize,
        buffer: Arc<SampleBuffer>,
    },
    Trigger(TriggerEvent),
    Duck { at_time: f64 },
    SetFx(FxLevels),
    SetMaster(f32),
    // copy of every rendered block, for recording
    Tap(Option<AudioTap>),
}

/// Both ends the engine needs to hand rendered blocks to the recorder. The
/// buffers are allocated by the recorder and come back through `free` once
/// written, so the audio thread only ever copies.
#[derive(Clone, Debug)]
pub struct AudioTap {
    pub blocks: Sender<Vec<StereoFrame>>,
    pub free: Receiver<Vec<StereoFrame>>,
}

/// `SoundEngine` backed by the audio thread's command queue.
pub struct EngineLink {
    tx: Sender<AudioCommand>,
    loaded: LaneMap<[bool; SAMPLE_SLOTS]>,
}

impl EngineLink {
    pub fn new(tx: Sender<AudioCommand>) -> Self {
        Self {
            tx,
            loaded: LaneMap::splat([false; SAMPLE_SLOTS]),
        }
    }

    fn send(&self, cmd: AudioCommand) -> anyhow::Result<()> {
        self.tx
            .try_send(cmd)
            .map_err(|err| anyhow::anyhow!("audio command queue: {err}"))
    }

    pub fn register_sample(&mut self, lane: Lane, variant: usize, buffer: SampleBuffer) -> anyhow::Result<()> {
        anyhow::ensure!(variant < SAMPLE_SLOTS, "sample slot {variant} out of range");
        self.send(AudioCommand::RegisterSample {
            lane,
            variant,
            buffer: Arc::new(buffer),
        })?;
        self.loaded[lane][variant] = true;
        Ok(())
    }

    pub fn loaded_samples(&self) -> usize {
        self.loaded.iter().map(|(_, slots)| slots.iter().filter(|s| **s).count()).sum()
    }
}

impl SoundEngine for EngineLink {
    fn trigger(&mut self, event: &TriggerEvent) -> anyhow::Result<()> {
        self.send(AudioCommand::Trigger(*event))
    }

    fn duck(&mut self, at_time: f64) -> anyhow::Result<()> {
        self.send(AudioCommand::Duck { at_time })
    }

    fn voice_available(&self, lane: Lane, voice: Voice) -> bool {
        match voice {
            Voice::Synth => true,
            Voice::Sample(v) => self.loaded[lane].get(v).copied().unwrap_or(false),
        }
    }

    fn set_fx(&mut self, levels: FxLevels) {
        if let Err(err) = self.send(AudioCommand::SetFx(levels)) {
            log::warn!("fx update dropped: {err:#}");
        }
    }

    fn set_master(&mut self, db: f32) {
        if let Err(err) = self.send(AudioCommand::SetMaster(db)) {
            log::warn!("master level dropped: {err:#}");
        }
    }
}

/// Accepts everything and plays nothing (`--no-audio`).
#[derive(Default)]
pub struct NullEngine;

impl SoundEngine for NullEngine {
    fn trigger(&mut self, event: &TriggerEvent) -> anyhow::Result<()> {
        log::trace!("{} {} @ {:.3}s", event.lane, event.length.tag(), event.at_time);
        Ok(())
    }

    fn duck(&mut self, _at_time: f64) -> anyhow::Result<()> {
        Ok(())
    }
}
