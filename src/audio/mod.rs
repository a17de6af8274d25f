use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, EngineLink};

mod clock;
mod effect;
mod engine;
mod frame;
mod recorder;
mod sample_buffer;
mod voice;

pub use clock::AudioClock;
pub use frame::StereoFrame;
pub use recorder::Recorder;
pub use sample_buffer::SampleBuffer;

use engine::Engine;

// a few seconds of lookahead triggers at the busiest tempo
const COMMAND_QUEUE: usize = 4096;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    clock: AudioClock,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            log::warn!("audio command queue full; command dropped");
        }
    }

    /// A fresh `SoundEngine` for the scheduler thread.
    pub fn link(&self) -> EngineLink {
        EngineLink::new(self.tx.clone())
    }

    pub fn clock(&self) -> AudioClock {
        self.clock.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = usize::from(config.channels());
    log::info!("audio output: {sample_rate} Hz, {channels} channels, {:?}", config.sample_format());

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let (clock, rendered) = AudioClock::frames(sample_rate);
            let mut engine = Engine::new(sample_rate);
            engine.set_frame_counter(rendered);

            let output_stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            output_stream.play().context("failed to play output stream")?;

            Ok(AudioHandle {
                tx,
                clock,
                sample_rate,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 output is supported)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = |err| log::error!("audio output stream error: {err}");
    let mut block: Vec<StereoFrame> = Vec::with_capacity(8192);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                while let Ok(cmd) = rx.try_recv() {
                    engine.handle_cmd(cmd);
                }
                engine.render_interleaved(data, channels, &mut block);
            },
            err_fn,
            None,
        )
        .context("failed to build output stream")?;

    Ok(stream)
}
