use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::audio_api::AudioTap;

use super::frame::StereoFrame;

const TAP_QUEUE_BLOCKS: usize = 64;
// bigger device blocks grow a buffer once, on the audio thread
const TAP_BLOCK_FRAMES: usize = 4096;

/// Writes the live output to a 32-bit float stereo WAV on its own thread.
pub struct Recorder {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    writer: Option<JoinHandle<anyhow::Result<u64>>>,
}

impl Recorder {
    /// Returns the recorder and the tap the engine should copy into.
    pub fn start(dir: &Path, sample_rate: u32) -> anyhow::Result<(Self, AudioTap)> {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("neonbeat-{stamp}.wav"));

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let wav = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let (blocks_tx, blocks_rx) = crossbeam_channel::bounded(TAP_QUEUE_BLOCKS);
        let (free_tx, free_rx) = crossbeam_channel::bounded(TAP_QUEUE_BLOCKS);
        for _ in 0..TAP_QUEUE_BLOCKS {
            let _ = free_tx.try_send(Vec::with_capacity(TAP_BLOCK_FRAMES));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let writer = std::thread::Builder::new()
            .name("neonbeat-recorder".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || write_blocks(wav, blocks_rx, free_tx, &stop)
            })
            .context("failed to spawn recorder thread")?;

        log::info!("recording to {}", path.display());
        Ok((
            Self {
                path,
                stop,
                writer: Some(writer),
            },
            AudioTap {
                blocks: blocks_tx,
                free: free_rx,
            },
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and closes the file; returns its path and length in frames.
    pub fn finish(mut self) -> anyhow::Result<(PathBuf, u64)> {
        self.stop.store(true, Ordering::Release);
        let frames = match self.writer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow::anyhow!("recorder thread panicked"))??,
            None => 0,
        };
        log::info!("recorded {frames} frames to {}", self.path.display());
        Ok((self.path.clone(), frames))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

fn write_blocks(
    mut wav: hound::WavWriter<std::io::BufWriter<std::fs::File>>,
    rx: Receiver<Vec<StereoFrame>>,
    free: Sender<Vec<StereoFrame>>,
    stop: &AtomicBool,
) -> anyhow::Result<u64> {
    let mut frames = 0u64;
    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(block) => {
                for f in &block {
                    wav.write_sample(f.left)?;
                    wav.write_sample(f.right)?;
                }
                frames += block.len() as u64;
                // the pool is full only if someone sent a buffer of their own
                let _ = free.try_send(block);
            }
            Err(RecvTimeoutError::Timeout) if stop.load(Ordering::Acquire) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    wav.finalize()?;
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::{Recorder, StereoFrame, TAP_QUEUE_BLOCKS};

    #[test]
    fn recorded_blocks_land_in_a_wav_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (recorder, tap) = Recorder::start(dir.path(), 8000).expect("start");
        for (len, level) in [(100, 0.25), (50, -0.25)] {
            let mut block = tap.free.try_recv().expect("pooled buffer");
            block.extend(std::iter::repeat(StereoFrame::mono(level)).take(len));
            tap.blocks.send(block).expect("send");
        }
        let (path, frames) = recorder.finish().expect("finish");
        assert_eq!(frames, 150);
        // written buffers went back to the pool
        assert_eq!(tap.free.len(), TAP_QUEUE_BLOCKS);

        let reader = hound::WavReader::open(&path).expect("open");
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.duration(), 150);
    }

    #[test]
    fn file_name_carries_a_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (recorder, _tap) = Recorder::start(dir.path(), 8000).expect("start");
        let name = recorder
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_owned();
        assert!(name.starts_with("neonbeat-") && name.ends_with(".wav"), "{name}");
        drop(recorder);
    }
}
