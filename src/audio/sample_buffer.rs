use std::path::Path;

use anyhow::Context;

use super::frame::StereoFrame;

/// A decoded one-shot, already at the output sample rate.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
}

impl SampleBuffer {
    // Load a WAV file into memory; never call this from the audio thread
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let frames: Vec<StereoFrame> = samples
            .chunks_exact(channels)
            .map(|c| StereoFrame {
                left: c[0],
                right: c.get(1).copied().unwrap_or(c[0]), // mono gets duplicated
            })
            .collect();

        let data = resample_linear(&frames, spec.sample_rate, target_rate);
        log::debug!(
            "loaded {} ({} Hz, {} ch, {} frames)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            data.len()
        );
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // linear interpolation between neighbouring frames; past the end reads silence
    pub fn frame_at(&self, pos: f32) -> StereoFrame {
        if pos < 0.0 {
            return StereoFrame::ZERO;
        }
        let i = pos as usize;
        let Some(&a) = self.data.get(i) else {
            return StereoFrame::ZERO;
        };
        let b = self.data.get(i + 1).copied().unwrap_or(a);
        let frac = pos - i as f32;
        a * (1.0 - frac) + b * frac
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || frames.is_empty() || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let last = frames.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            if idx >= last {
                return frames[last];
            }
            let frac = (src_pos - idx as f64) as f32;
            frames[idx] * (1.0 - frac) + frames[idx + 1] * frac
        })
        .collect()
}
