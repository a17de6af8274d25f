use std::path::{Path, PathBuf};

use crate::audio::SampleBuffer;
use crate::audio_api::EngineLink;
use crate::sequencer::lane::Lane;

pub const SAMPLES_DIR: &str = "samples";

// <project>/samples/grime/<lane>.wav backs the Grime drum kit
const GRIME_KIT: [Lane; 3] = [Lane::Kick, Lane::Snare, Lane::Hihat];
// <project>/samples/adlibs/<name>.wav, pool index = position here
pub const ADLIB_NAMES: [&str; 4] = ["brap", "oi", "skeng", "pullup"];

/// One file the loader wants to hand to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleSlot {
    pub lane: Lane,
    pub variant: usize,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub missing: usize,
    pub failed: usize,
}

pub fn expected_slots(project_dir: &Path) -> Vec<SampleSlot> {
    let root = project_dir.join(SAMPLES_DIR);
    let kit = GRIME_KIT.iter().map(|&lane| SampleSlot {
        lane,
        variant: 0,
        path: root.join("grime").join(format!("{lane}.wav")),
    });
    let adlibs = ADLIB_NAMES.iter().enumerate().map(|(variant, name)| SampleSlot {
        lane: Lane::Adlib,
        variant,
        path: root.join("adlibs").join(format!("{name}.wav")),
    });
    kit.chain(adlibs).collect()
}

// Load whatever of the optional kit exists; anything absent or broken just
// leaves that voice on its synth fallback (or silent, for ad-libs)
pub fn load_optional_samples(project_dir: &Path, sample_rate: u32, link: &mut EngineLink) -> LoadReport {
    let mut report = LoadReport::default();
    for slot in expected_slots(project_dir) {
        if !slot.path.is_file() {
            log::debug!("no sample at {}", slot.path.display());
            report.missing += 1;
            continue;
        }
        let registered = SampleBuffer::load_wav(&slot.path, sample_rate)
            .and_then(|buffer| link.register_sample(slot.lane, slot.variant, buffer));
        match registered {
            Ok(()) => report.loaded += 1,
            Err(err) => {
                log::warn!("{}: {err:#}", slot.path.display());
                report.failed += 1;
            }
        }
    }
    log::info!(
        "samples: {} loaded, {} missing, {} failed ({} registered)",
        report.loaded,
        report.missing,
        report.failed,
        link.loaded_samples()
    );
    report
}
