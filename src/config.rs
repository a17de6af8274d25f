use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use crate::pipeline::persistence;
use crate::scheduler::SchedulerConfig;

const LOG_FILE: &str = "neonbeat.log";

/// Terminal step sequencer: 11 synth lanes × 16 steps, looped live
#[derive(Parser, Debug, Clone)]
#[command(name = "neonbeat")]
#[command(version)]
pub struct Cli {
    /// Project directory; holds .neonbeat/ (state, log, recordings) and samples/
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Tempo to start at, overriding the saved state
    #[arg(long)]
    pub bpm: Option<f64>,

    /// Run the sequencer without opening an audio device
    #[arg(long)]
    pub no_audio: bool,

    /// How far ahead of the audio clock triggers are queued
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(5..=1000))]
    pub lookahead_ms: u64,

    /// How often the scheduler thread wakes up
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=500))]
    pub tick_ms: u64,

    /// Save the state this long after the last change; 0 turns autosave off
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub autosave_ms: u64,

    /// Log filter (RUST_LOG wins when set), e.g. "debug" or "neonbeat=trace"
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            lookahead: Duration::from_millis(self.lookahead_ms),
            interval: Duration::from_millis(self.tick_ms),
        }
    }

    pub fn autosave_delay(&self) -> Option<Duration> {
        (self.autosave_ms > 0).then(|| Duration::from_millis(self.autosave_ms))
    }

    pub fn recordings_dir(&self) -> PathBuf {
        persistence::data_dir(&self.project_dir).join("recordings")
    }
}

// The terminal is in raw mode for the whole session, so logs go to a file
pub fn init_logging(project_dir: &Path, filter: &str) -> anyhow::Result<PathBuf> {
    let dir = persistence::data_dir(project_dir);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("logger already initialised")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_match_the_scheduler_defaults() {
        let cli = Cli::try_parse_from(["neonbeat"]).expect("parse");
        assert_eq!(cli.project_dir, PathBuf::from("."));
        assert_eq!(cli.scheduler_config(), crate::scheduler::SchedulerConfig::default());
        assert!(!cli.no_audio);
        assert!(cli.bpm.is_none());
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.autosave_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "neonbeat",
            "songs/night",
            "--bpm",
            "128",
            "--no-audio",
            "--lookahead-ms",
            "250",
            "--tick-ms",
            "20",
            "--autosave-ms",
            "0",
        ])
        .expect("parse");
        assert_eq!(cli.bpm, Some(128.0));
        assert!(cli.no_audio);
        assert_eq!(cli.scheduler_config().lookahead, Duration::from_millis(250));
        assert!(cli.recordings_dir().ends_with(".neonbeat/recordings"));
        assert_eq!(cli.autosave_delay(), None);
    }

    #[test]
    fn out_of_range_timing_is_rejected() {
        assert!(Cli::try_parse_from(["neonbeat", "--tick-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["neonbeat", "--lookahead-ms", "5000"]).is_err());
    }
}
