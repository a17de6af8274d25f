mod shared;
mod tui;
mod audio_api;
mod audio;
mod config;
mod loader;
mod middle;
mod pipeline;
mod scheduler;
mod sequencer;

use std::path::Path;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use audio::{AudioClock, AudioHandle, Recorder};
use audio_api::{AudioCommand, NullEngine};
use config::Cli;
use middle::Middle;
use pipeline::persistence::{self, Autosave};
use scheduler::Scheduler;
use sequencer::snapshot::Snapshot;
use sequencer::{Sequencer, SharedSequencer};
use shared::HostAction;

const TICK_RATE: Duration = Duration::from_millis(16); // ~60fps

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let log_path = config::init_logging(&cli.project_dir, &cli.log_level)?;
    log::info!("neonbeat {} starting in {}", env!("CARGO_PKG_VERSION"), cli.project_dir.display());

    let (playhead_tx, playhead_rx) = crossbeam_channel::unbounded();
    let sequencer = Sequencer::with_playhead(Some(playhead_tx)).into_shared();
    restore_state(&sequencer, &cli);

    // the audio device is optional: without it the same scheduler drives a null engine
    let (audio, clock, scheduler) = if cli.no_audio {
        let clock = AudioClock::wall();
        let scheduler = Scheduler::spawn(sequencer.clone(), clock.clone(), NullEngine, cli.scheduler_config())?;
        (None, clock, scheduler)
    } else {
        let audio = audio::start_audio()?;
        let mut link = audio.link();
        loader::sample_loader::load_optional_samples(&cli.project_dir, audio.sample_rate(), &mut link);
        let clock = audio.clock();
        let scheduler = Scheduler::spawn(sequencer.clone(), clock.clone(), link, cli.scheduler_config())?;
        (Some(audio), clock, scheduler)
    };

    let mut middle = Middle::new(sequencer.clone(), clock, playhead_rx);
    if audio.is_none() {
        middle.set_message(format!("running without audio; log at {}", log_path.display()));
    }

    terminal::enable_raw_mode()?;
    // keyboard enhancement gives real press/release kinds; ignored where unsupported
    let _ = crossterm::execute!(
        std::io::stdout(),
        EnableMouseCapture,
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let mut tui_state = tui::mode::TuiState::default();
    let mut recorder: Option<Recorder> = None;
    let mut autosave = cli
        .autosave_delay()
        .map(|quiet| Autosave::new(quiet, sequencer.lock().snapshot()));

    loop {
        let ds = middle.display_state();
        let mut geometry = None;
        term.draw(|frame| {
            geometry = Some(tui::view::render(frame, frame.area(), &ds, &tui_state));
        })?;
        tui_state.grid = geometry;

        let events = tui::input::poll_input(TICK_RATE, &mut tui_state)?;
        for event in events {
            match middle.handle_input(event) {
                None => {}
                Some(HostAction::SaveState) => {
                    let snapshot = sequencer.lock().snapshot();
                    if save(&cli.project_dir, &snapshot, &mut middle) {
                        if let Some(autosave) = autosave.as_mut() {
                            autosave.mark_saved(snapshot);
                        }
                    }
                }
                Some(HostAction::ToggleRecording) => {
                    toggle_recording(audio.as_ref(), &mut recorder, &cli, &mut middle);
                }
                Some(HostAction::Quit) => {
                    if recorder.is_some() {
                        toggle_recording(audio.as_ref(), &mut recorder, &cli, &mut middle);
                    }
                    let snapshot = sequencer.lock().snapshot();
                    save(&cli.project_dir, &snapshot, &mut middle);
                    scheduler.shutdown();
                    drop(term);
                    drop(audio);
                    log::info!("bye");
                    return Ok(());
                }
            }
        }

        // also catches scene loads that land on a bar line
        if let Some(autosave) = autosave.as_mut() {
            let current = sequencer.lock().snapshot();
            if let Some(snapshot) = autosave.poll(current, Instant::now()) {
                match persistence::save_state(&cli.project_dir, &snapshot) {
                    Ok(path) => {
                        log::debug!("autosaved {}", path.display());
                        autosave.mark_saved(snapshot);
                    }
                    Err(e) => log::warn!("autosave failed: {e:#}"),
                }
            }
        }
    }
}

// Saved state first, then the command line on top of it.
fn restore_state(sequencer: &SharedSequencer, cli: &Cli) {
    let mut seq = sequencer.lock();
    match persistence::load_state(&cli.project_dir) {
        Ok(Some(patch)) => {
            seq.apply_snapshot(&patch, 0.0);
            log::info!("restored {}", persistence::state_file_path(&cli.project_dir).display());
        }
        Ok(None) => log::info!("no saved state, starting from defaults"),
        Err(e) => log::error!("ignoring saved state: {e:#}"),
    }
    if let Some(bpm) = cli.bpm {
        if !seq.set_tempo(bpm, 0.0) {
            log::warn!("--bpm {bpm} is not a usable tempo");
        }
    }
}

fn save(project_dir: &Path, snapshot: &Snapshot, middle: &mut Middle) -> bool {
    match persistence::save_state(project_dir, snapshot) {
        Ok(path) => {
            log::info!("saved {}", path.display());
            middle.set_message(format!("saved {}", path.display()));
            true
        }
        Err(e) => {
            log::error!("save failed: {e:#}");
            middle.set_message(format!("save failed: {e}"));
            false
        }
    }
}

fn toggle_recording(audio: Option<&AudioHandle>, recorder: &mut Option<Recorder>, cli: &Cli, middle: &mut Middle) {
    let Some(audio) = audio else {
        middle.set_message("recording needs an audio device");
        return;
    };

    if let Some(active) = recorder.take() {
        audio.send(AudioCommand::Tap(None));
        match active.finish() {
            Ok((path, frames)) => {
                let seconds = frames as f64 / f64::from(audio.sample_rate());
                log::info!("recorded {seconds:.1}s to {}", path.display());
                middle.set_message(format!("recorded {seconds:.1}s to {}", path.display()));
            }
            Err(e) => {
                log::error!("recording failed: {e:#}");
                middle.set_message(format!("recording failed: {e}"));
            }
        }
        middle.set_recording(false);
        return;
    }

    match Recorder::start(&cli.recordings_dir(), audio.sample_rate()) {
        Ok((started, tap)) => {
            audio.send(AudioCommand::Tap(Some(tap)));
            middle.set_message(format!("recording to {}", started.path().display()));
            *recorder = Some(started);
            middle.set_recording(true);
        }
        Err(e) => {
            log::error!("could not start recording: {e:#}");
            middle.set_message(format!("could not start recording: {e}"));
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags,
            DisableMouseCapture
        );
        let _ = terminal::disable_raw_mode();
    }
}
