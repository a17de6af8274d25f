// Musical transport: turns tempo + swing into a stream of timestamped
// 16th-note pulses and owns the bar-boundary one-shots.
//
// Times are seconds in the audio clock's domain. The transport never looks
// at a clock itself; callers pull pulses up to a horizon with
// `next_pulse_before`.

use super::pattern::STEPS;

pub const STEPS_PER_BAR: u64 = STEPS as u64;
pub const TEMPO_RAMP_SECONDS: f64 = 0.05;
pub const MAX_SWING: f64 = 0.6;
/// No two pulses are ever closer than this.
pub const MIN_PULSE_GAP: f64 = 0.001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pulse {
    /// Pulses since the last start.
    pub index: u64,
    pub step: usize,
    pub time: f64,
    /// Duration of a 16th note at this pulse's tempo.
    pub sixteenth: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OneShotId(u64);

#[derive(Debug)]
struct OneShot<A> {
    id: OneShotId,
    pulse: u64,
    action: A,
}

#[derive(Clone, Copy, Debug)]
struct TempoRamp {
    from: f64,
    start: f64,
}

#[derive(Debug)]
pub struct Transport<A> {
    state: TransportState,
    bpm: f64,
    ramp: Option<TempoRamp>,
    swing: f64,
    next_index: u64,
    // unswung time of the next pulse
    next_grid_time: f64,
    one_shots: Vec<OneShot<A>>,
    next_id: u64,
}

impl<A> Transport<A> {
    pub fn new(bpm: f64, swing: f64) -> Self {
        let mut transport = Self {
            state: TransportState::Stopped,
            bpm: 120.0,
            ramp: None,
            swing: 0.0,
            next_index: 0,
            next_grid_time: 0.0,
            one_shots: Vec::new(),
            next_id: 0,
        };
        transport.set_tempo(bpm, 0.0);
        transport.set_swing(swing);
        transport
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    /// Target tempo (where any ramp ends up).
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn swing(&self) -> f64 {
        self.swing
    }

    /// Step the next pulse will land on.
    pub fn position(&self) -> usize {
        (self.next_index % STEPS_PER_BAR) as usize
    }

    pub fn pending_one_shots(&self) -> usize {
        self.one_shots.len()
    }

    pub fn bpm_at(&self, time: f64) -> f64 {
        match self.ramp {
            Some(r) if time < r.start + TEMPO_RAMP_SECONDS => {
                let t = ((time - r.start) / TEMPO_RAMP_SECONDS).clamp(0.0, 1.0);
                r.from + (self.bpm - r.from) * t
            }
            _ => self.bpm,
        }
    }

    /// Length of the 16th that starts at `t0`. Tempo is integrated across a
    /// running ramp, so a pulse straddling it lands between the two tempos.
    pub fn sixteenth_from(&self, t0: f64) -> f64 {
        let target = self.bpm / 15.0; // sixteenths per second
        let Some(r) = self.ramp.filter(|r| t0 < r.start + TEMPO_RAMP_SECONDS) else {
            return (1.0 / target).max(MIN_PULSE_GAP);
        };
        let end = r.start + TEMPO_RAMP_SECONDS;

        let from = r.from / 15.0;
        let mut left = 1.0;
        let mut t = t0;
        // flat stretch before the ramp begins
        if t < r.start {
            let flat = (r.start - t) * from;
            if flat >= left {
                return (left / from).max(MIN_PULSE_GAP);
            }
            left -= flat;
            t = r.start;
        }

        let slope = (target - from) / TEMPO_RAMP_SECONDS;
        let rate = from + slope * (t - r.start);
        let span = end - t;
        let covered = rate * span + 0.5 * slope * span * span;
        let d = if covered >= left {
            // rate·d + slope·d²/2 = left
            if slope.abs() < f64::EPSILON {
                left / rate
            } else {
                (-rate + (rate * rate + 2.0 * slope * left).sqrt()) / slope
            }
        } else {
            span + (left - covered) / target
        };
        (t - t0 + d).max(MIN_PULSE_GAP)
    }

    /// Returns false (and changes nothing) for non-positive or non-finite
    /// tempos. While running the change ramps in over `TEMPO_RAMP_SECONDS`,
    /// starting no earlier than the first pulse not yet emitted.
    pub fn set_tempo(&mut self, bpm: f64, at: f64) -> bool {
        if !(bpm.is_finite() && bpm > 0.0) {
            log::warn!("ignoring invalid tempo {bpm}");
            return false;
        }
        self.ramp = if self.is_running() {
            let start = at.max(self.next_grid_time);
            Some(TempoRamp {
                from: self.bpm_at(start),
                start,
            })
        } else {
            None
        };
        self.bpm = bpm;
        true
    }

    pub fn set_swing(&mut self, amount: f64) {
        if amount.is_finite() {
            self.swing = amount.clamp(0.0, MAX_SWING);
        }
    }

    // Odd pulses slide late by swing × 8th, but never past the next even
    // pulse.
    fn swing_offset(&self, sixteenth: f64) -> f64 {
        let eighth = 2.0 * sixteenth;
        (self.swing * eighth).min(sixteenth - MIN_PULSE_GAP).max(0.0)
    }

    /// Always a full restart from step 0; pending one-shots are dropped.
    pub fn start(&mut self, at: f64) {
        self.cancel_all();
        self.ramp = None;
        self.next_index = 0;
        self.next_grid_time = at;
        self.state = TransportState::Running;
    }

    pub fn pause(&mut self) {
        if self.state == TransportState::Running {
            self.state = TransportState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.cancel_all();
        self.ramp = None;
        self.next_index = 0;
        self.state = TransportState::Stopped;
    }

    /// Emits the next pulse if it is scheduled before `until`.
    pub fn next_pulse_before(&mut self, until: f64) -> Option<Pulse> {
        if !self.is_running() {
            return None;
        }
        let index = self.next_index;
        let sixteenth = self.sixteenth_from(self.next_grid_time);
        let time = if index % 2 == 1 {
            self.next_grid_time + self.swing_offset(sixteenth)
        } else {
            self.next_grid_time
        };
        if time >= until {
            return None;
        }
        self.next_index += 1;
        self.next_grid_time += sixteenth;
        Some(Pulse {
            index,
            step: (index % STEPS_PER_BAR) as usize,
            time,
            sixteenth,
        })
    }

    /// Registers `action` for the first bar line not yet emitted. `None` when
    /// the transport isn't running; the caller applies the effect directly.
    pub fn schedule_at_next_bar(&mut self, action: A) -> Option<OneShotId> {
        if !self.is_running() {
            return None;
        }
        let id = OneShotId(self.next_id);
        self.next_id += 1;
        let pulse = self.next_index.div_ceil(STEPS_PER_BAR) * STEPS_PER_BAR;
        self.one_shots.push(OneShot { id, pulse, action });
        Some(id)
    }

    pub fn cancel(&mut self, id: OneShotId) -> bool {
        let before = self.one_shots.len();
        self.one_shots.retain(|s| s.id != id);
        self.one_shots.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.one_shots.clear();
    }

    /// Removes and returns every one-shot due at or before `pulse`.
    pub fn take_due(&mut self, pulse: u64) -> Vec<A> {
        if !self.one_shots.iter().any(|s| s.pulse <= pulse) {
            return Vec::new();
        }
        let (due, pending): (Vec<_>, Vec<_>) = self
            .one_shots
            .drain(..)
            .partition(|s| s.pulse <= pulse);
        self.one_shots = pending;
        due.into_iter().map(|s| s.action).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Pulse, Transport, TransportState, MIN_PULSE_GAP, STEPS_PER_BAR};

    const EPS: f64 = 1e-9;

    fn pulses(transport: &mut Transport<()>, count: usize) -> Vec<Pulse> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            match transport.next_pulse_before(f64::MAX) {
                Some(p) => out.push(p),
                None => break,
            }
        }
        out
    }

    #[test]
    fn step_index_wraps_every_sixteen_pulses() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        for (n, pulse) in pulses(&mut transport, 50).iter().enumerate() {
            assert_eq!(pulse.index, n as u64);
            assert_eq!(pulse.step, n % 16);
        }
    }

    #[test]
    fn unswung_pulses_are_evenly_spaced() {
        let mut transport = Transport::<()>::new(100.0, 0.0);
        transport.start(0.0);
        let ps = pulses(&mut transport, 16);
        for (n, p) in ps.iter().enumerate() {
            assert!((p.time - n as f64 * 0.15).abs() < EPS, "pulse {n} at {}", p.time);
        }
    }

    #[test]
    fn swing_delays_only_odd_pulses() {
        let mut straight = Transport::<()>::new(120.0, 0.0);
        let mut swung = Transport::<()>::new(120.0, 0.2);
        straight.start(1.0);
        swung.start(1.0);
        let a = pulses(&mut straight, 16);
        let b = pulses(&mut swung, 16);
        let eighth = 2.0 * a[0].sixteenth;
        for k in 0..8 {
            let even = 2 * k;
            assert!((a[even].time - b[even].time).abs() < EPS);
            let straight_gap = a[even + 1].time - a[even].time;
            let swung_gap = b[even + 1].time - b[even].time;
            assert!((swung_gap - straight_gap - 0.2 * eighth).abs() < EPS);
        }
    }

    #[test]
    fn heavy_swing_never_overtakes_the_next_pulse() {
        let mut transport = Transport::<()>::new(120.0, 0.6);
        transport.start(0.0);
        let ps = pulses(&mut transport, 32);
        for pair in ps.windows(2) {
            assert!(pair[1].time - pair[0].time >= MIN_PULSE_GAP - EPS);
        }
    }

    #[test]
    fn absurd_tempos_are_rejected_or_floored() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        assert!(!transport.set_tempo(0.0, 0.0));
        assert!(!transport.set_tempo(-5.0, 0.0));
        assert!(!transport.set_tempo(f64::NAN, 0.0));
        assert_eq!(transport.bpm(), 120.0);
        assert!(transport.set_tempo(1.0e9, 0.0));
        transport.start(0.0);
        let ps = pulses(&mut transport, 4);
        assert!((ps[1].time - ps[0].time - MIN_PULSE_GAP).abs() < EPS);
    }

    #[test]
    fn tempo_change_ramps_without_touching_emitted_pulses() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        let first = pulses(&mut transport, 4);
        assert!(transport.set_tempo(60.0, 0.5));
        assert!((transport.bpm_at(0.5) - 120.0).abs() < EPS);
        assert!((transport.bpm_at(0.525) - 90.0).abs() < EPS);
        assert!((transport.bpm_at(0.6) - 60.0).abs() < EPS);
        let rest = pulses(&mut transport, 4);
        assert_eq!(rest[0].index, 4);
        assert!((rest[0].time - first[3].time - 0.125).abs() < EPS);
        assert!((rest[3].sixteenth - 0.25).abs() < EPS);
    }

    #[test]
    fn lookahead_rendering_still_hears_the_ramp() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        let mut emitted = Vec::new();
        let mut now = 0.0;
        // render 100 ms ahead every 10 ms, like the scheduler thread
        while now < 3.0 {
            if (now - 0.5_f64).abs() < 1e-9 {
                assert!(transport.set_tempo(60.0, now));
            }
            while let Some(p) = transport.next_pulse_before(now + 0.1) {
                emitted.push(p);
            }
            now = ((now + 0.01) * 100.0).round() / 100.0;
        }

        let after: Vec<&Pulse> = emitted.iter().filter(|p| p.time >= 0.5).collect();
        // pulse 4 at 0.5 was already rendered when the tempo changed
        assert!((after[0].sixteenth - 0.125).abs() < EPS);
        let bridging = after[1].sixteenth;
        assert!(bridging > 0.125 + EPS && bridging < 0.25 - EPS, "bridging 16th {bridging}");
        assert!(after[2..].iter().all(|p| (p.sixteenth - 0.25).abs() < EPS));
        assert!(emitted.windows(2).all(|w| w[1].time > w[0].time));
    }

    #[test]
    fn ramp_length_integrates_both_tempos() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        pulses(&mut transport, 4);
        assert!(transport.set_tempo(60.0, 0.0));
        // 50 ms averaging 90 bpm covers 0.3 of a 16th; the rest runs at 60 bpm
        let p = pulses(&mut transport, 1)[0];
        assert!((p.time - 0.5).abs() < EPS);
        assert!((p.sixteenth - (0.05 + 0.7 * 0.25)).abs() < EPS);
    }

    #[test]
    fn pulses_respect_the_horizon() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        let mut count = 0;
        while transport.next_pulse_before(0.5).is_some() {
            count += 1;
        }
        // 0.0, 0.125, 0.25, 0.375
        assert_eq!(count, 4);
        assert_eq!(transport.position(), 4);
    }

    #[test]
    fn one_shot_needs_a_running_transport() {
        let mut transport = Transport::<u8>::new(120.0, 0.0);
        assert!(transport.schedule_at_next_bar(1).is_none());
        transport.start(0.0);
        transport.pause();
        assert!(transport.schedule_at_next_bar(1).is_none());
    }

    #[test]
    fn one_shot_fires_once_on_the_next_bar_line() {
        let mut transport = Transport::<u8>::new(120.0, 0.0);
        transport.start(0.0);
        for _ in 0..5 {
            transport.next_pulse_before(f64::MAX);
        }
        assert!(transport.schedule_at_next_bar(9).is_some());
        let mut fired_at = Vec::new();
        for _ in 0..40 {
            let p = transport.next_pulse_before(f64::MAX).expect("running");
            for action in transport.take_due(p.index) {
                fired_at.push((p.index, action));
            }
        }
        assert_eq!(fired_at, vec![(STEPS_PER_BAR, 9)]);
    }

    #[test]
    fn stop_and_restart_drop_pending_one_shots() {
        let mut transport = Transport::<u8>::new(120.0, 0.0);
        transport.start(0.0);
        transport.next_pulse_before(f64::MAX);
        transport.schedule_at_next_bar(1);
        transport.stop();
        assert_eq!(transport.pending_one_shots(), 0);
        assert_eq!(transport.state(), TransportState::Stopped);

        transport.start(0.0);
        transport.next_pulse_before(f64::MAX);
        transport.schedule_at_next_bar(2);
        transport.pause();
        assert_eq!(transport.pending_one_shots(), 1, "pause keeps them");
        transport.start(3.0);
        assert_eq!(transport.pending_one_shots(), 0, "restart cancels them");
    }

    #[test]
    fn cancel_removes_a_single_one_shot() {
        let mut transport = Transport::<u8>::new(120.0, 0.0);
        transport.start(0.0);
        let a = transport.schedule_at_next_bar(1).expect("running");
        transport.schedule_at_next_bar(2);
        assert!(transport.cancel(a));
        assert!(!transport.cancel(a));
        assert_eq!(transport.take_due(STEPS_PER_BAR), vec![2]);
    }

    #[test]
    fn pause_keeps_position_and_start_resets_it() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        pulses(&mut transport, 6);
        transport.pause();
        assert!(transport.next_pulse_before(f64::MAX).is_none());
        assert_eq!(transport.position(), 6);
        transport.start(10.0);
        let p = transport.next_pulse_before(f64::MAX).expect("running");
        assert_eq!(p.step, 0);
        assert!((p.time - 10.0).abs() < EPS);
    }

    #[test]
    fn start_while_running_is_a_full_restart() {
        let mut transport = Transport::<()>::new(120.0, 0.0);
        transport.start(0.0);
        pulses(&mut transport, 7);
        transport.start(2.0);
        let p = transport.next_pulse_before(f64::MAX).expect("running");
        assert_eq!((p.index, p.step), (0, 0));
    }
}
