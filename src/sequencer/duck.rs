// Gain automation for the shared music bus. Only the kick path writes to it.

pub const DUCK_LEVEL: f32 = 0.75;
pub const DUCK_RECOVERY_SECONDS: f64 = 0.24;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Segment {
    // jump to the value at `time`
    Set,
    // ramp linearly from the previous point, arriving at `time`
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Point {
    time: f64,
    value: f32,
    segment: Segment,
}

/// A sorted list of automation points, evaluated at arbitrary times.
#[derive(Clone, Debug)]
pub struct GainAutomation {
    initial: f32,
    points: Vec<Point>,
}

impl GainAutomation {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            points: Vec::with_capacity(16),
        }
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let after = self.points.partition_point(|p| p.time <= time);
        let (prev_time, prev_value) = match after.checked_sub(1) {
            Some(i) => (self.points[i].time, self.points[i].value),
            None => (f64::NEG_INFINITY, self.initial),
        };
        match self.points.get(after) {
            Some(next) if next.segment == Segment::Linear && prev_time.is_finite() => {
                let span = next.time - prev_time;
                if span <= 0.0 {
                    return next.value;
                }
                let t = ((time - prev_time) / span) as f32;
                prev_value + (next.value - prev_value) * t
            }
            _ => prev_value,
        }
    }

    /// Drops every point at or after `time`, pinning the value it had there.
    pub fn cancel_and_hold_at(&mut self, time: f64) {
        let held = self.value_at(time);
        let keep = self.points.partition_point(|p| p.time < time);
        self.points.truncate(keep);
        self.insert(Point {
            time,
            value: held,
            segment: Segment::Set,
        });
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(Point {
            time,
            value,
            segment: Segment::Set,
        });
    }

    pub fn linear_ramp_to(&mut self, value: f32, time: f64) {
        self.insert(Point {
            time,
            value,
            segment: Segment::Linear,
        });
    }

    /// Sidechain-style dip: instant drop, linear recovery to unity.
    pub fn duck(&mut self, at: f64) {
        self.cancel_and_hold_at(at);
        self.set_value_at(DUCK_LEVEL, at);
        self.linear_ramp_to(1.0, at + DUCK_RECOVERY_SECONDS);
    }

    /// Forgets history before `time` while keeping `value_at` unchanged.
    pub fn prune_before(&mut self, time: f64) {
        let first_future = self.points.partition_point(|p| p.time <= time);
        if first_future >= 2 {
            let last_past = first_future - 1;
            self.initial = self.points[last_past].value;
            self.points.drain(..last_past);
        }
    }

    fn insert(&mut self, point: Point) {
        let at = self.points.partition_point(|p| p.time <= point.time);
        self.points.insert(at, point);
    }
}

impl Default for GainAutomation {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{GainAutomation, DUCK_LEVEL, DUCK_RECOVERY_SECONDS};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn duck_drops_then_recovers_linearly() {
        let mut gain = GainAutomation::default();
        gain.duck(1.0);
        assert!(close(gain.value_at(0.5), 1.0));
        assert!(close(gain.value_at(1.0), DUCK_LEVEL));
        assert!(close(gain.value_at(1.0 + DUCK_RECOVERY_SECONDS / 2.0), 0.875));
        assert!(close(gain.value_at(1.0 + DUCK_RECOVERY_SECONDS), 1.0));
        assert!(close(gain.value_at(5.0), 1.0));
    }

    #[test]
    fn back_to_back_ducks_do_not_stack() {
        let mut gain = GainAutomation::default();
        gain.duck(0.0);
        gain.duck(0.1);
        // the first ramp's endpoint at 0.24 is gone; the second ramp owns
        // the curve from 0.1 onwards
        assert!(close(gain.value_at(0.1), DUCK_LEVEL));
        assert!(close(gain.value_at(0.22), 0.875));
        assert!(gain.value_at(0.24) < 1.0);
        assert!(close(gain.value_at(0.34), 1.0));
    }

    #[test]
    fn cancel_and_hold_pins_the_mid_ramp_value() {
        let mut gain = GainAutomation::default();
        gain.duck(0.0);
        gain.cancel_and_hold_at(0.12);
        assert!(close(gain.value_at(0.12), 0.875));
        assert!(close(gain.value_at(10.0), 0.875));
    }

    #[test]
    fn pruning_keeps_the_curve() {
        let mut gain = GainAutomation::default();
        gain.duck(0.0);
        gain.duck(1.0);
        let probe = [1.0, 1.06, 1.12, 1.3];
        let before: Vec<f32> = probe.iter().map(|t| gain.value_at(*t)).collect();
        gain.prune_before(1.05);
        let after: Vec<f32> = probe.iter().map(|t| gain.value_at(*t)).collect();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!(close(*a, *b));
        }
    }
}
