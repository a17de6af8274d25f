use rand::Rng;

use super::lane::{Lane, LaneMap};

pub const STEPS: usize = 16;
pub const MIN_VOLUME_DB: f32 = -24.0;
pub const MAX_VOLUME_DB: f32 = 0.0;

pub type Row = [bool; STEPS];
pub type Pattern = LaneMap<Row>;

pub const EMPTY_ROW: Row = [false; STEPS];

/// A row with exactly the given steps switched on.
pub fn row(steps: &[usize]) -> Row {
    let mut r = EMPTY_ROW;
    for &step in steps {
        assert!(step < STEPS, "step {step} out of range");
        r[step] = true;
    }
    r
}

pub fn empty_pattern() -> Pattern {
    LaneMap::splat(EMPTY_ROW)
}

// offbeat hats: everything except the quarter-note downbeats
pub fn hats_offbeat() -> Row {
    row(&[1, 2, 3, 5, 6, 7, 9, 10, 11, 13, 14, 15])
}

pub fn hats_drive() -> Row {
    std::array::from_fn(|i| i % 4 != 0)
}

/// One-click starting points that overwrite a lane or two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Groove {
    Backbeat,
    FourOnFloor,
    SixteenthHats,
    MinorPads,
    OctaveBass,
}

impl Groove {
    pub const ALL: [Groove; 5] = [
        Groove::Backbeat,
        Groove::FourOnFloor,
        Groove::SixteenthHats,
        Groove::MinorPads,
        Groove::OctaveBass,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Groove::Backbeat => "backbeat",
            Groove::FourOnFloor => "4-on-floor",
            Groove::SixteenthHats => "16th hats",
            Groove::MinorPads => "minor pads",
            Groove::OctaveBass => "octave bass",
        }
    }
}

pub fn default_active() -> LaneMap<bool> {
    LaneMap::from_fn(|lane| !matches!(lane, Lane::Stab | Lane::Vox | Lane::Adlib))
}

pub fn default_volumes() -> LaneMap<f32> {
    LaneMap::from_fn(|lane| match lane {
        Lane::Kick => -8.0,
        Lane::Snare => -10.0,
        Lane::Hihat => -14.0,
        Lane::Bass => -5.0,
        Lane::Sub => -6.0,
        Lane::Lead => -10.0,
        Lane::Arp => -12.0,
        Lane::Pad => -8.0,
        Lane::Stab => -8.0,
        Lane::Vox => -12.0,
        Lane::Adlib => -10.0,
    })
}

pub fn default_density() -> LaneMap<f32> {
    LaneMap::from_fn(|lane| match lane {
        Lane::Kick => 0.35,
        Lane::Snare => 0.25,
        Lane::Hihat => 0.65,
        Lane::Bass => 0.4,
        Lane::Sub => 0.4,
        Lane::Lead => 0.3,
        Lane::Arp => 0.55,
        Lane::Pad => 0.18,
        Lane::Stab => 0.25,
        Lane::Vox => 0.15,
        Lane::Adlib => 0.1,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PaintGesture {
    lane: Lane,
    value: bool,
}

/// The editable grid plus per-lane mixer metadata.
#[derive(Clone, Debug)]
pub struct PatternStore {
    pattern: Pattern,
    active: LaneMap<bool>,
    volumes: LaneMap<f32>,
    density: LaneMap<f32>,
    gesture: Option<PaintGesture>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self {
            pattern: empty_pattern(),
            active: default_active(),
            volumes: default_volumes(),
            density: default_density(),
            gesture: None,
        }
    }
}

impl PatternStore {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn active(&self) -> &LaneMap<bool> {
        &self.active
    }

    pub fn volumes(&self) -> &LaneMap<f32> {
        &self.volumes
    }

    pub fn density(&self) -> &LaneMap<f32> {
        &self.density
    }

    pub fn is_set(&self, lane: Lane, step: usize) -> bool {
        assert!(step < STEPS, "step {step} out of range");
        self.pattern[lane][step]
    }

    /// Set and active: the dispatcher's gate.
    pub fn is_audible(&self, lane: Lane, step: usize) -> bool {
        self.active[lane] && self.is_set(lane, step)
    }

    pub fn toggle_step(&mut self, lane: Lane, step: usize) {
        assert!(step < STEPS, "step {step} out of range");
        let cell = &mut self.pattern[lane][step];
        *cell = !*cell;
    }

    pub fn set_step(&mut self, lane: Lane, step: usize, value: bool) {
        assert!(step < STEPS, "step {step} out of range");
        self.pattern[lane][step] = value;
    }

    // Drag painting. The first cell picks the paint value (its inverse) and is
    // flipped; every later cell of that lane is forced to the same value.
    pub fn begin_paint(&mut self, lane: Lane, step: usize) {
        let value = !self.is_set(lane, step);
        self.gesture = Some(PaintGesture { lane, value });
        self.set_step(lane, step, value);
    }

    pub fn paint_enter(&mut self, lane: Lane, step: usize) {
        match self.gesture {
            Some(g) if g.lane == lane => self.set_step(lane, step, g.value),
            _ => {}
        }
    }

    pub fn end_paint(&mut self) {
        self.gesture = None;
    }

    pub fn clear_lane(&mut self, lane: Lane) {
        self.pattern[lane] = EMPTY_ROW;
    }

    pub fn clear_all(&mut self) {
        self.pattern = empty_pattern();
    }

    pub fn randomize_lane(&mut self, lane: Lane) {
        self.randomize_lane_with(lane, &mut rand::thread_rng());
    }

    pub fn randomize_lane_with<R: Rng + ?Sized>(&mut self, lane: Lane, rng: &mut R) {
        let p = f64::from(self.density[lane].clamp(0.0, 1.0));
        self.pattern[lane] = std::array::from_fn(|_| rng.gen_bool(p));
    }

    pub fn apply_groove(&mut self, groove: Groove) {
        match groove {
            Groove::Backbeat => self.pattern[Lane::Snare] = row(&[4, 12]),
            Groove::FourOnFloor => self.pattern[Lane::Kick] = row(&[0, 4, 8, 12]),
            Groove::SixteenthHats => self.pattern[Lane::Hihat] = hats_offbeat(),
            Groove::MinorPads => self.pattern[Lane::Pad] = row(&[0, 4, 8, 12]),
            Groove::OctaveBass => {
                self.pattern[Lane::Bass] = row(&[0, 4, 8, 12]);
                self.pattern[Lane::Sub] = row(&[0, 8]);
            }
        }
    }

    pub fn set_volume(&mut self, lane: Lane, db: f32) {
        if db.is_finite() {
            self.volumes[lane] = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
        }
    }

    pub fn set_density(&mut self, lane: Lane, p: f32) {
        if p.is_finite() {
            self.density[lane] = p.clamp(0.0, 1.0);
        }
    }

    pub fn set_active(&mut self, lane: Lane, on: bool) {
        self.active[lane] = on;
    }

    pub fn toggle_active(&mut self, lane: Lane) {
        self.active[lane] = !self.active[lane];
    }

    pub fn set_row(&mut self, lane: Lane, row: Row) {
        self.pattern[lane] = row;
    }

    pub fn replace_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
    }

    pub fn replace_active(&mut self, active: LaneMap<bool>) {
        self.active = active;
    }

    pub fn replace_volumes(&mut self, volumes: LaneMap<f32>) {
        for (lane, db) in volumes.iter() {
            self.set_volume(lane, *db);
        }
    }
}
