use super::lane::{Lane, LaneMap};
use super::pattern::{
    default_active, default_volumes, empty_pattern, hats_drive, hats_offbeat, row, Pattern,
};

pub const NUM_SCENES: usize = 4;

/// Wet levels of the two send effects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FxLevels {
    pub reverb_wet: f32,
    pub delay_wet: f32,
}

impl Default for FxLevels {
    fn default() -> Self {
        Self {
            reverb_wet: 0.22,
            delay_wet: 0.16,
        }
    }
}

impl FxLevels {
    pub fn clamped(self) -> Self {
        Self {
            reverb_wet: clamp_unit(self.reverb_wet, 0.0),
            delay_wet: clamp_unit(self.delay_wet, 0.0),
        }
    }
}

fn clamp_unit(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback }
}

/// Built-in, read-only full-state template.
#[derive(Clone, Debug)]
pub struct Vibe {
    pub name: &'static str,
    pub description: &'static str,
    pub bpm: f64,
    pub swing: f64,
    pub fx: FxLevels,
    pub active: LaneMap<bool>,
    pub volumes: LaneMap<f32>,
    pub pattern: Pattern,
}

fn active_with(overrides: &[(Lane, bool)]) -> LaneMap<bool> {
    let mut active = default_active();
    for &(lane, on) in overrides {
        active[lane] = on;
    }
    active
}

fn pattern_with(rows: &[(Lane, &[usize])]) -> Pattern {
    let mut pattern = empty_pattern();
    for &(lane, steps) in rows {
        pattern[lane] = row(steps);
    }
    pattern
}

pub fn builtin_vibes() -> Vec<Vibe> {
    use Lane::*;

    let night_drive = {
        let mut pattern = pattern_with(&[
            (Kick, &[0, 8]),
            (Snare, &[4, 12]),
            (Bass, &[0, 3, 8, 11]),
            (Sub, &[0, 3, 8, 11]),
            (Lead, &[6, 14]),
            (Pad, &[0, 4, 8, 12]),
        ]);
        pattern[Hihat] = hats_offbeat();
        Vibe {
            name: "Night Drive",
            description: "Moody C-minor, mid tempo, 4-bar pads, simple kick/snare.",
            bpm: 100.0,
            swing: 0.18,
            fx: FxLevels { reverb_wet: 0.22, delay_wet: 0.16 },
            active: active_with(&[(Arp, false), (Stab, false), (Vox, false), (Adlib, false)]),
            volumes: default_volumes(),
            pattern,
        }
    };

    let arcade_boss = {
        let mut pattern = pattern_with(&[
            (Kick, &[0, 4, 8, 12]),
            (Snare, &[4, 12]),
            (Bass, &[0, 2, 4, 6, 8, 10, 12, 14]),
            (Sub, &[0, 4, 8, 12]),
            (Lead, &[2, 6, 10, 14]),
            (Arp, &[1, 3, 5, 7, 9, 11, 13, 15]),
            (Pad, &[0, 8]),
            (Stab, &[7, 15]),
        ]);
        pattern[Hihat] = hats_drive();
        Vibe {
            name: "Arcade Boss",
            description: "Upbeat outrun feel with stabs.",
            bpm: 118.0,
            swing: 0.14,
            fx: FxLevels { reverb_wet: 0.2, delay_wet: 0.18 },
            active: active_with(&[(Stab, true), (Arp, true)]),
            volumes: default_volumes(),
            pattern,
        }
    };

    let opera_wave = Vibe {
        name: "Opera Wave",
        description: "Slow cinematic pads with opera vox flourishes.",
        bpm: 92.0,
        swing: 0.2,
        fx: FxLevels { reverb_wet: 0.3, delay_wet: 0.14 },
        active: active_with(&[(Vox, true), (Lead, false), (Arp, false), (Stab, false)]),
        volumes: default_volumes(),
        pattern: pattern_with(&[
            (Kick, &[0, 8]),
            (Snare, &[12]),
            (Hihat, &[2, 6, 10, 14]),
            (Bass, &[0, 8]),
            (Sub, &[0, 8]),
            (Pad, &[0, 4, 8, 12]),
            (Vox, &[6, 14]),
        ]),
    };

    let grime_set = Vibe {
        name: "UK Grime Set",
        description: "140 BPM grimey drive with ad-libs.",
        bpm: 140.0,
        swing: 0.12,
        fx: FxLevels { reverb_wet: 0.18, delay_wet: 0.12 },
        active: active_with(&[(Adlib, true), (Hihat, true)]),
        volumes: default_volumes(),
        pattern: pattern_with(&[
            (Kick, &[0, 7, 8, 11, 12, 15]),
            (Snare, &[4, 12]),
            (Hihat, &[2, 3, 6, 7, 10, 11, 14, 15]),
            (Bass, &[0, 4, 8, 12]),
            (Sub, &[0, 8]),
            (Adlib, &[5, 13]),
        ]),
    };

    let neon_noir = Vibe {
        name: "Neon Noir",
        description: "Slow darkwave swagger; sparse drums, wide pads, occasional lead.",
        bpm: 90.0,
        swing: 0.22,
        fx: FxLevels { reverb_wet: 0.28, delay_wet: 0.14 },
        active: active_with(&[(Arp, false)]),
        volumes: default_volumes(),
        pattern: pattern_with(&[
            (Kick, &[0, 10]),
            (Snare, &[4, 12]),
            (Hihat, &[2, 6, 10, 14]),
            (Bass, &[0, 5, 8, 13]),
            (Sub, &[0, 8]),
            (Lead, &[6]),
            (Pad, &[0, 4, 8, 12]),
        ]),
    };

    let beach_sunset = {
        let mut pattern = pattern_with(&[
            (Kick, &[0, 4, 8, 12]),
            (Snare, &[4, 12]),
            (Bass, &[0, 4, 8, 12]),
            (Sub, &[0, 8]),
            (Lead, &[1, 5, 9, 13]),
            (Arp, &[2, 6, 10, 14]),
            (Pad, &[0, 8]),
        ]);
        pattern[Hihat] = hats_offbeat();
        Vibe {
            name: "Beach Sunset",
            description: "Bright nostalgic cruiser; arp shimmer over a minor key.",
            bpm: 108.0,
            swing: 0.16,
            fx: FxLevels { reverb_wet: 0.24, delay_wet: 0.2 },
            active: active_with(&[(Arp, true)]),
            volumes: default_volumes(),
            pattern,
        }
    };

    let darkwave = Vibe {
        name: "Darkwave",
        description: "Heavier low end, minimal lead, tom-style drive via bass/sub.",
        bpm: 96.0,
        swing: 0.2,
        fx: FxLevels { reverb_wet: 0.26, delay_wet: 0.12 },
        active: active_with(&[(Lead, false), (Arp, false), (Stab, true)]),
        volumes: default_volumes(),
        pattern: pattern_with(&[
            (Kick, &[0, 4, 8, 12]),
            (Snare, &[12]),
            (Hihat, &[2, 6, 10, 14]),
            (Bass, &[0, 3, 6, 9, 12, 15]),
            (Sub, &[0, 8, 12]),
            (Pad, &[0, 8]),
            (Stab, &[7, 15]),
        ]),
    };

    vec![
        night_drive,
        arcade_boss,
        opera_wave,
        grime_set,
        neon_noir,
        beach_sunset,
        darkwave,
    ]
}

/// Read-only vibes plus the writable scene slots.
#[derive(Clone, Debug)]
pub struct Presets {
    vibes: Vec<Vibe>,
    scenes: [Option<Pattern>; NUM_SCENES],
    vibe_index: usize,
    scene_index: usize,
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            vibes: builtin_vibes(),
            scenes: Default::default(),
            vibe_index: 0,
            scene_index: 0,
        }
    }
}

impl Presets {
    pub fn vibes(&self) -> &[Vibe] {
        &self.vibes
    }

    pub fn vibe(&self, id: usize) -> Option<&Vibe> {
        self.vibes.get(id)
    }

    pub fn vibe_index(&self) -> usize {
        self.vibe_index
    }

    pub fn select_vibe(&mut self, id: usize) {
        assert!(id < self.vibes.len(), "vibe {id} out of range");
        self.vibe_index = id;
    }

    pub fn scene(&self, slot: usize) -> Option<&Pattern> {
        assert!(slot < NUM_SCENES, "scene slot {slot} out of range");
        self.scenes[slot].as_ref()
    }

    pub fn scene_index(&self) -> usize {
        self.scene_index
    }

    pub fn select_scene(&mut self, slot: usize) {
        assert!(slot < NUM_SCENES, "scene slot {slot} out of range");
        self.scene_index = slot;
    }

    pub fn save_scene(&mut self, slot: usize, pattern: &Pattern) {
        assert!(slot < NUM_SCENES, "scene slot {slot} out of range");
        self.scenes[slot] = Some(pattern.clone());
    }

    pub fn saved_scenes(&self) -> [bool; NUM_SCENES] {
        std::array::from_fn(|i| self.scenes[i].is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::{builtin_vibes, FxLevels, Presets, NUM_SCENES};
    use crate::sequencer::lane::Lane;
    use crate::sequencer::pattern::{empty_pattern, row};

    #[test]
    fn every_vibe_is_in_range() {
        let vibes = builtin_vibes();
        assert_eq!(vibes.len(), 7);
        for vibe in &vibes {
            assert!(vibe.bpm > 0.0);
            assert!((0.0..=0.6).contains(&vibe.swing), "{}", vibe.name);
            assert_eq!(vibe.fx, vibe.fx.clamped());
            assert!(vibe.volumes.iter().all(|(_, db)| (-24.0..=0.0).contains(db)));
        }
    }

    #[test]
    fn grime_set_turns_on_the_adlib_lane() {
        let vibes = builtin_vibes();
        let grime = vibes.iter().find(|v| v.name == "UK Grime Set").expect("grime vibe");
        assert!(grime.active[Lane::Adlib]);
        assert_eq!(grime.pattern[Lane::Adlib], row(&[5, 13]));
        assert_eq!(grime.bpm, 140.0);
    }

    #[test]
    fn scenes_start_empty_and_store_copies() {
        let mut presets = Presets::default();
        assert_eq!(presets.saved_scenes(), [false; NUM_SCENES]);
        let mut pattern = empty_pattern();
        pattern[Lane::Kick] = row(&[0]);
        presets.save_scene(2, &pattern);
        pattern[Lane::Kick] = row(&[1]);
        assert_eq!(presets.scene(2).map(|p| p[Lane::Kick]), Some(row(&[0])));
        assert!(presets.scene(0).is_none());
    }

    #[test]
    #[should_panic]
    fn scene_slot_out_of_range_panics() {
        let presets = Presets::default();
        let _ = presets.scene(NUM_SCENES);
    }

    #[test]
    fn fx_levels_clamp_and_drop_nan() {
        let fx = FxLevels {
            reverb_wet: 1.7,
            delay_wet: f32::NAN,
        }
        .clamped();
        assert_eq!(fx.reverb_wet, 1.0);
        assert_eq!(fx.delay_wet, 0.0);
    }
}
