use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

pub const LANE_COUNT: usize = 11;

/// One instrument track of the grid. The set is closed; every per-lane table
/// in the crate is a `LaneMap` so a missing lane can't be represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Kick,
    Snare,
    Hihat,
    Bass,
    Sub,
    Lead,
    Arp,
    Pad,
    Stab,
    Vox,
    Adlib,
}

impl Lane {
    pub const ALL: [Lane; LANE_COUNT] = [
        Lane::Kick,
        Lane::Snare,
        Lane::Hihat,
        Lane::Bass,
        Lane::Sub,
        Lane::Lead,
        Lane::Arp,
        Lane::Pad,
        Lane::Stab,
        Lane::Vox,
        Lane::Adlib,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Lane::Kick => "kick",
            Lane::Snare => "snare",
            Lane::Hihat => "hihat",
            Lane::Bass => "bass",
            Lane::Sub => "sub",
            Lane::Lead => "lead",
            Lane::Arp => "arp",
            Lane::Pad => "pad",
            Lane::Stab => "stab",
            Lane::Vox => "vox",
            Lane::Adlib => "adlib",
        }
    }

    // drum lanes can be served by the sample kit
    pub fn is_drum(self) -> bool {
        matches!(self, Lane::Kick | Lane::Snare | Lane::Hihat)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lane {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lane::ALL
            .into_iter()
            .find(|lane| lane.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown lane '{s}'"))
    }
}

/// A value for every lane, stored densely in lane order.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneMap<T>([T; LANE_COUNT]);

impl<T> LaneMap<T> {
    pub fn from_fn(mut f: impl FnMut(Lane) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Lane::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lane, &T)> {
        Lane::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Clone> LaneMap<T> {
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<Lane> for LaneMap<T> {
    type Output = T;

    fn index(&self, lane: Lane) -> &T {
        &self.0[lane.index()]
    }
}

impl<T> IndexMut<Lane> for LaneMap<T> {
    fn index_mut(&mut self, lane: Lane) -> &mut T {
        &mut self.0[lane.index()]
    }
}

// Serialised as a JSON object keyed by lane name.
impl<T: Serialize> Serialize for LaneMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::{Lane, LaneMap, LANE_COUNT};

    #[test]
    fn lane_names_round_trip_through_from_str() {
        for lane in Lane::ALL {
            assert_eq!(lane.name().parse::<Lane>().expect("known lane"), lane);
        }
        assert!("cowbell".parse::<Lane>().is_err());
    }

    #[test]
    fn serde_names_match_display_names() {
        for lane in Lane::ALL {
            let json = serde_json::to_value(lane).expect("serialise");
            assert_eq!(json, lane.name());
            assert_eq!(serde_json::from_value::<Lane>(json).expect("deserialise"), lane);
        }
        assert!(serde_json::from_str::<Lane>("\"Kick\"").is_err());
    }

    #[test]
    fn lane_indices_follow_declaration_order() {
        for (i, lane) in Lane::ALL.into_iter().enumerate() {
            assert_eq!(lane.index(), i);
        }
        assert_eq!(Lane::ALL.len(), LANE_COUNT);
    }

    #[test]
    fn lane_map_serialises_as_named_object() {
        let map = LaneMap::from_fn(|lane| lane == Lane::Snare);
        let json = serde_json::to_value(&map).expect("serialise");
        assert_eq!(json["snare"], true);
        assert_eq!(json["kick"], false);
        assert_eq!(json.as_object().map(|o| o.len()), Some(LANE_COUNT));
    }
}
