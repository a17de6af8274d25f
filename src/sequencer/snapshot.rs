// Flat, JSON-friendly view of the live state. Writing is strict; reading is
// a patch where every field may be missing or partly wrong.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::lane::{Lane, LaneMap};
use super::pattern::{Pattern, Row, STEPS};
use super::scale::MinorKey;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub pattern: Pattern,
    pub active: LaneMap<bool>,
    pub bpm: f64,
    pub swing: f64,
    pub minor_key: MinorKey,
    pub reverb_wet: f32,
    pub delay_wet: f32,
    pub volumes: LaneMap<f32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPatch {
    pub pattern: Option<HashMap<String, Vec<bool>>>,
    pub active: Option<HashMap<String, bool>>,
    pub bpm: Option<f64>,
    pub swing: Option<f64>,
    pub minor_key: Option<String>,
    pub reverb_wet: Option<f32>,
    pub delay_wet: Option<f32>,
    pub volumes: Option<HashMap<String, f32>>,
}

fn known_lanes<'a, T>(
    field: &'static str,
    map: Option<&'a HashMap<String, T>>,
) -> impl Iterator<Item = (Lane, &'a T)> + 'a {
    map.into_iter().flatten().filter_map(move |(name, value)| match name.parse::<Lane>() {
        Ok(lane) => Some((lane, value)),
        Err(_) => {
            log::warn!("snapshot {field}: dropping unknown lane '{name}'");
            None
        }
    })
}

impl SnapshotPatch {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rows of exactly `STEPS` cells for known lanes.
    pub fn rows(&self) -> Vec<(Lane, Row)> {
        known_lanes("pattern", self.pattern.as_ref())
            .filter_map(|(lane, cells)| match <Row>::try_from(cells.as_slice()) {
                Ok(row) => Some((lane, row)),
                Err(_) => {
                    log::warn!(
                        "snapshot pattern: {lane} has {} steps, expected {STEPS}; dropped",
                        cells.len()
                    );
                    None
                }
            })
            .collect()
    }

    pub fn active_flags(&self) -> Vec<(Lane, bool)> {
        known_lanes("active", self.active.as_ref())
            .map(|(lane, on)| (lane, *on))
            .collect()
    }

    /// Unclamped; the store clamps on write.
    pub fn volume_levels(&self) -> Vec<(Lane, f32)> {
        known_lanes("volumes", self.volumes.as_ref())
            .map(|(lane, db)| (lane, *db))
            .collect()
    }

    pub fn key(&self) -> Option<MinorKey> {
        let name = self.minor_key.as_deref()?;
        match name.parse() {
            Ok(key) => Some(key),
            Err(err) => {
                log::warn!("snapshot minorKey: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SnapshotPatch;
    use crate::sequencer::lane::Lane;
    use crate::sequencer::pattern::row;
    use crate::sequencer::scale::MinorKey;

    #[test]
    fn empty_object_is_an_empty_patch() {
        let patch = SnapshotPatch::from_json("{}").expect("parse");
        assert!(patch.rows().is_empty());
        assert!(patch.bpm.is_none());
        assert!(patch.key().is_none());
    }

    #[test]
    fn bad_rows_and_unknown_lanes_are_dropped() {
        let json = r#"{
            "pattern": {
                "kick": [true,false,false,false,true,false,false,false,true,false,false,false,true,false,false,false],
                "snare": [true, false],
                "cowbell": [true,true,true,true,true,true,true,true,true,true,true,true,true,true,true,true]
            },
            "active": { "vox": true, "theremin": false },
            "minorKey": "E"
        }"#;
        let patch = SnapshotPatch::from_json(json).expect("parse");
        assert_eq!(patch.rows(), vec![(Lane::Kick, row(&[0, 4, 8, 12]))]);
        assert_eq!(patch.active_flags(), vec![(Lane::Vox, true)]);
        assert!(patch.key().is_none());
    }

    #[test]
    fn camel_case_fields_are_read() {
        let json = r#"{ "minorKey": "A#", "reverbWet": 0.5, "delayWet": 0.1, "volumes": { "bass": -3 } }"#;
        let patch = SnapshotPatch::from_json(json).expect("parse");
        assert_eq!(patch.key(), Some(MinorKey::ASharp));
        assert_eq!(patch.reverb_wet, Some(0.5));
        assert_eq!(patch.volume_levels(), vec![(Lane::Bass, -3.0)]);
    }
}
