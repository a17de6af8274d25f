use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A MIDI note number. C4 = 60, A4 = 69 = 440 Hz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note(pub u8);

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl Note {
    pub fn transpose(self, semitones: i8) -> Note {
        Note((i16::from(self.0) + i16::from(semitones)).clamp(0, 127) as u8)
    }

    pub fn frequency(self) -> f32 {
        440.0 * 2.0_f32.powf((f32::from(self.0) - 69.0) / 12.0)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = i16::from(self.0) / 12 - 1;
        write!(f, "{}{}", NOTE_NAMES[usize::from(self.0 % 12)], octave)
    }
}

/// The five supported minor-key roots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinorKey {
    #[default]
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "A#")]
    ASharp,
}

impl MinorKey {
    pub const ALL: [MinorKey; 5] = [
        MinorKey::C,
        MinorKey::DSharp,
        MinorKey::F,
        MinorKey::G,
        MinorKey::ASharp,
    ];

    /// Offset from C.
    pub fn semitones(self) -> i8 {
        match self {
            MinorKey::C => 0,
            MinorKey::DSharp => 3,
            MinorKey::F => 5,
            MinorKey::G => 7,
            MinorKey::ASharp => 10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MinorKey::C => "C",
            MinorKey::DSharp => "D#",
            MinorKey::F => "F",
            MinorKey::G => "G",
            MinorKey::ASharp => "A#",
        }
    }

    pub fn next(self) -> MinorKey {
        let i = MinorKey::ALL.iter().position(|k| *k == self).unwrap_or(0);
        MinorKey::ALL[(i + 1) % MinorKey::ALL.len()]
    }
}

impl FromStr for MinorKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MinorKey::ALL
            .into_iter()
            .find(|k| k.label() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown minor key '{s}'"))
    }
}

// C minor tables; everything else is a constant shift of these.
pub const BASS_SCALE: [Note; 8] = [
    Note(36), // C2
    Note(36), // C2
    Note(39), // D#2
    Note(41), // F2
    Note(43), // G2
    Note(46), // A#2
    Note(48), // C3
    Note(51), // D#3
];

pub const LEAD_SCALE: [Note; 8] = [
    Note(60), // C4
    Note(63), // D#4
    Note(65), // F4
    Note(67), // G4
    Note(70), // A#4
    Note(72), // C5
    Note(75), // D#5
    Note(77), // F5
];

// i - VI - VII - III
pub const PAD_CHORDS: [[Note; 3]; 4] = [
    [Note(48), Note(51), Note(55)], // C3 D#3 G3
    [Note(44), Note(48), Note(51)], // G#2 C3 D#3
    [Note(46), Note(50), Note(53)], // A#2 D3 F3
    [Note(51), Note(55), Note(58)], // D#3 G3 A#3
];

/// `index` wraps modulo the table length; step 9 on an 8-note table reads
/// degree 1.
pub fn degree_to_pitch(table: &[Note], key: MinorKey, index: usize) -> Note {
    assert!(!table.is_empty(), "empty scale table");
    table[index % table.len()].transpose(key.semitones())
}

pub fn chord(key: MinorKey, index: usize) -> [Note; 3] {
    PAD_CHORDS[index % PAD_CHORDS.len()].map(|n| n.transpose(key.semitones()))
}

#[cfg(test)]
mod tests {
    use super::{chord, degree_to_pitch, MinorKey, Note, BASS_SCALE, LEAD_SCALE};

    #[test]
    fn wraparound_matches_for_every_key() {
        for key in MinorKey::ALL {
            assert_eq!(
                degree_to_pitch(&BASS_SCALE, key, 9),
                degree_to_pitch(&BASS_SCALE, key, 1)
            );
            assert_eq!(
                degree_to_pitch(&LEAD_SCALE, key, 15),
                degree_to_pitch(&LEAD_SCALE, key, 7)
            );
        }
    }

    #[test]
    fn g_minor_shifts_bass_root_up_a_fifth() {
        let pitch = degree_to_pitch(&BASS_SCALE, MinorKey::G, 0);
        assert_eq!(pitch, BASS_SCALE[0].transpose(7));
        assert_eq!(pitch.to_string(), "G2");
    }

    #[test]
    fn chords_transpose_every_voice() {
        let c = chord(MinorKey::C, 0);
        let ds = chord(MinorKey::DSharp, 4);
        assert_eq!(c.map(|n| n.to_string()), ["C3", "D#3", "G3"]);
        assert_eq!(ds, c.map(|n| n.transpose(3)));
    }

    #[test]
    fn note_frequency_and_names() {
        assert!((Note(69).frequency() - 440.0).abs() < 1e-3);
        assert!((Note(57).frequency() - 220.0).abs() < 1e-3);
        assert_eq!(Note(60).to_string(), "C4");
        assert_eq!(Note(24).to_string(), "C1");
        assert_eq!(Note(127).transpose(12), Note(127));
    }

    #[test]
    fn key_labels_parse_and_cycle() {
        for key in MinorKey::ALL {
            assert_eq!(key.label().parse::<MinorKey>().expect("label"), key);
        }
        assert_eq!(MinorKey::ASharp.next(), MinorKey::C);
        assert_eq!(
            serde_json::to_string(&MinorKey::DSharp).expect("json"),
            "\"D#\""
        );
    }
}
