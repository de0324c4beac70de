//! Scale to pad-grid note mapping.
//!
//! A layout assigns a note (and how to show it) to each of the 64 pads,
//! given a root, a musical mode, a row tuning and whether the grid only
//! contains in-key notes. Generation is pure: the same configuration always
//! yields the same layout.

use serde::{Deserialize, Serialize};

/// Scales the pads can be laid out in. Values are semitone offsets from
/// the root within one octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MusicalMode {
    #[default]
    IonianMajor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    AeolianMinor,
    Locrian,
    HarmonicMinor,
    MelodicMinorAscending,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    WholeTone,
    Chromatic,
    NeapolitanMinor,
    NeapolitanMajor,
    DoubleHarmonic,
    HungarianMinor,
    Hirajoshi,
    Iwato,
    Kumoi,
    Spanish8Tone,
}

impl MusicalMode {
    pub const ALL: [MusicalMode; 22] = [
        MusicalMode::IonianMajor,
        MusicalMode::Dorian,
        MusicalMode::Phrygian,
        MusicalMode::Lydian,
        MusicalMode::Mixolydian,
        MusicalMode::AeolianMinor,
        MusicalMode::Locrian,
        MusicalMode::HarmonicMinor,
        MusicalMode::MelodicMinorAscending,
        MusicalMode::PentatonicMajor,
        MusicalMode::PentatonicMinor,
        MusicalMode::Blues,
        MusicalMode::WholeTone,
        MusicalMode::Chromatic,
        MusicalMode::NeapolitanMinor,
        MusicalMode::NeapolitanMajor,
        MusicalMode::DoubleHarmonic,
        MusicalMode::HungarianMinor,
        MusicalMode::Hirajoshi,
        MusicalMode::Iwato,
        MusicalMode::Kumoi,
        MusicalMode::Spanish8Tone,
    ];

    pub fn semitones(&self) -> &'static [u8] {
        match self {
            MusicalMode::IonianMajor => &[0, 2, 4, 5, 7, 9, 11],
            MusicalMode::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            MusicalMode::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            MusicalMode::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            MusicalMode::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            MusicalMode::AeolianMinor => &[0, 2, 3, 5, 7, 8, 10],
            MusicalMode::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            MusicalMode::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            MusicalMode::MelodicMinorAscending => &[0, 2, 3, 5, 7, 9, 11],
            MusicalMode::PentatonicMajor => &[0, 2, 4, 7, 9],
            MusicalMode::PentatonicMinor => &[0, 3, 5, 7, 10],
            MusicalMode::Blues => &[0, 3, 5, 6, 7, 10],
            MusicalMode::WholeTone => &[0, 2, 4, 6, 8, 10],
            MusicalMode::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            MusicalMode::NeapolitanMinor => &[0, 1, 3, 5, 7, 8, 11],
            MusicalMode::NeapolitanMajor => &[0, 1, 3, 5, 7, 9, 11],
            MusicalMode::DoubleHarmonic => &[0, 1, 4, 5, 7, 8, 11],
            MusicalMode::HungarianMinor => &[0, 2, 3, 6, 7, 8, 11],
            MusicalMode::Hirajoshi => &[0, 2, 3, 7, 8],
            MusicalMode::Iwato => &[0, 1, 5, 6, 10],
            MusicalMode::Kumoi => &[0, 2, 3, 7, 9],
            MusicalMode::Spanish8Tone => &[0, 1, 3, 4, 5, 6, 8, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MusicalMode::IonianMajor => "Major (Ionian)",
            MusicalMode::Dorian => "Dorian",
            MusicalMode::Phrygian => "Phrygian",
            MusicalMode::Lydian => "Lydian",
            MusicalMode::Mixolydian => "Mixolydian",
            MusicalMode::AeolianMinor => "Minor (Aeolian)",
            MusicalMode::Locrian => "Locrian",
            MusicalMode::HarmonicMinor => "Harmonic Minor",
            MusicalMode::MelodicMinorAscending => "Melodic Minor",
            MusicalMode::PentatonicMajor => "Pentatonic Major",
            MusicalMode::PentatonicMinor => "Pentatonic Minor",
            MusicalMode::Blues => "Blues",
            MusicalMode::WholeTone => "Whole Tone",
            MusicalMode::Chromatic => "Chromatic",
            MusicalMode::NeapolitanMinor => "Neapolitan Minor",
            MusicalMode::NeapolitanMajor => "Neapolitan Major",
            MusicalMode::DoubleHarmonic => "Double Harmonic",
            MusicalMode::HungarianMinor => "Hungarian Minor",
            MusicalMode::Hirajoshi => "Hirajoshi",
            MusicalMode::Iwato => "Iwato",
            MusicalMode::Kumoi => "Kumoi",
            MusicalMode::Spanish8Tone => "Spanish 8 Tone",
        }
    }
}

/// Where the bottom-left pad starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteGridOrigin {
    /// Bottom-left pad is always C2 (note 36), or the closest scale note.
    #[default]
    Fixed,
    /// Bottom-left pad is the scale root in the configured octave.
    Rooted,
}

/// Interval between vertically adjacent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowInterval {
    Third,
    #[default]
    Fourth,
    Fifth,
    /// Each row continues where the previous one ended.
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadNoteKind {
    RootNote,
    InScaleNote,
    OutOfScaleNote,
}

/// Everything a note layout is generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Pitch class of the root, 0 (C) to 11 (B).
    pub root: u8,
    pub octave: u8,
    pub mode: MusicalMode,
    pub origin: NoteGridOrigin,
    pub row_interval: RowInterval,
    pub in_key: bool,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            root: 0,
            octave: 3,
            mode: MusicalMode::IonianMajor,
            origin: NoteGridOrigin::Fixed,
            row_interval: RowInterval::Fourth,
            in_key: true,
        }
    }
}

pub fn row_interval_semitones(interval: RowInterval, in_key: bool) -> i32 {
    match interval {
        RowInterval::Third => 4,
        RowInterval::Fourth => 5,
        RowInterval::Fifth => 7,
        RowInterval::Sequential if in_key => 12,
        RowInterval::Sequential => 8,
    }
}

/// Whether `note` belongs to `mode` rooted at pitch class `root`, in any octave.
pub fn in_mode(note: u8, root: u8, mode: MusicalMode) -> bool {
    let offset = (note as i32 - root as i32).rem_euclid(12) as u8;
    mode.semitones().contains(&offset)
}

/// All MIDI notes in the mode, ascending.
pub fn mode_notes(root: u8, mode: MusicalMode) -> Vec<u8> {
    (0..=127u8).filter(|n| in_mode(*n, root, mode)).collect()
}

pub fn first_note(origin: NoteGridOrigin, root: u8, octave: u8) -> i32 {
    match origin {
        NoteGridOrigin::Fixed => 36,
        NoteGridOrigin::Rooted => root as i32 + 12 * octave as i32,
    }
}

/// A generated note assignment for the 8x8 grid, indexed `[row][col]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadLayout {
    cells: [[Option<(u8, PadNoteKind)>; 8]; 8],
}

impl PadLayout {
    fn empty() -> Self {
        Self {
            cells: [[None; 8]; 8],
        }
    }

    pub fn generate(cfg: &ScaleConfig) -> Self {
        if cfg.in_key {
            Self::in_key(cfg)
        } else {
            Self::chromatic(cfg)
        }
    }

    /// Only scale notes. Each row starts at the first scale note at or
    /// above its ideal tuning and walks consecutive scale notes.
    pub fn in_key(cfg: &ScaleConfig) -> Self {
        let notes = mode_notes(cfg.root, cfg.mode);
        let semitones = row_interval_semitones(cfg.row_interval, true);
        let first = first_note(cfg.origin, cfg.root, cfg.octave);
        let mut layout = Self::empty();

        for row in 0..8 {
            let ideal = first + semitones * row as i32;
            let start = notes.partition_point(|n| (*n as i32) < ideal);

            for (col, note) in notes[start..].iter().take(8).enumerate() {
                let kind = if note % 12 == cfg.root {
                    PadNoteKind::RootNote
                } else {
                    PadNoteKind::InScaleNote
                };
                layout.cells[row][col] = Some((*note, kind));
            }
        }

        layout
    }

    /// Every semitone, left to right. Notes outside the mode stay dark.
    pub fn chromatic(cfg: &ScaleConfig) -> Self {
        let semitones = row_interval_semitones(cfg.row_interval, false);
        let first = first_note(cfg.origin, cfg.root, cfg.octave);
        let mut layout = Self::empty();

        for row in 0..8 {
            let leftmost = first + semitones * row as i32;
            for col in 0..8 {
                let note = leftmost + col as i32;
                let Ok(note) = u8::try_from(note) else {
                    continue;
                };
                if note > 127 {
                    continue;
                }

                let kind = if !in_mode(note, cfg.root, cfg.mode) {
                    PadNoteKind::OutOfScaleNote
                } else if note % 12 == cfg.root {
                    PadNoteKind::RootNote
                } else {
                    PadNoteKind::InScaleNote
                };
                layout.cells[row][col] = Some((note, kind));
            }
        }

        layout
    }

    /// Drum layout: two 4x8 blocks, left block 36..67, right block 68..99,
    /// each filled bottom row first.
    pub fn percussion() -> Self {
        let mut layout = Self::empty();
        let mut note = 36u8;

        for half in [0..4usize, 4..8usize] {
            for row in 0..8 {
                for col in half.clone() {
                    layout.cells[row][col] = Some((note, PadNoteKind::InScaleNote));
                    note += 1;
                }
            }
        }

        layout
    }

    pub fn get(&self, row: usize, col: usize) -> Option<(u8, PadNoteKind)> {
        self.cells.get(row)?.get(col).copied().flatten()
    }

    /// Every assigned cell as `(row, col, note, kind)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, u8, PadNoteKind)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cols)| {
            cols.iter()
                .enumerate()
                .filter_map(move |(col, cell)| cell.map(|(note, kind)| (row, col, note, kind)))
        })
    }
}
