//! Push 2 MIDI mapping.
//!
//! Every button reports through a controller number; pads, encoder touches
//! and the touch strip report through note numbers.
//!
//! # Pad Layout (8x8 grid, notes 36-99)
//!
//! ```text
//! Row 7 (92-99)   top of the grid
//! ...
//! Row 0 (36-43)   bottom of the grid, nearest the player
//! ```

/// Stable identity of a physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ButtonId {
    TapTempo,
    Metronome,
    Upper1,
    Upper2,
    Upper3,
    Upper4,
    Upper5,
    Upper6,
    Upper7,
    Upper8,
    Setup,
    User,
    Delete,
    AddDevice,
    Device,
    Mix,
    Undo,
    AddTrack,
    Browse,
    Clip,
    Mute,
    Solo,
    Stop,
    Lower1,
    Lower2,
    Lower3,
    Lower4,
    Lower5,
    Lower6,
    Lower7,
    Lower8,
    Master,
    Convert,
    DoubleLoop,
    Quantize,
    Duplicate,
    New,
    FixedLength,
    Automate,
    RecordEnable,
    Play,
    Fwd32ndT,
    Fwd32nd,
    Fwd16thT,
    Fwd16th,
    Fwd8thT,
    Fwd8th,
    Fwd4trT,
    Fwd4tr,
    Up,
    Right,
    Down,
    Left,
    Repeat,
    Accent,
    Scale,
    Layout,
    Note,
    Session,
    OctaveUp,
    PageRight,
    OctaveDown,
    PageLeft,
    Shift,
    Select,
}

/// Push 2 MIDI mapping constants and translation.
pub struct Push2Mapping;

impl Push2Mapping {
    // === Pad Notes ===
    pub const PAD_FIRST: u8 = 36;
    pub const PAD_LAST: u8 = 99;

    // === Encoder touch notes ===
    /// Strip encoders 1-8 touch on notes 0-7.
    pub const STRIP_TOUCH_LAST: u8 = 7;
    pub const MASTER_TOUCH: u8 = 8;
    pub const METRONOME_TOUCH: u8 = 9;
    pub const TEMPO_TOUCH: u8 = 10;
    /// First note number that can come from a pad rather than an encoder.
    pub const FIRST_NON_ENCODER_NOTE: u8 = 11;

    /// Touch strip touch is reported as a note.
    pub const TOUCH_STRIP: u8 = 12;

    // === Encoders (CC) ===
    pub const ENCODER_1: u8 = 71;
    pub const ENCODER_8: u8 = 78;
    pub const TEMPO_ENCODER: u8 = 14;
    pub const METRONOME_ENCODER: u8 = 15;
    pub const MASTER_ENCODER: u8 = 79;

    /// Hardware address of pad (`row`, `col`).
    pub const fn pad_note(row: u8, col: u8) -> u8 {
        Self::PAD_FIRST + row * 8 + col
    }

    /// Controller number each button reports on.
    pub const BUTTONS: [(ButtonId, u8); 65] = [
        (ButtonId::TapTempo, 3),
        (ButtonId::Metronome, 9),
        (ButtonId::Upper1, 102),
        (ButtonId::Upper2, 103),
        (ButtonId::Upper3, 104),
        (ButtonId::Upper4, 105),
        (ButtonId::Upper5, 106),
        (ButtonId::Upper6, 107),
        (ButtonId::Upper7, 108),
        (ButtonId::Upper8, 109),
        (ButtonId::Setup, 30),
        (ButtonId::User, 59),
        (ButtonId::Delete, 118),
        (ButtonId::AddDevice, 52),
        (ButtonId::Device, 110),
        (ButtonId::Mix, 112),
        (ButtonId::Undo, 119),
        (ButtonId::AddTrack, 53),
        (ButtonId::Browse, 111),
        (ButtonId::Clip, 113),
        (ButtonId::Mute, 60),
        (ButtonId::Solo, 61),
        (ButtonId::Stop, 29),
        (ButtonId::Lower1, 20),
        (ButtonId::Lower2, 21),
        (ButtonId::Lower3, 22),
        (ButtonId::Lower4, 23),
        (ButtonId::Lower5, 24),
        (ButtonId::Lower6, 25),
        (ButtonId::Lower7, 26),
        (ButtonId::Lower8, 27),
        (ButtonId::Master, 28),
        (ButtonId::Convert, 35),
        (ButtonId::DoubleLoop, 117),
        (ButtonId::Quantize, 116),
        (ButtonId::Duplicate, 88),
        (ButtonId::New, 87),
        (ButtonId::FixedLength, 90),
        (ButtonId::Automate, 89),
        (ButtonId::RecordEnable, 86),
        (ButtonId::Play, 85),
        (ButtonId::Fwd32ndT, 43),
        (ButtonId::Fwd32nd, 42),
        (ButtonId::Fwd16thT, 41),
        (ButtonId::Fwd16th, 40),
        (ButtonId::Fwd8thT, 39),
        (ButtonId::Fwd8th, 38),
        (ButtonId::Fwd4trT, 37),
        (ButtonId::Fwd4tr, 36),
        (ButtonId::Up, 46),
        (ButtonId::Right, 45),
        (ButtonId::Down, 47),
        (ButtonId::Left, 44),
        (ButtonId::Repeat, 56),
        (ButtonId::Accent, 57),
        (ButtonId::Scale, 58),
        (ButtonId::Layout, 31),
        (ButtonId::Note, 50),
        (ButtonId::Session, 51),
        (ButtonId::OctaveUp, 55),
        (ButtonId::PageRight, 63),
        (ButtonId::OctaveDown, 54),
        (ButtonId::PageLeft, 62),
        (ButtonId::Shift, 49),
        (ButtonId::Select, 48),
    ];

    pub const UPPER: [ButtonId; 8] = [
        ButtonId::Upper1,
        ButtonId::Upper2,
        ButtonId::Upper3,
        ButtonId::Upper4,
        ButtonId::Upper5,
        ButtonId::Upper6,
        ButtonId::Upper7,
        ButtonId::Upper8,
    ];

    pub const LOWER: [ButtonId; 8] = [
        ButtonId::Lower1,
        ButtonId::Lower2,
        ButtonId::Lower3,
        ButtonId::Lower4,
        ButtonId::Lower5,
        ButtonId::Lower6,
        ButtonId::Lower7,
        ButtonId::Lower8,
    ];

    /// Buttons lit white at startup because they do something.
    pub const LIT_AT_STARTUP: [ButtonId; 30] = [
        ButtonId::Mute,
        ButtonId::Solo,
        ButtonId::Master,
        ButtonId::Up,
        ButtonId::Right,
        ButtonId::Left,
        ButtonId::Down,
        ButtonId::Note,
        ButtonId::Session,
        ButtonId::Mix,
        ButtonId::AddTrack,
        ButtonId::Delete,
        ButtonId::Undo,
        ButtonId::Metronome,
        ButtonId::Shift,
        ButtonId::Select,
        ButtonId::Play,
        ButtonId::RecordEnable,
        ButtonId::Automate,
        ButtonId::Repeat,
        ButtonId::Quantize,
        ButtonId::Duplicate,
        ButtonId::Browse,
        ButtonId::PageRight,
        ButtonId::PageLeft,
        ButtonId::OctaveUp,
        ButtonId::OctaveDown,
        ButtonId::Layout,
        ButtonId::Scale,
        ButtonId::Stop,
    ];

    /// Buttons explicitly dark at startup. Applied after `LIT_AT_STARTUP`,
    /// so Note ends up dark.
    pub const DARK_AT_STARTUP: [ButtonId; 17] = [
        ButtonId::TapTempo,
        ButtonId::Setup,
        ButtonId::User,
        ButtonId::Convert,
        ButtonId::New,
        ButtonId::FixedLength,
        ButtonId::Clip,
        ButtonId::Fwd32ndT,
        ButtonId::Fwd32nd,
        ButtonId::Fwd16thT,
        ButtonId::Fwd16th,
        ButtonId::Fwd8thT,
        ButtonId::Fwd8th,
        ButtonId::Fwd4trT,
        ButtonId::Fwd4tr,
        ButtonId::Accent,
        ButtonId::Note,
    ];

    /// Every `ButtonId` has a row in [`Self::BUTTONS`].
    pub fn button_cc(id: ButtonId) -> u8 {
        let cc = Self::BUTTONS
            .iter()
            .find(|(b, _)| *b == id)
            .map(|(_, cc)| *cc);
        debug_assert!(cc.is_some(), "{:?} has no controller number", id);
        cc.unwrap_or_default()
    }

    pub fn button_for_cc(cc: u8) -> Option<ButtonId> {
        Self::BUTTONS
            .iter()
            .find(|(_, c)| *c == cc)
            .map(|(b, _)| *b)
    }

    /// Which non-strip encoder a controller number belongs to: 0 tempo,
    /// 1 metronome gain, 2 master gain.
    pub fn other_encoder(cc: u8) -> Option<u8> {
        match cc {
            Self::TEMPO_ENCODER => Some(0),
            Self::METRONOME_ENCODER => Some(1),
            Self::MASTER_ENCODER => Some(2),
            _ => None,
        }
    }

    /// Which non-strip encoder a touch note belongs to.
    pub fn other_encoder_touch(note: u8) -> Option<u8> {
        match note {
            Self::TEMPO_TOUCH => Some(0),
            Self::METRONOME_TOUCH => Some(1),
            Self::MASTER_TOUCH => Some(2),
            _ => None,
        }
    }

    /// Decode a relative encoder value: 1..=63 clockwise, 64..=127
    /// counter-clockwise (two's complement in 7 bits).
    pub fn encoder_delta(value: u8) -> i8 {
        if value > 63 {
            -((128 - value as i16) as i8)
        } else {
            value as i8
        }
    }

    /// Get the Push 2 device name for MIDI port matching.
    pub fn device_name() -> &'static str {
        "Ableton Push 2"
    }
}
