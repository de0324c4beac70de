//! Push 2 wire protocol.
//!
//! Channel messages use plain MIDI 1.0 byte encoding. Device configuration
//! travels in vendor sysex frames that all start with
//! `F0 00 21 1D 01 01 <opcode>`.

use padbridge_core::PressureMode;

/// Vendor sysex header (Ableton, Push 2).
pub const SYSEX_HEADER: [u8; 6] = [0xF0, 0x00, 0x21, 0x1D, 0x01, 0x01];

const SYSEX_END: u8 = 0xF7;

/// Shortest frame the device ever sends: header, opcode, end.
const MIN_SYSEX_LEN: usize = 8;

pub const OP_PALETTE_ENTRY: u8 = 0x03;
pub const OP_PALETTE_COMMIT: u8 = 0x05;
pub const OP_TOUCH_STRIP_CONFIG: u8 = 0x17;
pub const OP_SET_PRESSURE_MODE: u8 = 0x1E;
pub const OP_PRESSURE_MODE: u8 = 0x1F;

/// Touch strip configuration flags (byte 7 of the 0x17 frame).
pub mod touch_strip {
    pub const HOST_SENDS_LEDS: u8 = 1 << 0;
    pub const HOST_SENDS_SYSEX: u8 = 1 << 1;
    pub const VALUES_AS_MODWHEEL: u8 = 1 << 2;
    pub const SHOW_POINT: u8 = 1 << 3;
    pub const SHOW_BAR: u8 = 1 << 4;
    pub const AUTORETURN: u8 = 1 << 5;
    pub const AUTORETURN_TO_CENTER: u8 = 1 << 6;

    /// Bar display, springing back to the center.
    pub const DEFAULT: u8 = SHOW_BAR | AUTORETURN | AUTORETURN_TO_CENTER;
}

/// A decoded message from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    Controller { number: u8, value: u8 },
    /// 14-bit value, 0x2000 is center.
    PitchBend { value: u16 },
    /// Complete frame, `F0` through `F7`.
    Sysex { payload: Vec<u8> },
}

/// Something the device reported about itself in a sysex reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceReport {
    PressureMode(PressureMode),
}

/// Decode one complete message. Channel nibbles are ignored. Malformed
/// data, unsupported message types and foreign sysex yield `None`.
pub fn decode(bytes: &[u8]) -> Option<Event> {
    let status = *bytes.first()?;

    if status == 0xF0 {
        if bytes.len() < MIN_SYSEX_LEN || bytes[..SYSEX_HEADER.len()] != SYSEX_HEADER {
            return None;
        }
        return Some(Event::Sysex {
            payload: bytes.to_vec(),
        });
    }

    if bytes.len() < 3 {
        return None;
    }
    let (a, b) = (bytes[1] & 0x7F, bytes[2] & 0x7F);

    match status & 0xF0 {
        0x90 => Some(Event::NoteOn {
            note: a,
            velocity: b,
        }),
        0x80 => Some(Event::NoteOff {
            note: a,
            velocity: b,
        }),
        0xB0 => Some(Event::Controller {
            number: a,
            value: b,
        }),
        0xE0 => Some(Event::PitchBend {
            value: ((b as u16) << 7) | a as u16,
        }),
        _ => None,
    }
}

/// Encode an event on channel 1.
pub fn encode(event: &Event) -> Vec<u8> {
    match *event {
        Event::NoteOn { note, velocity } => vec![0x90, note & 0x7F, velocity & 0x7F],
        Event::NoteOff { note, velocity } => vec![0x80, note & 0x7F, velocity & 0x7F],
        Event::Controller { number, value } => vec![0xB0, number & 0x7F, value & 0x7F],
        Event::PitchBend { value } => {
            vec![0xE0, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
        }
        Event::Sysex { ref payload } => payload.clone(),
    }
}

/// Interpret a vendor sysex frame by its sub-opcode.
pub fn parse_sysex(payload: &[u8]) -> Option<DeviceReport> {
    if payload.len() < MIN_SYSEX_LEN || payload[..SYSEX_HEADER.len()] != SYSEX_HEADER {
        return None;
    }

    match payload[6] {
        OP_PRESSURE_MODE => {
            let mode = if payload[7] == 0x00 {
                PressureMode::AfterTouch
            } else {
                PressureMode::PolyPressure
            };
            Some(DeviceReport::PressureMode(mode))
        }
        _ => None,
    }
}

fn vendor_frame(opcode: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(SYSEX_HEADER.len() + body.len() + 2);
    frame.extend_from_slice(&SYSEX_HEADER);
    frame.push(opcode);
    frame.extend_from_slice(body);
    frame.push(SYSEX_END);
    frame
}

/// Split an 8-bit component into (low 7 bits, high bit).
fn split7(v: u8) -> [u8; 2] {
    [v & 0x7F, (v >> 7) & 0x01]
}

/// Set palette slot `index` (17 bytes).
pub fn palette_entry(index: u8, r: u8, g: u8, b: u8, w: u8) -> Vec<u8> {
    let mut body = Vec::with_capacity(9);
    body.push(index & 0x7F);
    for component in [r, g, b, w] {
        body.extend_from_slice(&split7(component));
    }
    vendor_frame(OP_PALETTE_ENTRY, &body)
}

/// Make the device re-read its palette (8 bytes).
pub fn palette_commit() -> Vec<u8> {
    vendor_frame(OP_PALETTE_COMMIT, &[])
}

/// Configure touch strip behavior (9 bytes).
pub fn touch_strip_config(flags: u8) -> Vec<u8> {
    vendor_frame(OP_TOUCH_STRIP_CONFIG, &[flags & 0x7F])
}

/// Select after-touch or poly-pressure reporting (9 bytes).
pub fn set_pressure_mode(mode: PressureMode) -> Vec<u8> {
    let value = match mode {
        PressureMode::AfterTouch => 0x00,
        PressureMode::PolyPressure => 0x01,
    };
    vendor_frame(OP_SET_PRESSURE_MODE, &[value])
}

/// Ask the device which pressure mode it is in (8 bytes).
pub fn request_pressure_mode() -> Vec<u8> {
    vendor_frame(OP_PRESSURE_MODE, &[])
}

/// Incremental parser for a raw input byte stream.
///
/// A single port read can carry several messages, use running status, or
/// split a sysex frame, so bytes are fed as they arrive and complete
/// events are handed to the callback in order.
#[derive(Debug, Default)]
pub struct MidiParser {
    running_status: Option<u8>,
    pending: Vec<u8>,
    sysex: Option<Vec<u8>>,
}

impl MidiParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8], mut on_event: impl FnMut(Event)) {
        for &byte in bytes {
            // Real-time bytes may appear anywhere, even inside sysex.
            if byte >= 0xF8 {
                continue;
            }

            match byte {
                0xF0 => {
                    self.running_status = None;
                    self.pending.clear();
                    self.sysex = Some(vec![0xF0]);
                }
                SYSEX_END => {
                    if let Some(mut frame) = self.sysex.take() {
                        frame.push(SYSEX_END);
                        match decode(&frame) {
                            Some(event) => on_event(event),
                            None => tracing::trace!("Dropping {} byte foreign sysex", frame.len()),
                        }
                    }
                }
                0x80..=0xEF => {
                    self.sysex = None;
                    self.running_status = Some(byte);
                    self.pending.clear();
                    self.pending.push(byte);
                }
                0xF1..=0xF6 => {
                    // System common: not used by the device, and it
                    // cancels running status.
                    self.sysex = None;
                    self.running_status = None;
                    self.pending.clear();
                }
                _ => {
                    if let Some(frame) = self.sysex.as_mut() {
                        frame.push(byte);
                        continue;
                    }

                    let Some(status) = self.running_status else {
                        continue;
                    };

                    if self.pending.is_empty() {
                        self.pending.push(status);
                    }
                    self.pending.push(byte);

                    let expected = match status & 0xF0 {
                        0xC0 | 0xD0 => 2,
                        _ => 3,
                    };

                    if self.pending.len() == expected {
                        if let Some(event) = decode(&self.pending) {
                            on_event(event);
                        }
                        self.pending.clear();
                    }
                }
            }
        }
    }
}
