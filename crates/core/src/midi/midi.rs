/// A short (at most three byte) MIDI channel message as it travels through
/// the host's process-thread MIDI buffers.
///
/// `Copy` and fixed size, so buffers of these never allocate per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Sample offset within the current process cycle.
    pub time: u32,
    data: [u8; 3],
    len: u8,
}

impl MidiEvent {
    /// Build an event from raw bytes. Returns `None` for empty input or
    /// anything longer than a channel message (sysex never enters the
    /// process-thread path).
    pub fn new(time: u32, bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > 3 {
            return None;
        }
        let mut data = [0u8; 3];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            time,
            data,
            len: bytes.len() as u8,
        })
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            time: 0,
            data: [0x90 | (channel & 0x0f), note & 0x7f, velocity & 0x7f],
            len: 3,
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            time: 0,
            data: [0x80 | (channel & 0x0f), note & 0x7f, velocity & 0x7f],
            len: 3,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn status(&self) -> u8 {
        self.data[0] & 0xf0
    }

    pub fn channel(&self) -> u8 {
        self.data[0] & 0x0f
    }

    pub fn is_note_on(&self) -> bool {
        self.status() == 0x90 && self.len == 3
    }

    pub fn is_note_off(&self) -> bool {
        self.status() == 0x80 && self.len == 3
    }

    pub fn is_pitch_bender(&self) -> bool {
        self.status() == 0xe0
    }

    pub fn is_poly_pressure(&self) -> bool {
        self.status() == 0xa0
    }

    pub fn is_channel_pressure(&self) -> bool {
        self.status() == 0xd0
    }

    /// Note number of a note or poly-pressure message.
    pub fn note(&self) -> u8 {
        self.data[1]
    }

    pub fn velocity(&self) -> u8 {
        self.data[2]
    }

    /// A copy of this event with the note number replaced.
    pub fn with_note(&self, note: u8) -> Self {
        let mut event = *self;
        event.data[1] = note & 0x7f;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let on = MidiEvent::note_on(0, 60, 100);
        assert!(on.is_note_on());
        assert!(!on.is_note_off());
        assert_eq!(on.bytes(), &[0x90, 60, 100]);

        let bend = MidiEvent::new(0, &[0xe0, 0x00, 0x40]).unwrap();
        assert!(bend.is_pitch_bender());

        assert!(MidiEvent::new(0, &[]).is_none());
        assert!(MidiEvent::new(0, &[0xf0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_with_note_leaves_original() {
        let on = MidiEvent::note_on(2, 40, 90);
        let moved = on.with_note(64);
        assert_eq!(on.note(), 40);
        assert_eq!(moved.note(), 64);
        assert_eq!(moved.channel(), 2);
        assert_eq!(moved.velocity(), 90);
    }
}
