//! Real-time pad note filter.
//!
//! Runs on the MIDI input thread: translates pad notes into the notes the
//! current layout assigns them and forwards them to the shadow port.
//! Never blocks and never allocates.

use std::sync::Arc;

use arc_swap::ArcSwap;
use padbridge_core::MidiEvent;
use ringbuf::traits::Producer;

use crate::midi::Push2Mapping;
use crate::pads::PadSnapshot;

/// Cheap cloneable handle onto the published pad snapshot.
#[derive(Clone)]
pub struct PadFilter {
    snapshot: Arc<ArcSwap<PadSnapshot>>,
}

impl PadFilter {
    pub fn new(snapshot: Arc<ArcSwap<PadSnapshot>>) -> Self {
        Self { snapshot }
    }

    /// Filter `input` into `out`. Returns whether any event was a pad note,
    /// which tells the caller to keep those events off the regular input
    /// path. Events that do not fit into `out` are dropped.
    pub fn process<P>(&self, input: &[MidiEvent], out: &mut P) -> bool
    where
        P: Producer<Item = MidiEvent>,
    {
        let snapshot = self.snapshot.load();

        if snapshot.bypass {
            return false;
        }

        let mut matched = false;

        for event in input {
            if event.is_note_on() || event.is_note_off() {
                let address = event.note();

                // Encoder touches use 0..=10, the touch strip uses 12.
                if address < Push2Mapping::FIRST_NON_ENCODER_NOTE
                    || address == Push2Mapping::TOUCH_STRIP
                {
                    continue;
                }

                match snapshot.note_for(address) {
                    Some(note) if note >= 0 => {
                        let shifted = note + 12 * snapshot.octave_shift as i16;
                        if (0..=127).contains(&shifted) {
                            let _ = out.try_push(event.with_note(shifted as u8));
                        }
                    }
                    // Inactive pad.
                    Some(_) => {}
                    None => {
                        let _ = out.try_push(*event);
                    }
                }

                matched = true;
            } else if event.is_pitch_bender()
                || event.is_poly_pressure()
                || event.is_channel_pressure()
            {
                let _ = out.try_push(*event);
            }
        }

        matched
    }
}
