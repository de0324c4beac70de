//! Pad table and its real-time snapshot.
//!
//! The driver task owns the [`PadTable`]. The MIDI thread only ever sees
//! an immutable [`PadSnapshot`] published through an `ArcSwap`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::midi::{Pad, Push2Mapping};

pub const PAD_COUNT: usize = 64;

/// The 64 grid pads, addressable by device note and by the note they play.
#[derive(Debug, Clone)]
pub struct PadTable {
    /// Indexed by `address - 36`.
    pads: Vec<Pad>,
    /// Played note to the addresses of every pad that plays it.
    by_note: BTreeMap<u8, Vec<u8>>,
}

impl PadTable {
    pub fn new() -> Self {
        let mut pads = Vec::with_capacity(PAD_COUNT);
        for row in 0..8 {
            for col in 0..8 {
                pads.push(Pad::new(col, row));
            }
        }

        Self {
            pads,
            by_note: BTreeMap::new(),
        }
    }

    fn index(address: u8) -> Option<usize> {
        (Push2Mapping::PAD_FIRST..=Push2Mapping::PAD_LAST)
            .contains(&address)
            .then(|| (address - Push2Mapping::PAD_FIRST) as usize)
    }

    pub fn get(&self, address: u8) -> Option<&Pad> {
        Self::index(address).map(|i| &self.pads[i])
    }

    pub fn get_mut(&mut self, address: u8) -> Option<&mut Pad> {
        Self::index(address).map(|i| &mut self.pads[i])
    }

    pub fn at(&self, row: u8, col: u8) -> Option<&Pad> {
        (row < 8 && col < 8)
            .then(|| Push2Mapping::pad_note(row, col))
            .and_then(|address| self.get(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pad> {
        self.pads.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pad> {
        self.pads.iter_mut()
    }

    /// Addresses of every pad currently playing `note`.
    pub fn pads_for_note(&self, note: u8) -> &[u8] {
        self.by_note.get(&note).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Make the pad at `address` play `note`.
    pub fn assign(&mut self, address: u8, note: u8) {
        if let Some(pad) = self.get_mut(address) {
            pad.filtered = Some(note);
            self.by_note.entry(note).or_default().push(address);
        }
    }

    /// Forget every note assignment and darken all pads.
    pub fn reset(&mut self) {
        self.by_note.clear();
        for pad in &mut self.pads {
            pad.reset();
        }
    }

    pub fn snapshot(&self, octave_shift: i8, bypass: bool) -> PadSnapshot {
        let mut filtered = [-1i16; PAD_COUNT];
        for (slot, pad) in filtered.iter_mut().zip(&self.pads) {
            if let Some(note) = pad.filtered {
                *slot = note as i16;
            }
        }

        PadSnapshot {
            filtered,
            octave_shift,
            bypass,
        }
    }
}

impl Default for PadTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the pad table for the MIDI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadSnapshot {
    /// Played note per pad (`address - 36`), -1 when inactive.
    pub filtered: [i16; PAD_COUNT],
    pub octave_shift: i8,
    /// Pass nothing through the filter (cue context).
    pub bypass: bool,
}

impl PadSnapshot {
    pub fn inactive() -> Self {
        Self {
            filtered: [-1; PAD_COUNT],
            octave_shift: 0,
            bypass: false,
        }
    }

    /// Played note for a device address (-1 when inactive), `None` outside
    /// the grid.
    pub fn note_for(&self, address: u8) -> Option<i16> {
        PadTable::index(address).map(|i| self.filtered[i])
    }
}

impl Default for PadSnapshot {
    fn default() -> Self {
        Self::inactive()
    }
}

/// How many replaced snapshots the writer keeps alive.
const RETIRED_DEPTH: usize = 2;

/// Single writer for the shared snapshot.
///
/// Replaced snapshots are held here for two more publishes, so a reader
/// that loaded the old one never performs the final drop.
pub struct PadSnapshotWriter {
    shared: Arc<ArcSwap<PadSnapshot>>,
    retired: VecDeque<Arc<PadSnapshot>>,
}

impl PadSnapshotWriter {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ArcSwap::from_pointee(PadSnapshot::inactive())),
            retired: VecDeque::with_capacity(RETIRED_DEPTH + 1),
        }
    }

    /// Handle for readers.
    pub fn shared(&self) -> Arc<ArcSwap<PadSnapshot>> {
        self.shared.clone()
    }

    pub fn publish(&mut self, snapshot: PadSnapshot) {
        let old = self.shared.swap(Arc::new(snapshot));
        self.retired.push_back(old);
        while self.retired.len() > RETIRED_DEPTH {
            self.retired.pop_front();
        }
    }

    pub fn current(&self) -> Arc<PadSnapshot> {
        self.shared.load_full()
    }
}

impl Default for PadSnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_pad_per_address() {
        let table = PadTable::new();
        assert_eq!(table.iter().count(), PAD_COUNT);
        for (i, pad) in table.iter().enumerate() {
            assert_eq!(pad.address() as usize, 36 + i);
            assert_eq!(pad.address(), Push2Mapping::pad_note(pad.y, pad.x));
        }
        assert!(table.get(35).is_none());
        assert!(table.get(100).is_none());
        assert_eq!(table.at(7, 7).unwrap().address(), 99);
    }

    #[test]
    fn test_assign_and_reset() {
        let mut table = PadTable::new();
        table.assign(36, 60);
        table.assign(41, 60);
        table.assign(37, 62);

        assert_eq!(table.pads_for_note(60), &[36, 41]);
        assert_eq!(table.get(37).unwrap().filtered, Some(62));

        let snap = table.snapshot(1, false);
        assert_eq!(snap.note_for(36), Some(60));
        assert_eq!(snap.note_for(38), Some(-1));
        assert_eq!(snap.note_for(12), None);

        table.reset();
        assert!(table.pads_for_note(60).is_empty());
        assert!(table.iter().all(|p| p.filtered.is_none()));
    }

    #[test]
    fn test_writer_keeps_two_retired() {
        let mut writer = PadSnapshotWriter::new();
        let reader = writer.shared();

        let first = reader.load_full();
        writer.publish(PadSnapshot {
            octave_shift: 1,
            ..PadSnapshot::inactive()
        });
        // Reader's old copy, the writer's retired copy.
        assert_eq!(Arc::strong_count(&first), 2);

        drop(first);
        writer.publish(PadSnapshot::inactive());
        writer.publish(PadSnapshot::inactive());
        assert_eq!(writer.retired.len(), 2);
        assert_eq!(writer.current().octave_shift, 0);
        assert_eq!(reader.load().octave_shift, 0);
    }
}
