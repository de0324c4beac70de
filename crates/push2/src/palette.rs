//! Device color palette.
//!
//! The Push 2 colors pads and buttons through a 128-slot palette. Seven
//! slots hold fixed standard colors; the rest are handed out on demand
//! to whatever RGBA values the session asks for.

use std::collections::HashMap;

use padbridge_core::Rgba;

use crate::midi::codec;
use crate::midi::colors;

/// Highest index available for dynamic colors.
const LAST_FREE_INDEX: u8 = 121;
/// White level written with every dynamic entry.
const ENTRY_WHITE: u8 = 126;

/// Frames the device needs to learn a newly allocated color.
pub type PaletteFrames = [Vec<u8>; 2];

/// RGBA to palette index table with a free-slot pool.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    map: HashMap<Rgba, u8>,
    free: Vec<u8>,
}

impl ColorPalette {
    pub fn new() -> Self {
        let map = HashMap::from([
            (Rgba::rgb(0, 0, 0), colors::BLACK),
            (Rgba::rgb(204, 204, 204), colors::WHITE),
            (Rgba::rgb(64, 64, 64), colors::LIGHT_GRAY),
            (Rgba::rgb(20, 20, 20), colors::DARK_GRAY),
            (Rgba::rgb(0, 0, 255), colors::BLUE),
            (Rgba::rgb(0, 255, 0), colors::GREEN),
            (Rgba::rgb(255, 0, 0), colors::RED),
        ]);

        // Popped from the back, so 121 is handed out first.
        let free = (1..=LAST_FREE_INDEX).collect();

        Self { map, free }
    }

    /// Palette index for `color`. A color seen for the first time takes a
    /// free slot (or a random one once the pool is empty), and the frames
    /// that program the slot are returned alongside it.
    pub fn resolve(&mut self, color: Rgba) -> (u8, Option<PaletteFrames>) {
        if let Some(&index) = self.map.get(&color) {
            return (index, None);
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = rand::random_range(1..=LAST_FREE_INDEX);
                // The slot is being repurposed; forget its previous owner.
                self.map.retain(|_, v| *v != index);
                index
            }
        };

        tracing::debug!(
            "palette slot {} <- {:02x}{:02x}{:02x}",
            index,
            color.r,
            color.g,
            color.b
        );

        self.map.insert(color, index);

        let frames = [
            codec::palette_entry(index, color.r, color.g, color.b, ENTRY_WHITE),
            codec::palette_commit(),
        ];
        (index, Some(frames))
    }

    /// Number of slots still free for new colors.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::new()
    }
}
