//! Push 2 MIDI handling.
//!
//! Wire codec, control addresses and LED feedback state.

pub mod codec;
mod led_feedback;
mod mapping;

pub use led_feedback::{colors, Behavior, Button, Handler, Led, LedState, Pad, WhenPressed};
pub use mapping::{ButtonId, Push2Mapping};
