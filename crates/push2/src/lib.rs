//! Ableton Push 2 control surface driver.
//!
//! The Push 2 is driven over MIDI, with the USB handle held while the
//! device is in use:
//! - **MIDI**: pads, encoders, buttons, touch strip, LED feedback and the
//!   sysex palette/configuration commands.
//! - **USB**: vendor ID 0x2982, product ID 0x1967.
//!
//! # Pad Layout
//!
//! The 8x8 pad grid (notes 36-99, bottom-left to top-right) plays the
//! current scale. Each pad's note is picked by root, mode, row interval
//! and origin, and pad presses are re-emitted with those notes on the
//! "Push 2 Pads" port by the real-time [`PadFilter`].
//!
//! # Architecture
//!
//! [`Push2Module`] is an [`padbridge_core::AsyncModule`]. Its task owns
//! the [`Surface`] and handles one event at a time: host events, raw MIDI
//! input, session notifications, long-press timers, the frame timer and
//! the hot-plug scan.

mod bridge;
pub mod device;
mod error;
mod filter;
pub mod midi;
mod module;
mod pads;
mod palette;
mod router;
pub mod scale;
mod state;
mod surface;

pub use device::{ConnectionState, DeviceManager, DeviceState, MidiTransport, UsbAccess};
pub use error::DeviceError;
pub use filter::PadFilter;
pub use module::{Bundle, Push2Module, ShadowReceiver};
pub use pads::{PadSnapshot, PAD_COUNT};
pub use palette::ColorPalette;
pub use router::LONG_PRESS_MS;
pub use scale::{MusicalMode, NoteGridOrigin, PadLayout, PadNoteKind, RowInterval, ScaleConfig};
pub use state::{PortState, SurfaceState};
pub use surface::{Context, Effect, Modifiers, Surface, SHADOW_PORT_NAME};
