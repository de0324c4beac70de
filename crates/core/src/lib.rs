//! Host-facing interfaces shared by padbridge control surfaces.
//!
//! Surfaces are built as [`AsyncModule`]s and driven by a [`ModuleManager`],
//! which stands in for the host's control-surface registry. Everything a
//! surface needs from the host session arrives through the traits in
//! [`host`].

pub use color::Rgba;
pub use config::{PersistentState, StateError, StateFile, StateStore};
pub use host::{
    GainControl, HostError, MidiTrack, RecordStatus, Session, SessionNotification, Subscription,
    TrackId,
};
pub use midi::midi::MidiEvent;
pub use modules::{
    AsyncModule, Direction, ModuleEvent, ModuleId, ModuleManager, ModuleMessage, PressureMode,
    SurfaceEvent,
};

mod color;
mod config;
pub mod host;
mod midi;
mod modules;
