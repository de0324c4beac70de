//! Host collaborators consumed by control surfaces.
//!
//! A surface never owns the session or mixer model. It talks to the host
//! through these traits and learns about state changes through a
//! [`Subscription`] it holds for as long as it wants notifications.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::Rgba;

pub type TrackId = u64;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("port {0} not found")]
    PortNotFound(String),

    #[error("host request failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Disabled,
    Enabled,
    Recording,
}

/// State-change notifications a session delivers to subscribers.
///
/// Notifications only say *what* changed. Receivers query the session for
/// the new value, so a late notification never carries stale state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    RecordStateChanged,
    TransportStateChanged,
    TransportLooped,
    /// A named configuration parameter changed (e.g. "clicking").
    ParameterChanged(String),
    SoloActiveChanged(bool),
    SelectionChanged,
    SelectedTrackColorChanged,
}

/// Automation-capable gain, addressed in normalized interface units.
pub trait GainControl: Send + Sync {
    fn interface_value(&self) -> f64;
    fn set_interface_value(&self, value: f64);

    fn lower(&self) -> f64 {
        0.0
    }

    fn upper(&self) -> f64 {
        1.0
    }

    /// Begin a touch gesture for automation recording at `when` (samples).
    fn start_touch(&self, when: u64);
    fn stop_touch(&self, when: u64);
}

/// A MIDI track whose first input port can be wired to a surface port.
pub trait MidiTrack: Send + Sync {
    fn id(&self) -> TrackId;
    fn color(&self) -> Rgba;
    fn connect_input(&self, port_name: &str) -> Result<(), HostError>;
    fn disconnect_input(&self, port_name: &str) -> Result<(), HostError>;
}

impl fmt::Debug for dyn MidiTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiTrack").field("id", &self.id()).finish()
    }
}

/// Session-level transport, mixer and selection model.
pub trait Session: Send + Sync {
    fn transport_rolling(&self) -> bool;
    fn transport_play(&self);
    fn transport_stop(&self);

    fn record_status(&self) -> RecordStatus;
    fn toggle_record_enable(&self);

    fn clicking(&self) -> bool;
    fn set_clicking(&self, yn: bool);

    fn undo(&self);
    fn redo(&self);

    fn toggle_selection_solo(&self);
    fn cancel_all_solo(&self);

    fn master_gain(&self) -> Option<Arc<dyn GainControl>>;
    fn click_gain(&self) -> Option<Arc<dyn GainControl>>;

    /// First MIDI track in the current selection, if any.
    fn selected_midi_track(&self) -> Option<Arc<dyn MidiTrack>>;

    /// Current audible position in samples.
    fn audible_sample(&self) -> u64;

    /// Start delivering notifications to `tx` until the returned handle is
    /// dropped.
    fn subscribe(&self, tx: mpsc::UnboundedSender<SessionNotification>) -> Subscription;
}

/// Handle for a registered notification sink.
///
/// Dropping the handle (or calling [`Subscription::release`]) runs the
/// host-supplied disconnect exactly once.
#[must_use = "dropping a Subscription disconnects it immediately"]
pub struct Subscription {
    disconnect: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(disconnect: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    /// A subscription with nothing to disconnect.
    pub fn detached() -> Self {
        Self { disconnect: None }
    }

    pub fn release(mut self) {
        self.run_disconnect();
    }

    fn run_disconnect(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_disconnect();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}
