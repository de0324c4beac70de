use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Unique identifier for each module type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Push2,
}

/// Pressure reporting mode of a pad surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureMode {
    AfterTouch,
    PolyPressure,
}

/// Direction reported by arrow and page buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    PageLeft,
    PageRight,
}

/// Events a surface raises for whatever presents its on-screen layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Both MIDI directions connected (`true`) or not.
    ConnectionChanged(bool),
    /// The surface switched layout context (by name).
    ContextChanged(&'static str),
    ScaleChanged,
    PressureModeChanged(PressureMode),
    /// Relative turn of strip encoder `index`.
    StripVpot { index: u8, delta: i8 },
    StripVpotTouch { index: u8, touching: bool },
    /// One of the buttons above (`upper`) or below the display.
    StripButton { upper: bool, index: u8 },
    PadPressed { x: u8, y: u8 },
    PadReleased { x: u8, y: u8 },
    Navigate(Direction),
}

/// Events that can be sent to modules
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// Activation toggle from the host's control-surface registry.
    SetActive(bool),
    /// Ports appeared or disappeared somewhere in the host engine.
    PortsChanged,
    /// Two named ports were connected or disconnected.
    PortConnectionChanged {
        port_a: String,
        port_b: String,
        connected: bool,
    },
    /// Emitted by a surface for the host side.
    Surface(SurfaceEvent),
    /// System events
    Shutdown,
}

/// Messages passed between modules and the module manager
#[derive(Debug)]
pub enum ModuleMessage {
    Event(ModuleEvent),
    Status(String),
    Error(String),
}

/// Trait that all async modules must implement
#[async_trait]
pub trait AsyncModule: Send + Sync {
    /// Get the unique identifier for this module
    fn id(&self) -> ModuleId;

    /// Initialize the module (called once at startup)
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Start the module's main loop. Returns once `ModuleEvent::Shutdown`
    /// arrives or the event channel closes.
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Shutdown the module gracefully
    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Get the module's status
    fn status(&self) -> HashMap<String, String>;
}
