use thiserror::Error;

/// Errors raised while acquiring or talking to the Push 2.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Push 2 device not found")]
    UsbNotFound,

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Failed to claim interface")]
    InterfaceClaim,

    #[error("MIDI init failed: {0}")]
    MidiInit(String),

    #[error("MIDI connect failed: {0}")]
    Connect(String),

    #[error("MIDI ports not registered")]
    PortsNotRegistered,

    #[error("MIDI output not connected")]
    OutputNotConnected,
}
