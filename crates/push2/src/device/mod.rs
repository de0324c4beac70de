//! Device connection management.
//!
//! The Push 2 is usable only when three independent resources line up:
//! our input port is connected to the device, our output port is
//! connected to the device, and the USB handle is held. [`DeviceManager`]
//! tracks all three and follows hot-plug changes.

mod input;
mod ports;
mod usb;

use std::time::Duration;

use tokio::time::Instant;

use crate::error::DeviceError;
use crate::state::PortState;

pub use input::{input_channel, InputSink, InputSource, INPUT_CAPACITY};
pub use ports::MidirTransport;
pub use usb::RusbDevice;

/// Name of the port receiving from the device.
pub const INPUT_PORT_NAME: &str = "Push 2 in";
/// Name of the port sending to the device.
pub const OUTPUT_PORT_NAME: &str = "Push 2 out";

/// Physical port names containing this are taken to be a Push 2.
pub const VENDOR_PORT_PATTERN: &str = "Ableton Push 2";

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_POLL: Duration = Duration::from_millis(500);

/// MIDI port plumbing towards the device.
pub trait MidiTransport: Send + Sync {
    /// Create the logical ports. Raw input bytes go to `input`.
    fn register(&self, input: InputSink) -> Result<(), DeviceError>;
    fn registered(&self) -> bool;

    /// Physical ports currently visible.
    fn input_ports(&self) -> Vec<String>;
    fn output_ports(&self) -> Vec<String>;

    fn connect_input(&self, port: &str) -> Result<(), DeviceError>;
    fn connect_output(&self, port: &str) -> Result<(), DeviceError>;
    fn disconnect_input(&self);
    fn disconnect_output(&self);

    /// Physical port each logical port is connected to.
    fn input_connection(&self) -> Option<String>;
    fn output_connection(&self) -> Option<String>;

    fn write(&self, bytes: &[u8]) -> Result<(), DeviceError>;

    /// Bytes queued but not yet delivered to the device.
    fn pending(&self) -> usize;

    /// Drop every connection and the logical ports.
    fn release(&self);
}

/// Exclusive handle on the device's USB interface.
pub trait UsbAccess: Send + Sync {
    /// Open and claim the device. Calling it again while held is a no-op.
    fn acquire(&mut self) -> Result<(), DeviceError>;
    fn release(&mut self);
    fn acquired(&self) -> bool;
}

/// Which of our logical ports are connected to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState(u8);

impl ConnectionState {
    pub const INPUT: ConnectionState = ConnectionState(1 << 0);
    pub const OUTPUT: ConnectionState = ConnectionState(1 << 1);
    pub const BOTH: ConnectionState = ConnectionState(Self::INPUT.0 | Self::OUTPUT.0);

    pub fn contains(&self, other: ConnectionState) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ConnectionState) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ConnectionState) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    PortsRegistered,
    InputLinked,
    OutputLinked,
    BothLinked,
    DeviceAcquired,
    InUse,
    Teardown,
}

/// A connection made or broken between a physical port and one of ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortChange {
    pub port_a: String,
    pub port_b: String,
    pub connected: bool,
}

pub struct DeviceManager {
    transport: Box<dyn MidiTransport>,
    usb: Box<dyn UsbAccess>,
    connection_state: ConnectionState,
    in_use: bool,
    torn_down: bool,
    saved_input: Vec<String>,
    saved_output: Vec<String>,
}

impl DeviceManager {
    pub fn new(transport: Box<dyn MidiTransport>, usb: Box<dyn UsbAccess>) -> Self {
        Self {
            transport,
            usb,
            connection_state: ConnectionState::default(),
            in_use: false,
            torn_down: false,
            saved_input: Vec::new(),
            saved_output: Vec::new(),
        }
    }

    pub fn state(&self) -> DeviceState {
        let both = self.connection_state.contains(ConnectionState::BOTH);

        if self.torn_down {
            DeviceState::Teardown
        } else if self.in_use {
            DeviceState::InUse
        } else if both && self.usb.acquired() {
            DeviceState::DeviceAcquired
        } else if both {
            DeviceState::BothLinked
        } else if self.connection_state.contains(ConnectionState::INPUT) {
            DeviceState::InputLinked
        } else if self.connection_state.contains(ConnectionState::OUTPUT) {
            DeviceState::OutputLinked
        } else if self.transport.registered() {
            DeviceState::PortsRegistered
        } else {
            DeviceState::Idle
        }
    }

    pub fn ports_register(&mut self, input: InputSink) -> Result<(), DeviceError> {
        if self.transport.registered() {
            return Ok(());
        }
        self.transport.register(input)?;
        tracing::info!(
            "Registered ports {} and {}",
            INPUT_PORT_NAME,
            OUTPUT_PORT_NAME
        );
        Ok(())
    }

    /// Which direction `name` is, if it is one of our logical ports.
    pub fn owns_port(name: &str) -> Option<ConnectionState> {
        match name {
            INPUT_PORT_NAME => Some(ConnectionState::INPUT),
            OUTPUT_PORT_NAME => Some(ConnectionState::OUTPUT),
            _ => None,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Record a connection change. Returns whether both directions are
    /// now connected.
    pub fn set_connected(&mut self, direction: ConnectionState, connected: bool) -> bool {
        if connected {
            self.connection_state.insert(direction);
        } else {
            self.connection_state.remove(direction);
        }
        self.connection_state.contains(ConnectionState::BOTH)
    }

    /// Look for the device among the physical ports and connect whatever
    /// direction is still unconnected. Returns the changes made so the
    /// caller can run them through its connection handling.
    pub fn port_registration_handler(&mut self) -> Vec<PortChange> {
        let mut changes = Vec::new();

        if self.torn_down || !self.transport.registered() {
            return changes;
        }

        let inputs = self.transport.input_ports();
        let outputs = self.transport.output_ports();

        // Unplugged since the last scan.
        if let Some(port) = self.transport.input_connection() {
            if !inputs.contains(&port) {
                tracing::info!("Push 2 input {} disappeared", port);
                self.transport.disconnect_input();
                changes.push(PortChange {
                    port_a: port,
                    port_b: INPUT_PORT_NAME.to_string(),
                    connected: false,
                });
            }
        }
        if let Some(port) = self.transport.output_connection() {
            if !outputs.contains(&port) {
                tracing::info!("Push 2 output {} disappeared", port);
                self.transport.disconnect_output();
                changes.push(PortChange {
                    port_a: port,
                    port_b: OUTPUT_PORT_NAME.to_string(),
                    connected: false,
                });
            }
        }

        let input_connected = self.transport.input_connection().is_some();
        let output_connected = self.transport.output_connection().is_some();
        if input_connected && output_connected {
            return changes;
        }

        if !input_connected {
            if let Some(port) = find_device_port(&inputs, &self.saved_input) {
                match self.transport.connect_input(&port) {
                    Ok(()) => {
                        tracing::debug!("Connected {} to {}", port, INPUT_PORT_NAME);
                        changes.push(PortChange {
                            port_a: port,
                            port_b: INPUT_PORT_NAME.to_string(),
                            connected: true,
                        });
                    }
                    Err(e) => tracing::warn!("Could not connect {}: {}", port, e),
                }
            }
        }

        if !output_connected {
            if let Some(port) = find_device_port(&outputs, &self.saved_output) {
                match self.transport.connect_output(&port) {
                    Ok(()) => {
                        tracing::debug!("Connected {} to {}", OUTPUT_PORT_NAME, port);
                        changes.push(PortChange {
                            port_a: port,
                            port_b: OUTPUT_PORT_NAME.to_string(),
                            connected: true,
                        });
                    }
                    Err(e) => tracing::warn!("Could not connect {}: {}", port, e),
                }
            }
        }

        changes
    }

    pub fn device_acquire(&mut self) -> Result<(), DeviceError> {
        self.usb.acquire()
    }

    pub fn device_release(&mut self) {
        self.usb.release();
    }

    pub fn device_acquired(&self) -> bool {
        self.usb.acquired()
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub fn set_in_use(&mut self, yn: bool) {
        self.in_use = yn;
    }

    /// Stop reacting to hot-plug scans and port events.
    pub fn begin_teardown(&mut self) {
        self.torn_down = true;
    }

    pub fn write(&self, bytes: &[u8]) -> Result<(), DeviceError> {
        if !self.connection_state.contains(ConnectionState::OUTPUT) {
            return Err(DeviceError::OutputNotConnected);
        }
        self.transport.write(bytes)
    }

    /// Let queued output reach the device, then drop every connection.
    pub async fn ports_release(&mut self) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;

        while self.transport.pending() > 0 {
            if Instant::now() >= deadline {
                tracing::warn!(
                    "Gave up draining Push 2 output with {} bytes queued",
                    self.transport.pending()
                );
                break;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }

        self.transport.release();
        self.connection_state = ConnectionState::default();
        tracing::info!("Released Push 2 ports");
    }

    /// Port state for persisting. Live connections win over saved ones.
    pub fn port_state(&self) -> (PortState, PortState) {
        let input = PortState {
            name: INPUT_PORT_NAME.to_string(),
            connections: self
                .transport
                .input_connection()
                .map(|port| vec![port])
                .unwrap_or_else(|| self.saved_input.clone()),
        };
        let output = PortState {
            name: OUTPUT_PORT_NAME.to_string(),
            connections: self
                .transport
                .output_connection()
                .map(|port| vec![port])
                .unwrap_or_else(|| self.saved_output.clone()),
        };
        (input, output)
    }

    /// Remember physical connections to try first on the next scan. The
    /// saved port names are ignored; ours never change.
    pub fn restore_port_state(&mut self, input: &PortState, output: &PortState) {
        self.saved_input = input.connections.clone();
        self.saved_output = output.connections.clone();
    }
}

/// Saved connections first, then anything that looks like a Push 2.
fn find_device_port(available: &[String], saved: &[String]) -> Option<String> {
    saved
        .iter()
        .find(|port| available.contains(port))
        .or_else(|| {
            available
                .iter()
                .find(|port| port.contains(VENDOR_PORT_PATTERN))
        })
        .cloned()
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::mock::{MockTransport, MockUsb, Wire};
    use super::*;

    const DEVICE_IN: &str = "Ableton Push 2 MIDI 1 in";
    const DEVICE_OUT: &str = "Ableton Push 2 MIDI 1 out";

    fn manager() -> (DeviceManager, Arc<Mutex<Wire>>, Arc<AtomicBool>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let present = Arc::new(AtomicBool::new(true));
        let manager = DeviceManager::new(
            Box::new(MockTransport::new(wire.clone())),
            Box::new(MockUsb::new(present.clone(), Arc::new(AtomicUsize::new(0)))),
        );
        (manager, wire, present)
    }

    fn plug_in(wire: &Arc<Mutex<Wire>>) {
        let mut wire = wire.lock();
        wire.inputs = vec!["Midi Through".to_string(), DEVICE_IN.to_string()];
        wire.outputs = vec!["Midi Through".to_string(), DEVICE_OUT.to_string()];
    }

    #[test]
    fn test_state_progression() {
        let (mut manager, wire, _) = manager();
        assert_eq!(manager.state(), DeviceState::Idle);

        let (sink, _source) = input_channel(INPUT_CAPACITY);
        manager.ports_register(sink).unwrap();
        assert_eq!(manager.state(), DeviceState::PortsRegistered);

        plug_in(&wire);
        let changes = manager.port_registration_handler();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.connected));

        for change in &changes {
            let direction = DeviceManager::owns_port(&change.port_b).unwrap();
            manager.set_connected(direction, true);
            if direction == ConnectionState::INPUT {
                assert_eq!(manager.state(), DeviceState::InputLinked);
            }
        }
        assert_eq!(manager.state(), DeviceState::BothLinked);

        manager.device_acquire().unwrap();
        assert_eq!(manager.state(), DeviceState::DeviceAcquired);

        manager.set_in_use(true);
        assert_eq!(manager.state(), DeviceState::InUse);

        manager.begin_teardown();
        assert_eq!(manager.state(), DeviceState::Teardown);
    }

    #[test]
    fn test_scan_connects_only_missing_direction() {
        let (mut manager, wire, _) = manager();
        let (sink, _source) = input_channel(INPUT_CAPACITY);
        manager.ports_register(sink).unwrap();
        plug_in(&wire);
        wire.lock().input = Some("Something else".to_string());
        wire.lock().inputs.push("Something else".to_string());

        let changes = manager.port_registration_handler();
        assert_eq!(
            changes,
            vec![PortChange {
                port_a: DEVICE_OUT.to_string(),
                port_b: OUTPUT_PORT_NAME.to_string(),
                connected: true,
            }]
        );
        assert_eq!(wire.lock().input.as_deref(), Some("Something else"));

        // Both connected: nothing more to do.
        assert!(manager.port_registration_handler().is_empty());
    }

    #[test]
    fn test_scan_prefers_saved_connection() {
        let (mut manager, wire, _) = manager();
        let (sink, _source) = input_channel(INPUT_CAPACITY);
        manager.ports_register(sink).unwrap();
        plug_in(&wire);
        wire.lock().inputs.push("Ableton Push 2 MIDI 2 in".to_string());

        manager.restore_port_state(
            &PortState {
                name: "ignored".to_string(),
                connections: vec!["Ableton Push 2 MIDI 2 in".to_string()],
            },
            &PortState::default(),
        );

        manager.port_registration_handler();
        assert_eq!(
            wire.lock().input.as_deref(),
            Some("Ableton Push 2 MIDI 2 in")
        );
        assert_eq!(wire.lock().output.as_deref(), Some(DEVICE_OUT));

        let (input, _) = manager.port_state();
        assert_eq!(input.name, INPUT_PORT_NAME);
        assert_eq!(input.connections, vec!["Ableton Push 2 MIDI 2 in".to_string()]);
    }

    #[test]
    fn test_unplugged_port_is_disconnected() {
        let (mut manager, wire, _) = manager();
        let (sink, _source) = input_channel(INPUT_CAPACITY);
        manager.ports_register(sink).unwrap();
        plug_in(&wire);
        manager.port_registration_handler();

        wire.lock().inputs.retain(|p| p != DEVICE_IN);
        let changes = manager.port_registration_handler();
        assert_eq!(
            changes,
            vec![PortChange {
                port_a: DEVICE_IN.to_string(),
                port_b: INPUT_PORT_NAME.to_string(),
                connected: false,
            }]
        );
        assert!(wire.lock().input.is_none());
        assert_eq!(wire.lock().output.as_deref(), Some(DEVICE_OUT));
    }

    #[test]
    fn test_nothing_happens_before_registration_or_after_teardown() {
        let (mut manager, wire, _) = manager();
        plug_in(&wire);
        assert!(manager.port_registration_handler().is_empty());

        let (sink, _source) = input_channel(INPUT_CAPACITY);
        manager.ports_register(sink).unwrap();
        manager.begin_teardown();
        assert!(manager.port_registration_handler().is_empty());
    }

    #[test]
    fn test_owns_port() {
        assert_eq!(
            DeviceManager::owns_port("Push 2 in"),
            Some(ConnectionState::INPUT)
        );
        assert_eq!(
            DeviceManager::owns_port("Push 2 out"),
            Some(ConnectionState::OUTPUT)
        );
        assert_eq!(DeviceManager::owns_port("system:playback_1"), None);
    }

    #[test]
    fn test_write_requires_output() {
        let (mut manager, wire, _) = manager();
        assert!(matches!(
            manager.write(&[0x90, 36, 1]),
            Err(DeviceError::OutputNotConnected)
        ));

        manager.set_connected(ConnectionState::OUTPUT, true);
        manager.write(&[0x90, 36, 1]).unwrap();
        assert_eq!(wire.lock().written, vec![vec![0x90, 36, 1]]);
    }

    #[test]
    fn test_acquire_failure_leaves_nothing_held() {
        let (mut manager, _, present) = manager();
        present.store(false, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            manager.device_acquire(),
            Err(DeviceError::UsbNotFound)
        ));
        assert!(!manager.device_acquired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ports_release_waits_for_drain() {
        let (mut manager, wire, _) = manager();
        let (sink, _source) = input_channel(INPUT_CAPACITY);
        manager.ports_register(sink).unwrap();
        wire.lock().pending = 3;

        let start = Instant::now();
        manager.ports_release().await;

        assert!(start.elapsed() >= DRAIN_POLL * 3);
        assert!(wire.lock().released);
        assert!(manager.connection_state().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ports_release_gives_up_after_timeout() {
        let (mut manager, wire, _) = manager();
        wire.lock().pending = usize::MAX;

        let start = Instant::now();
        manager.ports_release().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= DRAIN_TIMEOUT);
        assert!(elapsed < DRAIN_TIMEOUT + DRAIN_POLL * 2);
        assert!(wire.lock().released);
    }
}
