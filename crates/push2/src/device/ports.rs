//! midir-backed ports.
//!
//! Input bytes take two routes. The pad filter runs right in the midir
//! callback and feeds the shadow port buffer; the raw bytes then go to
//! the driver loop through the input ring.

use std::sync::Arc;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use padbridge_core::MidiEvent;
use parking_lot::Mutex;
use ringbuf::HeapProd;

use super::{InputSink, MidiTransport, INPUT_PORT_NAME, OUTPUT_PORT_NAME};
use crate::error::DeviceError;
use crate::filter::PadFilter;

const CLIENT_NAME: &str = "padbridge";

/// Where the input callback writes. Outlives any one connection.
struct Feeds {
    sink: Option<InputSink>,
    shadow: HeapProd<MidiEvent>,
}

/// State owned by the input callback.
struct InputData {
    filter: PadFilter,
    feeds: Arc<Mutex<Feeds>>,
}

struct Inner {
    registered: bool,
    input_scanner: Option<MidiInput>,
    output_scanner: Option<MidiOutput>,
    input: Option<(String, MidiInputConnection<InputData>)>,
    output: Option<(String, MidiOutputConnection)>,
}

pub struct MidirTransport {
    filter: PadFilter,
    feeds: Arc<Mutex<Feeds>>,
    inner: Mutex<Inner>,
}

impl MidirTransport {
    pub fn new(filter: PadFilter, shadow: HeapProd<MidiEvent>) -> Self {
        Self {
            filter,
            feeds: Arc::new(Mutex::new(Feeds { sink: None, shadow })),
            inner: Mutex::new(Inner {
                registered: false,
                input_scanner: None,
                output_scanner: None,
                input: None,
                output: None,
            }),
        }
    }
}

fn input_client() -> Result<MidiInput, DeviceError> {
    let mut midi_in =
        MidiInput::new(CLIENT_NAME).map_err(|e| DeviceError::MidiInit(e.to_string()))?;
    // Pressure mode replies arrive as sysex.
    midi_in.ignore(Ignore::None);
    Ok(midi_in)
}

fn output_client() -> Result<MidiOutput, DeviceError> {
    MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::MidiInit(e.to_string()))
}

impl MidiTransport for MidirTransport {
    fn register(&self, input: InputSink) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        inner.input_scanner = Some(input_client()?);
        inner.output_scanner = Some(output_client()?);
        self.feeds.lock().sink = Some(input);
        inner.registered = true;
        Ok(())
    }

    fn registered(&self) -> bool {
        self.inner.lock().registered
    }

    fn input_ports(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let Some(scanner) = inner.input_scanner.as_ref() else {
            return Vec::new();
        };
        scanner
            .ports()
            .iter()
            .filter_map(|p| scanner.port_name(p).ok())
            .collect()
    }

    fn output_ports(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let Some(scanner) = inner.output_scanner.as_ref() else {
            return Vec::new();
        };
        scanner
            .ports()
            .iter()
            .filter_map(|p| scanner.port_name(p).ok())
            .collect()
    }

    fn connect_input(&self, port: &str) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.input.is_some() {
            return Ok(());
        }
        if !inner.registered {
            return Err(DeviceError::PortsNotRegistered);
        }

        let midi_in = input_client()?;
        let target = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).is_ok_and(|n| n == port))
            .ok_or_else(|| DeviceError::Connect(format!("no input port named {}", port)))?;

        let data = InputData {
            filter: self.filter.clone(),
            feeds: self.feeds.clone(),
        };

        let connection = midi_in
            .connect(
                &target,
                INPUT_PORT_NAME,
                move |_timestamp, message, data: &mut InputData| {
                    // Only register and release take this lock.
                    let Some(mut feeds) = data.feeds.try_lock() else {
                        return;
                    };
                    if let Some(event) = MidiEvent::new(0, message) {
                        data.filter
                            .process(std::slice::from_ref(&event), &mut feeds.shadow);
                    }
                    if let Some(sink) = feeds.sink.as_mut() {
                        sink.push(message);
                    }
                },
                data,
            )
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        inner.input = Some((port.to_string(), connection));
        Ok(())
    }

    fn connect_output(&self, port: &str) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.output.is_some() {
            return Ok(());
        }
        if !inner.registered {
            return Err(DeviceError::PortsNotRegistered);
        }

        let midi_out = output_client()?;
        let target = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).is_ok_and(|n| n == port))
            .ok_or_else(|| DeviceError::Connect(format!("no output port named {}", port)))?;

        let connection = midi_out
            .connect(&target, OUTPUT_PORT_NAME)
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        inner.output = Some((port.to_string(), connection));
        Ok(())
    }

    fn disconnect_input(&self) {
        if let Some((_, connection)) = self.inner.lock().input.take() {
            connection.close();
        }
    }

    fn disconnect_output(&self) {
        if let Some((_, connection)) = self.inner.lock().output.take() {
            connection.close();
        }
    }

    fn input_connection(&self) -> Option<String> {
        self.inner.lock().input.as_ref().map(|(name, _)| name.clone())
    }

    fn output_connection(&self) -> Option<String> {
        self.inner.lock().output.as_ref().map(|(name, _)| name.clone())
    }

    fn write(&self, bytes: &[u8]) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        let (_, connection) = inner
            .output
            .as_mut()
            .ok_or(DeviceError::OutputNotConnected)?;
        connection
            .send(bytes)
            .map_err(|e| DeviceError::Connect(e.to_string()))
    }

    fn pending(&self) -> usize {
        // midir sends synchronously.
        0
    }

    fn release(&self) {
        self.disconnect_input();
        self.disconnect_output();
        let mut inner = self.inner.lock();
        inner.input_scanner = None;
        inner.output_scanner = None;
        inner.registered = false;
        drop(inner);
        self.feeds.lock().sink = None;
    }
}
