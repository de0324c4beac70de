//! USB handle for the Push 2.
//!
//! Only the handle itself is needed: holding the claimed interface keeps
//! the device in use. Vendor ID 0x2982, product ID 0x1967.

use rusb::{Context, DeviceHandle, UsbContext};

use super::UsbAccess;
use crate::error::DeviceError;

/// Push 2 USB identifiers
const PUSH2_VENDOR_ID: u16 = 0x2982;
const PUSH2_PRODUCT_ID: u16 = 0x1967;

const PUSH2_INTERFACE: u8 = 0;

/// Open handle with interface 0 claimed, or nothing.
#[derive(Default)]
pub struct RusbDevice {
    handle: Option<DeviceHandle<Context>>,
}

impl RusbDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsbAccess for RusbDevice {
    fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.handle.is_some() {
            tracing::debug!("Push 2 USB handle already open");
            return Ok(());
        }

        let context = Context::new()?;

        let device = context
            .devices()?
            .iter()
            .find(|d| {
                d.device_descriptor().is_ok_and(|desc| {
                    desc.vendor_id() == PUSH2_VENDOR_ID && desc.product_id() == PUSH2_PRODUCT_ID
                })
            })
            .ok_or(DeviceError::UsbNotFound)?;

        let mut handle = device.open()?;

        // Dropping the handle on failure closes it.
        if let Err(e) = handle.claim_interface(PUSH2_INTERFACE) {
            tracing::warn!("Could not claim Push 2 USB interface: {}", e);
            return Err(DeviceError::InterfaceClaim);
        }

        tracing::info!("Push 2 USB device acquired");
        self.handle = Some(handle);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(PUSH2_INTERFACE) {
                tracing::warn!("Failed to release Push 2 USB interface: {}", e);
            }
            tracing::info!("Push 2 USB device released");
        }
    }

    fn acquired(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for RusbDevice {
    fn drop(&mut self) {
        self.release();
    }
}
