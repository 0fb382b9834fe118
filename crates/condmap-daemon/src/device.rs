//! Device enumeration and matching

use std::path::PathBuf;

use anyhow::{Context, Result};
use condmap_config::DeviceConfig;
use evdev::Device;

/// Information about an input device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub phys: Option<String>,
    pub vendor: u16,
    pub product: u16,
}

impl DeviceInfo {
    pub fn from_device(path: PathBuf, device: &Device) -> Self {
        let id = device.input_id();
        Self {
            path,
            name: device.name().unwrap_or("Unknown").to_string(),
            phys: device.physical_path().map(str::to_string),
            vendor: id.vendor(),
            product: id.product(),
        }
    }

    /// Get vendor:product string (e.g., "3434:0361")
    pub fn vendor_product(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor, self.product)
    }

    /// Whether this device is the one `config` describes
    pub fn matches(&self, config: &DeviceConfig) -> bool {
        device_matches(&self.name, self.phys.as_deref(), config)
    }
}

/// Name must match exactly; `phys` only narrows the match when configured
pub fn device_matches(name: &str, phys: Option<&str>, config: &DeviceConfig) -> bool {
    if config.name != name {
        return false;
    }

    match (&config.phys, phys) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => wanted == actual,
        (Some(_), None) => false,
    }
}

/// Paths of all `/dev/input/event*` nodes, sorted by event number
pub fn event_device_paths() -> Result<Vec<PathBuf>> {
    condmap_engine::event_device_paths().context("Failed to read /dev/input")
}

/// Enumerate all input devices that can be opened
pub fn enumerate_devices() -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    for path in event_device_paths()? {
        match Device::open(&path) {
            Ok(device) => devices.push(DeviceInfo::from_device(path, &device)),
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Ok(devices)
}
