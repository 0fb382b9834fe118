//! Device management
//!
//! The `DeviceManager` owns the configuration, the rule set built for each
//! configured device, and every physical device grabbed for remapping.
//!
//! # Overview
//!
//! - Rule sets are built once at startup; a bad key name fails the daemon
//!   before any device is touched
//! - Grabbing walks `/dev/input/event*` once; devices are matched by name and
//!   optional `phys`, first configured device wins
//! - Grabbed devices are turned into [`DeviceRemapper`]s, one per event stream

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use condmap_config::Config;
use condmap_engine::{is_keyboard, Key, RuleSet};
use evdev::Device;

use crate::device::{event_device_paths, DeviceInfo};
use crate::remapper::DeviceRemapper;

/// A device grabbed for exclusive access, waiting to be streamed
pub struct GrabbedDevice {
    pub device: Device,
    pub info: DeviceInfo,
    pub rules: Arc<RuleSet>,
}

/// Manages grabbed input devices for the daemon.
///
/// Owned by the main task; nothing here is shared across tasks.
pub struct DeviceManager {
    config: Arc<Config>,
    /// Rule set per configured device, same order as `config.devices`
    rule_sets: Vec<Arc<RuleSet>>,
    /// Map from device path to grabbed device
    grabbed_devices: HashMap<PathBuf, GrabbedDevice>,
}

impl DeviceManager {
    /// Build the rule set of every configured device.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let mut rule_sets = Vec::with_capacity(config.devices.len());

        for device_config in &config.devices {
            let rules = RuleSet::from_device_config(device_config).with_context(|| {
                format!("Invalid rules for device '{}'", device_config.name)
            })?;

            tracing::info!(
                "Device '{}': {} rule(s)",
                device_config.name,
                rules.len()
            );
            rule_sets.push(Arc::new(rules));
        }

        Ok(Self {
            config,
            rule_sets,
            grabbed_devices: HashMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of currently grabbed devices.
    pub fn grabbed_count(&self) -> usize {
        self.grabbed_devices.len()
    }

    /// Every key any configured rule can emit
    pub fn output_keys(&self) -> BTreeSet<Key> {
        self.rule_sets
            .iter()
            .flat_map(|rules| rules.output_keys())
            .collect()
    }

    /// Grab every present device that matches the configuration.
    ///
    /// A device that matches but cannot be grabbed is logged and skipped.
    pub fn grab_configured_devices(&mut self) -> Result<()> {
        for path in event_device_paths()? {
            if self.grabbed_devices.contains_key(&path) {
                continue;
            }

            if let Err(e) = self.try_grab_device(&path) {
                tracing::warn!("{:#}", e);
            }
        }

        Ok(())
    }

    /// Try to grab a device at the given path.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Device was matched, grabbed, and stored
    /// * `Ok(false)` - Device does not match any configured device (not an error)
    /// * `Err(_)` - Device matched but could not be grabbed
    pub fn try_grab_device(&mut self, path: &Path) -> Result<bool> {
        let mut device = match Device::open(path) {
            Ok(device) => device,
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
                return Ok(false);
            }
        };

        let info = DeviceInfo::from_device(path.to_path_buf(), &device);

        tracing::debug!(
            "Checking device '{}' at {} for configuration match",
            info.name,
            path.display()
        );

        let Some(index) = self.config.devices.iter().position(|c| info.matches(c)) else {
            return Ok(false);
        };

        if !is_keyboard(&device) {
            tracing::warn!(
                "Device '{}' at {} does not report letter keys; grabbing it anyway",
                info.name,
                path.display()
            );
        }

        // Grab the device for exclusive access
        device.grab().with_context(|| {
            format!(
                "Failed to grab device '{}' at {} for exclusive access. \
                 Is another application using this device?",
                info.name,
                path.display()
            )
        })?;

        tracing::info!(
            "Grabbed '{}' ({}) at {}",
            info.name,
            info.vendor_product(),
            path.display()
        );

        self.grabbed_devices.insert(
            path.to_path_buf(),
            GrabbedDevice {
                device,
                info,
                rules: Arc::clone(&self.rule_sets[index]),
            },
        );

        Ok(true)
    }

    /// Convert all grabbed devices into remappers reading async event streams.
    ///
    /// Drains the manager: the event streams take ownership of the devices.
    pub fn into_remappers(mut self) -> Result<Vec<DeviceRemapper>> {
        let grabbed_devices = std::mem::take(&mut self.grabbed_devices);
        let mut remappers = Vec::with_capacity(grabbed_devices.len());

        for (path, grabbed) in grabbed_devices {
            let GrabbedDevice {
                device,
                info,
                rules,
            } = grabbed;

            let stream = device.into_event_stream().with_context(|| {
                format!(
                    "Failed to create event stream for device '{}' at {}",
                    info.name,
                    path.display()
                )
            })?;

            remappers.push(DeviceRemapper::new(info, rules, stream));
        }

        tracing::debug!("Created {} event stream(s)", remappers.len());

        Ok(remappers)
    }
}
