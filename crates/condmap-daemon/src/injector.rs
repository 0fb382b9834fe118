//! Virtual device injection via uinput
//!
//! Every grabbed keyboard writes its rewritten events through one virtual
//! keyboard. [`SharedVirtualDevice`] is the handle the per-device tasks share.

use std::sync::Arc;

use anyhow::{Context, Result};
use condmap_engine::OutputEvent;
use evdev::{uinput::VirtualDeviceBuilder, AttributeSet, InputEvent, Key};
use tokio::sync::Mutex;

pub type SharedVirtualDevice = Arc<Mutex<VirtualDevice>>;

/// Create the shared virtual keyboard.
///
/// `extra_keys` are enabled on top of the standard key range so remap outputs
/// outside it (media keys, `KEY_HANGEUL` on some layouts) can be emitted.
///
/// # Errors
///
/// Returns an error if the virtual device cannot be created (e.g., insufficient
/// permissions to access /dev/uinput).
pub fn create_shared_virtual_device(
    name: &str,
    extra_keys: impl IntoIterator<Item = Key>,
) -> Result<SharedVirtualDevice> {
    let device = VirtualDevice::new_keyboard(name, extra_keys)?;
    Ok(Arc::new(Mutex::new(device)))
}

/// A virtual input device for injecting events
pub struct VirtualDevice {
    device: evdev::uinput::VirtualDevice,
}

impl VirtualDevice {
    /// Create a new virtual keyboard device
    pub fn new_keyboard(name: &str, extra_keys: impl IntoIterator<Item = Key>) -> Result<Self> {
        let keys = keyboard_keys(extra_keys);

        let device = VirtualDeviceBuilder::new()
            .context("Failed to open /dev/uinput")?
            .name(name)
            .with_keys(&keys)?
            .build()
            .with_context(|| format!("Failed to create virtual keyboard '{}'", name))?;

        Ok(Self { device })
    }

    /// Emit raw input events; evdev terminates the batch with SYN_REPORT
    pub fn emit(&mut self, events: &[InputEvent]) -> Result<()> {
        self.device.emit(events)?;
        Ok(())
    }

    /// Emit engine output as one batch
    pub fn emit_keys(&mut self, events: &[OutputEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let raw: Vec<InputEvent> = events.iter().map(|e| e.to_input_event()).collect();
        self.emit(&raw)
    }
}

fn keyboard_keys(extra_keys: impl IntoIterator<Item = Key>) -> AttributeSet<Key> {
    let mut keys = AttributeSet::<Key>::new();

    // Add all standard keys
    for code in 0..256u16 {
        keys.insert(Key::new(code));
    }
    for key in extra_keys {
        keys.insert(key);
    }

    keys
}
