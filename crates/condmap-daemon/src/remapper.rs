//! Per-device remapping loop
//!
//! Each grabbed device gets its own task and its own [`RemapEngine`]. The
//! device's event stream is the single ordered queue feeding that engine;
//! devices never share key state.

use std::sync::Arc;

use condmap_engine::{EngineStats, KeyEvent, RemapEngine, RuleSet};
use evdev::{EventStream, EventType, InputEvent};
use tokio::sync::watch;

use crate::device::DeviceInfo;
use crate::injector::SharedVirtualDevice;

/// What the loop should do with one raw event
#[derive(Debug, PartialEq)]
enum Routed {
    /// Key event for the engine
    Key(KeyEvent),
    /// SYN reports are regenerated by the virtual device on every batch
    Drop,
    /// Anything else (MSC_SCAN, LEDs) is forwarded untouched
    Forward,
}

fn route(event: &InputEvent) -> Routed {
    if event.event_type() == EventType::SYNCHRONIZATION {
        return Routed::Drop;
    }

    match KeyEvent::from_input_event(event) {
        Some(key_event) => Routed::Key(key_event),
        None if event.event_type() == EventType::KEY => {
            tracing::warn!("Unknown key event value {}; forwarding", event.value());
            Routed::Forward
        }
        None => Routed::Forward,
    }
}

pub struct DeviceRemapper {
    info: DeviceInfo,
    engine: RemapEngine,
    stream: EventStream,
}

impl DeviceRemapper {
    pub fn new(info: DeviceInfo, rules: Arc<RuleSet>, stream: EventStream) -> Self {
        Self {
            info,
            engine: RemapEngine::new(rules),
            stream,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Read, rewrite and inject until shutdown or a read error.
    ///
    /// Returns the device name and the engine's counters. Any output still
    /// held is released before returning so nothing stays stuck down.
    pub async fn run(
        mut self,
        virtual_device: SharedVirtualDevice,
        mut shutdown: watch::Receiver<bool>,
    ) -> (String, EngineStats) {
        let name = self.info.name.clone();
        let mut out: Vec<KeyEvent> = Vec::with_capacity(8);

        tracing::info!("Remapping '{}' ({})", name, self.info.path.display());

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => break,
                event = self.stream.next_event() => event,
            };

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(
                        "Failed to read from '{}' at {}: {}",
                        name,
                        self.info.path.display(),
                        e
                    );
                    break;
                }
            };

            let result = match route(&event) {
                Routed::Key(key_event) => {
                    out.clear();
                    self.engine.process_into(key_event, &mut out);
                    virtual_device.lock().await.emit_keys(&out)
                }
                Routed::Forward => virtual_device.lock().await.emit(&[event]),
                Routed::Drop => Ok(()),
            };

            if let Err(e) = result {
                tracing::error!("Failed to inject events for '{}': {:#}", name, e);
            }
        }

        let held = self.engine.release_all();
        if !held.is_empty() {
            tracing::debug!("Releasing {} held key(s) for '{}'", held.len(), name);
            if let Err(e) = virtual_device.lock().await.emit_keys(&held) {
                tracing::error!("Failed to release held keys for '{}': {:#}", name, e);
            }
        }

        (name, self.engine.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use condmap_engine::Key;

    #[test]
    fn test_route_key_events() {
        let press = InputEvent::new(EventType::KEY, Key::KEY_A.code(), 1);
        assert_eq!(route(&press), Routed::Key(KeyEvent::press(Key::KEY_A)));

        let repeat = InputEvent::new(EventType::KEY, Key::KEY_A.code(), 2);
        assert_eq!(route(&repeat), Routed::Key(KeyEvent::repeat(Key::KEY_A)));
    }

    #[test]
    fn test_route_other_events() {
        let syn = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        assert_eq!(route(&syn), Routed::Drop);

        // MSC_SCAN
        let scan = InputEvent::new(EventType::MISC, 4, 0x70004);
        assert_eq!(route(&scan), Routed::Forward);

        let odd = InputEvent::new(EventType::KEY, Key::KEY_A.code(), 5);
        assert_eq!(route(&odd), Routed::Forward);
    }
}
