//! evdev node discovery shared by the daemon and the CLI

use std::io;
use std::path::{Path, PathBuf};

use evdev::Device;

const INPUT_DIR: &str = "/dev/input";

/// Paths of all `/dev/input/event*` nodes, sorted by event number
pub fn event_device_paths() -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in std::fs::read_dir(INPUT_DIR)? {
        let path = entry?.path();

        // Only look at event* devices
        if event_number(&path).is_some() {
            paths.push(path);
        }
    }

    sort_by_event_number(&mut paths);
    Ok(paths)
}

/// `event12` -> 12; anything else is not an event node
fn event_number(path: &Path) -> Option<u32> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("event"))
        .and_then(|n| n.parse().ok())
}

fn sort_by_event_number(paths: &mut [PathBuf]) {
    paths.sort_by_key(|p| event_number(p).unwrap_or(u32::MAX));
}

/// Check if a device is a keyboard
pub fn is_keyboard(device: &Device) -> bool {
    device
        .supported_events()
        .contains(evdev::EventType::KEY)
        && device
            .supported_keys()
            .map(|keys| keys.contains(evdev::Key::KEY_A))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_number_ordering() {
        let mut paths = vec![
            PathBuf::from("/dev/input/event10"),
            PathBuf::from("/dev/input/event2"),
            PathBuf::from("/dev/input/event0"),
        ];
        sort_by_event_number(&mut paths);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/dev/input/event0"),
                PathBuf::from("/dev/input/event2"),
                PathBuf::from("/dev/input/event10"),
            ]
        );
    }

    #[test]
    fn test_only_event_nodes_are_numbered() {
        assert_eq!(event_number(Path::new("/dev/input/event7")), Some(7));
        assert_eq!(event_number(Path::new("/dev/input/mice")), None);
        assert_eq!(event_number(Path::new("/dev/input/mouse0")), None);
        assert_eq!(event_number(Path::new("/dev/input/by-id")), None);
    }
}
