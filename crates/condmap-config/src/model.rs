//! Configuration data model
//!
//! Everything here is already normalized: condition groups are always a
//! non-empty list of AND groups and mappings keep declaration order.

use serde::Serialize;

use crate::error::SourceLocation;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub global: GlobalConfig,
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Find a configured device by its name
    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// Global settings
#[derive(Debug, Clone, Serialize)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// Pause before grabbing devices so keys held at startup get released
    pub startup_delay_ms: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            startup_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Device-specific configuration
#[derive(Debug, Clone, Serialize)]
pub struct DeviceConfig {
    /// Device name to match (from evdev)
    pub name: String,
    /// Physical path to match when several devices share a name
    pub phys: Option<String>,
    /// Remap rules in priority (declaration) order
    pub rules: Vec<RuleConfig>,
}

/// A key name as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeyRef {
    pub name: String,
    #[serde(skip)]
    pub location: SourceLocation,
}

impl KeyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::default(),
        }
    }
}

/// One conditional remap rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleConfig {
    /// Optional label used in logs
    pub name: Option<String>,
    /// Trigger keys; each one yields its own rule at build time
    pub when: Vec<KeyRef>,
    /// OR of AND groups; `[[]]` when the rule had no `cond`
    pub cond: Vec<Vec<KeyRef>>,
    /// None of these may be held
    pub except: Vec<KeyRef>,
    /// Output mapping in declaration order
    pub mappings: Vec<MappingConfig>,
    #[serde(skip)]
    pub location: SourceLocation,
}

/// `target` becomes `replacements`; an empty list suppresses `target`
#[derive(Debug, Clone, Serialize)]
pub struct MappingConfig {
    pub target: KeyRef,
    pub replacements: Vec<KeyRef>,
}
