//! condmap CLI
//!
//! Validation, inspection and dry-run tool for condmap configurations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use condmap_config::Config;
use condmap_engine::{
    event_device_paths, is_keyboard, key_name, known_key_names, parse_key, Action, KeyEvent,
    RemapEngine, RuleSet,
};
use miette::{IntoDiagnostic, WrapErr};

#[derive(Parser, Debug)]
#[command(name = "condmap")]
#[command(about = "Conditional keyboard remapper")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/condmap/config.kdl")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file and every device's rules
    Validate {
        /// Print the normalized configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available input devices
    Devices,

    /// List the friendly key names accepted in rules
    Keys,

    /// Run key events through a device's rules without touching any device
    ///
    /// Events are `+KEY` (press), `-KEY` (release) or `=KEY` (repeat).
    Simulate {
        /// Configured device whose rules to use
        #[arg(short, long)]
        device: String,

        /// Events to feed, in order
        #[arg(required = true, allow_hyphen_values = true)]
        events: Vec<String>,
    },
}

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Validate { json } => cmd_validate(&config_path, json),
        Commands::Devices => cmd_devices(),
        Commands::Keys => cmd_keys(),
        Commands::Simulate { device, events } => cmd_simulate(&config_path, &device, &events),
    }
}

fn load_config(config_path: &Path) -> miette::Result<Config> {
    condmap_config::parse_config(config_path).map_err(|e| {
        miette::Report::new(e).wrap_err(format!("Failed to load {}", config_path.display()))
    })
}

fn build_rules(config: &Config) -> miette::Result<Vec<RuleSet>> {
    config
        .devices
        .iter()
        .map(|device| RuleSet::from_device_config(device).into_diagnostic())
        .collect()
}

fn cmd_validate(config_path: &Path, json: bool) -> miette::Result<()> {
    let config = load_config(config_path)?;
    let rule_sets = build_rules(&config)?;

    if json {
        let out = serde_json::to_string_pretty(&config).into_diagnostic()?;
        println!("{}", out);
        return Ok(());
    }

    println!("Configuration is valid: {}", config_path.display());
    println!("  Devices: {}", config.devices.len());
    for (device, rules) in config.devices.iter().zip(&rule_sets) {
        let phys = device
            .phys
            .as_deref()
            .map(|p| format!(" [{}]", p))
            .unwrap_or_default();
        println!(
            "    - {}{}: {} rule block(s), {} rule(s)",
            device.name,
            phys,
            device.rules.len(),
            rules.len()
        );
        for rule in rules.rules() {
            println!("        {}", rule);
        }
    }

    Ok(())
}

fn cmd_devices() -> miette::Result<()> {
    println!("Available input devices:\n");

    let paths = event_device_paths()
        .into_diagnostic()
        .wrap_err("Failed to read /dev/input")?;

    let mut unreadable = 0;
    for path in paths {
        let device = match evdev::Device::open(&path) {
            Ok(device) => device,
            Err(_) => {
                unreadable += 1;
                continue;
            }
        };

        let name = device.name().unwrap_or("Unknown");
        let id = device.input_id();
        let vendor_product = format!("{:04x}:{:04x}", id.vendor(), id.product());

        let device_type = if is_keyboard(&device) { "keyboard" } else { "other" };

        println!("  {} [{}]", name, device_type);
        println!("    Path: {}", path.display());
        if let Some(phys) = device.physical_path() {
            println!("    Phys: {}", phys);
        }
        println!("    ID: {}", vendor_product);
        println!();
    }

    if unreadable > 0 {
        println!(
            "{} device(s) could not be opened; try again as root",
            unreadable
        );
    }

    Ok(())
}

fn cmd_keys() -> miette::Result<()> {
    println!("Friendly key names (case-insensitive):\n");
    for (alias, key) in known_key_names() {
        println!("  {:<16} {}", alias, key_name(key));
    }
    println!();
    println!("Any kernel key token is also accepted, with or without the KEY_ prefix");
    println!("(e.g. KEY_LEFTMETA or leftmeta).");
    Ok(())
}

fn cmd_simulate(config_path: &Path, device: &str, events: &[String]) -> miette::Result<()> {
    let config = load_config(config_path)?;
    let device_config = config.device(device).ok_or_else(|| {
        let known: Vec<&str> = config.devices.iter().map(|d| d.name.as_str()).collect();
        miette::miette!(
            help = format!("configured devices: {}", known.join(", ")),
            "No device named '{}' in {}",
            device,
            config_path.display()
        )
    })?;

    let events = events
        .iter()
        .map(|token| parse_event_token(token))
        .collect::<Result<Vec<_>, _>>()?;

    let rules = RuleSet::from_device_config(device_config).into_diagnostic()?;
    let mut engine = RemapEngine::new(Arc::new(rules));

    let mut out = Vec::new();
    for event in events {
        out.clear();
        engine.process_into(event, &mut out);

        let emitted: Vec<String> = out.iter().map(ToString::to_string).collect();
        if emitted.is_empty() {
            println!("{:<20} -> (nothing)", event.to_string());
        } else {
            println!("{:<20} -> {}", event.to_string(), emitted.join(" "));
        }
    }

    let held: Vec<String> = engine
        .release_all()
        .iter()
        .map(|e| key_name(e.key))
        .collect();
    if !held.is_empty() {
        println!("still held: {}", held.join(" "));
    }
    println!("{}", engine.stats());

    Ok(())
}

/// Parse `+KEY`, `-KEY` or `=KEY`
fn parse_event_token(token: &str) -> miette::Result<KeyEvent> {
    let mut chars = token.chars();
    let action = match chars.next() {
        Some('+') => Action::Press,
        Some('-') => Action::Release,
        Some('=') => Action::Repeat,
        _ => {
            return Err(miette::miette!(
                help = "prefix the key with + (press), - (release) or = (repeat)",
                "Invalid event `{}`",
                token
            ));
        }
    };

    let name = chars.as_str();
    let key = parse_key(name).ok_or_else(|| {
        miette::miette!(
            help = "run `condmap keys` for accepted names",
            "Unknown key `{}` in event `{}`",
            name,
            token
        )
    })?;

    Ok(KeyEvent::new(key, action))
}
