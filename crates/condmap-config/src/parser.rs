//! KDL configuration parser

use std::path::Path;

use crate::error::{ConfigError, SourceLocation};
use crate::model::*;

/// Extract source location from a KDL node's name span
fn get_node_location(node: &kdl::KdlNode, source: &str) -> SourceLocation {
    let span = node.name().span();
    let (line, column) = offset_to_line_col(source, span.offset());

    SourceLocation::new(line, column, span.offset(), span.len())
}

/// Extract source location from a KDL entry (node argument)
fn get_entry_location(entry: &kdl::KdlEntry, source: &str) -> SourceLocation {
    let span = entry.span();
    let (line, column) = offset_to_line_col(source, span.offset());

    SourceLocation::new(line, column, span.offset(), span.len())
}

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl is built against an older miette, so rebuild the span by hand
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node, content)?;
            }
            "device" => {
                config.devices.push(parse_device(node, content)?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode, source: &str) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    let Some(children) = node.children() else {
        return Ok(global);
    };

    for child in children.nodes() {
        match child.name().value() {
            "log-level" => {
                if let Some(entry) = child.entries().first() {
                    let val = entry.value().as_string().ok_or_else(|| ConfigError::Invalid {
                        message: "log-level must be a string".to_string(),
                        location: get_entry_location(entry, source),
                    })?;
                    global.log_level = val.parse().map_err(|message| ConfigError::Invalid {
                        message,
                        location: get_entry_location(entry, source),
                    })?;
                }
            }
            "startup-delay-ms" => {
                if let Some(entry) = child.entries().first() {
                    global.startup_delay_ms = entry
                        .value()
                        .as_i64()
                        .and_then(|ms| u64::try_from(ms).ok())
                        .ok_or_else(|| ConfigError::Invalid {
                            message: "startup-delay-ms must be a non-negative integer".to_string(),
                            location: get_entry_location(entry, source),
                        })?;
                }
            }
            name => {
                tracing::warn!("Unknown global config option: {}", name);
            }
        }
    }

    Ok(global)
}

fn parse_device(node: &kdl::KdlNode, source: &str) -> Result<DeviceConfig, ConfigError> {
    let name = node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| ConfigError::MissingField {
            field: "device name (e.g., `device \"My Keyboard\" { ... }`)".to_string(),
            location: get_node_location(node, source),
        })?;

    let mut device = DeviceConfig {
        name,
        phys: None,
        rules: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "phys" => {
                    device.phys = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_string())
                        .map(|s| s.to_string());
                }
                "rule" => {
                    device.rules.push(parse_rule(child, source)?);
                }
                name => {
                    tracing::warn!("Unknown device config option: {}", name);
                }
            }
        }
    }

    if device.rules.is_empty() {
        tracing::warn!(
            "Device '{}' has no rules; its events will pass through unchanged",
            device.name
        );
    }

    Ok(device)
}

fn parse_rule(node: &kdl::KdlNode, source: &str) -> Result<RuleConfig, ConfigError> {
    let location = get_node_location(node, source);
    let name = node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string());

    let mut when = Vec::new();
    let mut cond = Vec::new();
    let mut except = Vec::new();
    let mut mappings = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "when" => when.extend(parse_key_args(child, source)?),
                // Each `cond` node is one AND group; a bare `cond` is the empty group
                "cond" => cond.push(parse_key_args(child, source)?),
                "except" => except.extend(parse_key_args(child, source)?),
                "map" => {
                    let mut keys = parse_key_args(child, source)?.into_iter();
                    let target = keys.next().ok_or_else(|| ConfigError::MissingField {
                        field: "map target key (e.g., `map \"KEY_LEFTMETA\" \"KEY_LEFTCTRL\"`)"
                            .to_string(),
                        location: get_node_location(child, source),
                    })?;
                    mappings.push(MappingConfig {
                        target,
                        replacements: keys.collect(),
                    });
                }
                name => {
                    tracing::warn!("Unknown rule option: {}", name);
                }
            }
        }
    }

    if when.is_empty() {
        return Err(ConfigError::MissingField {
            field: "rule trigger (e.g., `when \"KEY_LEFTMETA\"`)".to_string(),
            location,
        });
    }

    if cond.is_empty() {
        cond.push(Vec::new());
    }

    Ok(RuleConfig {
        name,
        when,
        cond,
        except,
        mappings,
        location,
    })
}

/// Collect the positional string arguments of a node as key references
fn parse_key_args(node: &kdl::KdlNode, source: &str) -> Result<Vec<KeyRef>, ConfigError> {
    let mut keys = Vec::new();

    for entry in node.entries() {
        if let Some(prop) = entry.name() {
            tracing::warn!(
                "Ignoring property '{}' on '{}' node",
                prop.value(),
                node.name().value()
            );
            continue;
        }

        let name = entry.value().as_string().ok_or_else(|| ConfigError::Invalid {
            message: format!(
                "'{}' expects key names as strings, got {}",
                node.name().value(),
                entry.value()
            ),
            location: get_entry_location(entry, source),
        })?;

        keys.push(KeyRef {
            name: name.to_string(),
            location: get_entry_location(entry, source),
        });
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(keys: &[KeyRef]) -> Vec<&str> {
        keys.iter().map(|k| k.name.as_str()).collect()
    }

    #[test]
    fn test_parse_basic_config() {
        let config = r#"
            global {
                log-level "debug"
                startup-delay-ms 500
            }

            device "Test Keyboard" {
                phys "isa0060/serio0/input0"
                rule "meta-as-ctrl" {
                    when "KEY_LEFTMETA"
                    except "KEY_LEFTCTRL"
                    map "KEY_LEFTMETA" "KEY_LEFTCTRL"
                }
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.global.log_level, LogLevel::Debug);
        assert_eq!(result.global.startup_delay_ms, 500);
        assert_eq!(result.devices.len(), 1);

        let device = &result.devices[0];
        assert_eq!(device.name, "Test Keyboard");
        assert_eq!(device.phys.as_deref(), Some("isa0060/serio0/input0"));
        assert_eq!(device.rules.len(), 1);

        let rule = &device.rules[0];
        assert_eq!(rule.name.as_deref(), Some("meta-as-ctrl"));
        assert_eq!(names(&rule.when), vec!["KEY_LEFTMETA"]);
        assert_eq!(names(&rule.except), vec!["KEY_LEFTCTRL"]);
        assert_eq!(rule.mappings.len(), 1);
        assert_eq!(rule.mappings[0].target.name, "KEY_LEFTMETA");
        assert_eq!(names(&rule.mappings[0].replacements), vec!["KEY_LEFTCTRL"]);
    }

    #[test]
    fn test_defaults_without_global() {
        let result = parse_config_str(r#"device "Kbd" {}"#).unwrap();
        assert_eq!(result.global.log_level, LogLevel::Info);
        assert_eq!(result.global.startup_delay_ms, 2000);
        assert!(result.devices[0].rules.is_empty());
        assert!(result.devices[0].phys.is_none());
    }

    #[test]
    fn test_absent_cond_normalizes_to_single_empty_group() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_CAPSLOCK"
                    map "KEY_CAPSLOCK" "KEY_ESC"
                }
            }
        "#;

        let rule = &parse_config_str(config).unwrap().devices[0].rules[0];
        assert_eq!(rule.cond.len(), 1);
        assert!(rule.cond[0].is_empty());
    }

    #[test]
    fn test_repeated_cond_is_or_of_and_groups() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_Q"
                    cond "KEY_LEFTMETA" "KEY_LEFTCTRL"
                    cond "KEY_RIGHTMETA"
                    map "KEY_Q" "KEY_L"
                }
            }
        "#;

        let rule = &parse_config_str(config).unwrap().devices[0].rules[0];
        assert_eq!(rule.cond.len(), 2);
        assert_eq!(names(&rule.cond[0]), vec!["KEY_LEFTMETA", "KEY_LEFTCTRL"]);
        assert_eq!(names(&rule.cond[1]), vec!["KEY_RIGHTMETA"]);
    }

    #[test]
    fn test_bare_cond_is_explicit_empty_group() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_A"
                    cond
                    cond "KEY_LEFTALT"
                }
            }
        "#;

        let rule = &parse_config_str(config).unwrap().devices[0].rules[0];
        assert_eq!(rule.cond.len(), 2);
        assert!(rule.cond[0].is_empty());
    }

    #[test]
    fn test_except_and_when_accumulate() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_HOME" "KEY_END"
                    when "KEY_PAGEUP"
                    except "KEY_LEFTCTRL"
                    except "KEY_LEFTALT" "KEY_LEFTSHIFT"
                }
            }
        "#;

        let rule = &parse_config_str(config).unwrap().devices[0].rules[0];
        assert_eq!(names(&rule.when), vec!["KEY_HOME", "KEY_END", "KEY_PAGEUP"]);
        assert_eq!(
            names(&rule.except),
            vec!["KEY_LEFTCTRL", "KEY_LEFTALT", "KEY_LEFTSHIFT"]
        );
    }

    #[test]
    fn test_mappings_keep_declaration_order_and_suppression() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_Q"
                    map "KEY_LEFTCTRL"
                    map "KEY_LEFTMETA" "KEY_LEFTMETA"
                    map "KEY_Q" "KEY_L"
                }
            }
        "#;

        let rule = &parse_config_str(config).unwrap().devices[0].rules[0];
        let targets: Vec<&str> = rule.mappings.iter().map(|m| m.target.name.as_str()).collect();
        assert_eq!(targets, vec!["KEY_LEFTCTRL", "KEY_LEFTMETA", "KEY_Q"]);
        assert!(rule.mappings[0].replacements.is_empty());
    }

    #[test]
    fn test_rule_order_preserved() {
        let config = r#"
            device "Kbd" {
                rule "first" { when "KEY_A"; }
                rule "second" { when "KEY_A"; }
                rule "third" { when "KEY_B"; }
            }
        "#;

        let rules = &parse_config_str(config).unwrap().devices[0].rules;
        let labels: Vec<_> = rules.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(labels, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_device_missing_name_error() {
        let config = r#"
            device {
                rule { when "KEY_A"; }
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::MissingField { field, location } => {
                assert!(field.contains("device name"));
                assert_eq!(location.line, 2);
            }
            _ => panic!("Expected MissingField error, got: {:?}", err),
        }
    }

    #[test]
    fn test_rule_without_trigger_fails() {
        let config = r#"
            device "Kbd" {
                rule {
                    map "KEY_A" "KEY_B"
                }
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::MissingField { field, location } => {
                assert!(field.contains("when"));
                assert_eq!(location.line, 3);
            }
            _ => panic!("Expected MissingField error, got: {:?}", err),
        }
    }

    #[test]
    fn test_map_without_target_fails() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_A"
                    map
                }
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingField { ref field, .. } if field.contains("map target")),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_non_string_key_rejected() {
        let config = r#"
            device "Kbd" {
                rule {
                    when "KEY_A"
                    cond 42
                }
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::Invalid { message, location } => {
                assert!(message.contains("cond"));
                assert_eq!(location.line, 5);
            }
            _ => panic!("Expected Invalid error, got: {:?}", err),
        }
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let config = r#"
            global {
                log-level "loud"
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref message, .. } if message.contains("loud")));
    }

    #[test]
    fn test_negative_startup_delay_rejected() {
        let config = r#"
            global {
                startup-delay-ms -5
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_kdl_syntax_error_reports_span() {
        let err = parse_config_str("device \"Kbd\" {").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_key_locations_recorded() {
        let config = "device \"Kbd\" {\n    rule {\n        when \"KEY_A\"\n    }\n}\n";

        let rule = &parse_config_str(config).unwrap().devices[0].rules[0];
        assert_eq!(rule.when[0].location.line, 3);
        assert_eq!(rule.location.line, 2);
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            profile "old-style" {}
            device "Kbd" {
                vendor-product "3434:0361"
                rule {
                    when "KEY_A"
                    delay 10
                }
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.devices[0].rules.len(), 1);
    }

    #[test]
    fn test_parse_config_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device \"File Keyboard\" {{ rule {{ when \"KEY_A\"; }} }}").unwrap();

        let config = parse_config(file.path()).unwrap();
        assert_eq!(config.devices[0].name, "File Keyboard");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_config(&dir.path().join("absent.kdl")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_device_lookup_by_name() {
        let config = parse_config_str(r#"device "A" {}; device "B" {}"#).unwrap();
        assert!(config.device("B").is_some());
        assert!(config.device("C").is_none());
    }
}
