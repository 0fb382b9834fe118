//! Configuration parsing for condmap
//!
//! This crate handles parsing KDL configuration files into the normalized
//! rule model consumed by the remapping engine.

mod error;
mod model;
mod parser;

pub use error::{ConfigError, SourceLocation};
pub use model::*;
pub use parser::{parse_config, parse_config_str};
