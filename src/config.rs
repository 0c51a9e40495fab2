//! Bootstrap configuration (spec §4.G, §6).
//!
//! Config-file lexing is an out-of-scope collaborator (spec §1): the host
//! parses its own config format and hands this crate an already-validated
//! plain struct. `Config::validate` still checks the invariants that are
//! this crate's responsibility (non-empty pattern regexes, sane
//! `submatch_idx`), matching the "Configuration error" bucket of §7.

use std::path::PathBuf;

use crate::error::{ConfigurationSnafu, Error};
use snafu::ensure;

/// Which access backend to use — or none, disabling device polling
/// entirely (spec §6: "any other value disables device polling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Sysfs,
    Proc,
    Disabled,
}

impl Default for Source {
    fn default() -> Self {
        Source::Sysfs
    }
}

/// One `MsgPattern <name> { Match { ... } ... }` block.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub name: String,
    pub regex: String,
    pub submatch_idx: usize,
    pub excluderegex: Option<String>,
    pub is_mandatory: bool,
}

impl PatternSpec {
    pub fn new(name: impl Into<String>, regex: impl Into<String>, is_mandatory: bool) -> Self {
        Self {
            name: name.into(),
            regex: regex.into(),
            submatch_idx: 1,
            excluderegex: None,
            is_mandatory,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParserSpec {
    pub name: String,
    pub patterns: Vec<PatternSpec>,
}

/// The default log parser (spec §6, Table 4), installed automatically when
/// `read_log` is enabled and no parser was configured (spec §4.G).
pub fn default_parser() -> ParserSpec {
    ParserSpec {
        name: "default".to_string(),
        patterns: vec![
            PatternSpec::new("root port", r"pcieport (.*): AER:", true),
            PatternSpec::new("device", r" ([0-9a-fA-F:\.]*): PCIe Bus Error", true),
            PatternSpec::new("severity", r"severity=([^,]*)", true),
            PatternSpec::new("error type", r"type=(.*),", false),
            PatternSpec::new("id", r", id=(.*)", true),
        ],
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub source: Source,
    pub access_dir: Option<PathBuf>,
    pub report_masked: bool,
    pub persistent_notifications: bool,
    pub log_file: PathBuf,
    pub read_log: bool,
    pub first_full_read: bool,
    pub parsers: Vec<ParserSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            source: Source::default(),
            access_dir: None,
            report_masked: false,
            persistent_notifications: false,
            log_file: PathBuf::from("/var/log/syslog"),
            read_log: false,
            first_full_read: false,
            parsers: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        ensure!(
            !self.host.is_empty(),
            ConfigurationSnafu {
                detail: "host must not be empty".to_string(),
            }
        );
        for parser in &self.parsers {
            ensure!(
                !parser.patterns.is_empty(),
                ConfigurationSnafu {
                    detail: format!("parser \"{}\" has no patterns", parser.name),
                }
            );
            for pattern in &parser.patterns {
                ensure!(
                    pattern.submatch_idx >= 1,
                    ConfigurationSnafu {
                        detail: format!(
                            "pattern \"{}\" has submatch_idx 0, groups are 1-indexed",
                            pattern.name
                        ),
                    }
                );
            }
        }
        Ok(())
    }
}
