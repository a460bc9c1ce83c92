//=====================================================
// File: logging.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Named severity levels and subscriber setup for TideScript
// Objective: Map the importer's leveled severities onto the tracing facade
//            and install a process-wide fmt subscriber
//=====================================================

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;

/// Named severities accepted by the importer's logging surface, from most
/// to least quiet. `None` silences everything; `Critical` and `Error` both
/// map onto the tracing `ERROR` level, which has no finer split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    None,
    Critical,
    Error,
    #[default]
    Warning,
    Info,
    Debug,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::None,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Info,
        Severity::Debug,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            Severity::None => LevelFilter::OFF,
            Severity::Critical | Severity::Error => LevelFilter::ERROR,
            Severity::Warning => LevelFilter::WARN,
            Severity::Info => LevelFilter::INFO,
            Severity::Debug => LevelFilter::DEBUG,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Severity::None),
            "CRITICAL" => Ok(Severity::Critical),
            "ERROR" => Ok(Severity::Error),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            "DEBUG" => Ok(Severity::Debug),
            other => Err(format!(
                "unknown severity '{}', expected one of NONE, CRITICAL, ERROR, WARNING, INFO, DEBUG",
                other
            )),
        }
    }
}

/// Install a fmt subscriber at the given severity. Defaults to `Warning`
/// when the host does not raise it. Calling this twice is a no-op error at
/// the subscriber layer, never a panic.
pub fn init(severity: Severity) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(severity.filter())
        .with_target(false)
        .try_init();
}
