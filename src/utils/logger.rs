// src/utils/logger.rs

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::io::Write;

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// Maps the `-q` / `-v` flags onto a level filter.
pub fn level_for(quiet: bool, verbose: bool) -> LevelFilter {
  if quiet {
    LevelFilter::Warn
  } else if verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Info
  }
}

fn icon(level: Level) -> &'static str {
  match level {
    Level::Error => "!!",
    Level::Warn => "¡!",
    Level::Info => " >",
    Level::Debug => " .",
    Level::Trace => "  ",
  }
}

impl log::Log for StderrLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      // Format: "    > Lattice parameter = 5.29177249 Angstrom"
      let mut stderr = std::io::stderr().lock();
      let _ = writeln!(stderr, "    {} {}", icon(record.level()), record.args());
    }
  }

  fn flush(&self) {
    let _ = std::io::stderr().flush();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_level_for_flags() {
    assert_eq!(level_for(false, false), LevelFilter::Info);
    assert_eq!(level_for(true, false), LevelFilter::Warn);
    assert_eq!(level_for(false, true), LevelFilter::Debug);
    // quiet wins
    assert_eq!(level_for(true, true), LevelFilter::Warn);
  }
}
