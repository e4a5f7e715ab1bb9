#[macro_use]
extern crate anyhow;

use std::{fmt, io::BufRead, str::FromStr};

use anyhow::Context;
use clap::ArgMatches;

const LEVEL_NAMES: [&str; 6] = ["error", "warn", "info", "debug", "trace", "none"];

/// Minimum level of messages that will be logged
///
/// Levels follow stderrlog verbosity (0 = error .. 4 = trace); 5 turns logging off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel {
    pub level: usize,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.to_lowercase();
        LEVEL_NAMES
            .iter()
            .position(|x| *x == s)
            .map(|level| LogLevel { level })
            .ok_or_else(|| anyhow!("Unknown log level {}", s))
    }
}

impl LogLevel {
    pub fn is_none(&self) -> bool {
        self.level >= LEVEL_NAMES.len() - 1
    }

    pub fn get_level(&self) -> usize {
        if self.is_none() {
            0
        } else {
            self.level
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(LEVEL_NAMES.get(self.level).copied().unwrap_or("unknown"))
    }
}

/// Initialize logging from command line arguments
///
/// Expects the matches to define `loglevel`, `quiet` and `timestamp`
pub fn init_log(m: &ArgMatches) -> anyhow::Result<()> {
    let verbose = m
        .get_one::<LogLevel>("loglevel")
        .copied()
        .unwrap_or(LogLevel { level: 1 });
    let quiet = verbose.is_none() || m.get_flag("quiet");
    let ts = m
        .get_one::<stderrlog::Timestamp>("timestamp")
        .copied()
        .unwrap_or(stderrlog::Timestamp::Off);

    stderrlog::new()
        .quiet(quiet)
        .verbosity(verbose.get_level())
        .timestamp(ts)
        .init()
        .with_context(|| "Could not initialize logging")
}

/// Read in next line and split on tabs after trimming white space
pub fn get_next_line<'a, R: BufRead>(
    rdr: &mut R,
    buf: &'a mut String,
) -> anyhow::Result<Option<Vec<&'a str>>> {
    buf.clear();
    if rdr.read_line(buf)? == 0 {
        Ok(None)
    } else {
        Ok(Some(buf.trim().split('\t').collect()))
    }
}

/// Parse an unsigned integer that may contain thousands separators (i.e., 1,000,000)
pub fn parse_usize_with_commas(s: &str) -> anyhow::Result<usize> {
    let t = s.trim().replace(',', "");
    if t.is_empty() {
        Err(anyhow!("Empty coordinate"))
    } else {
        t.parse::<usize>()
            .with_context(|| format!("Error parsing coordinate {}", s))
    }
}
