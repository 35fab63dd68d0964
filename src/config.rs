use crate::RunResult;
use color_eyre::eyre::{eyre, WrapErr};
use std::path::Path;
use std::time::Duration;

/// Node counts must fit in an unsigned 16-bit integer and a ring needs at
/// least one node.
const MAX_NODES: i64 = u16::MAX as i64;

/// Run configuration: one outbound-send delay per node, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    delays: Vec<Duration>,
}

impl Config {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Number of nodes in the ring.
    pub fn n(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Parses an input file: the first line is the node count, followed by
    /// one non-negative delay (in seconds) per node. Every error names the
    /// 1-based line it refers to.
    pub fn from_file(path: impl AsRef<Path>) -> RunResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(eyre!("input file '{}' does not exist", path.display()));
        }
        if !path.is_file() {
            return Err(eyre!(
                "input path '{}' is not a regular file",
                path.display()
            ));
        }
        let contents = std::fs::read_to_string(path).wrap_err_with(|| {
            format!("failed to read input file '{}'", path.display())
        })?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> RunResult<Self> {
        let mut lines = contents.lines();

        let first = lines
            .next()
            .ok_or_else(|| eyre!("failed to read the node count at line 1"))?;
        let count: i64 = first.trim().parse().map_err(|_| {
            eyre!("failed to parse the node count at line 1: '{}'", first)
        })?;
        if count < 1 || count > MAX_NODES {
            return Err(eyre!(
                "node count at line 1 must be in [1, {}], got {}",
                MAX_NODES,
                count
            ));
        }

        let mut delays = Vec::with_capacity(count as usize);
        for index in 0..count {
            // line numbers are 1-based and the count occupies line 1
            let line_number = index + 2;
            let line = lines.next().ok_or_else(|| {
                eyre!(
                    "missing delay for node {} expected at line {}",
                    index,
                    line_number
                )
            })?;
            let seconds: f64 = line.trim().parse().map_err(|_| {
                eyre!(
                    "failed to parse a floating-point delay at line {}: '{}'",
                    line_number,
                    line
                )
            })?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(eyre!(
                    "delay at line {} must be a non-negative number, got '{}'",
                    line_number,
                    line
                ));
            }
            delays.push(Duration::from_secs_f64(seconds));
        }

        Ok(Self { delays })
    }
}
