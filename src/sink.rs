use crate::id::NodeId;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// Per-run diagnostic sink.
///
/// Every line is prefixed with the zero-padded 5-digit id of the node it
/// speaks for, printed to stdout and appended to the diagnostic file (when
/// one is configured) under a single process-wide lock, so lines from
/// concurrent nodes never interleave and the file mirrors stdout.
#[derive(Debug)]
pub struct LogSink {
    file: Mutex<Option<File>>,
}

impl LogSink {
    /// Opens (and truncates) the diagnostic file.
    pub fn to_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            file: Mutex::new(Some(file)),
        })
    }

    /// Stdout-only sink, for in-process runs that don't want a file.
    pub fn stdout_only() -> Self {
        Self {
            file: Mutex::new(None),
        }
    }

    /// Logs one line on behalf of `id`.
    pub fn node(&self, id: NodeId, line: impl AsRef<str>) {
        let line = format!("[{:05}] {}", id, line.as_ref());
        let mut file = self.file.lock();
        println!("{}", line);
        if let Some(file) = file.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("error appending to the diagnostic file: {:?}", e);
            }
        }
    }
}
