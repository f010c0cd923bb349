/// File-backed collaborators for the binary.
///
/// `ReplayProvider` reads one JSON snapshot per line:
///
///   {"hp_percent": 84.0, "mana_percent": 61.5, "has_target": true, "timestamp_ms": 1200}
///
/// Blank lines are skipped, unparseable lines become transient failures, and
/// end-of-file closes the source. `LoggingExecutor` stands in for the OS input
/// layer and only records what it would have pressed.
use crate::{
    controller::{InputExecutor, SnapshotProvider},
    error::{DispatchError, SnapshotError},
    state::StateSnapshot,
};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

pub struct ReplayProvider<B> {
    lines:   Lines<B>,
    line_no: usize,
}

impl ReplayProvider<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening snapshot replay {}", path.display()))?;
        tracing::info!("Replaying snapshots from {:?}", path);
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<B: BufRead> ReplayProvider<B> {
    pub fn from_reader(reader: B) -> Self {
        Self { lines: reader.lines(), line_no: 0 }
    }
}

impl<B: BufRead> SnapshotProvider for ReplayProvider<B> {
    fn read(&mut self) -> Result<StateSnapshot, SnapshotError> {
        loop {
            let line = match self.lines.next() {
                None            => return Err(SnapshotError::Closed),
                Some(Err(e))    => return Err(SnapshotError::Unavailable(e.to_string())),
                Some(Ok(line))  => line,
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line).map_err(|e| {
                SnapshotError::Unavailable(format!("line {}: {}", self.line_no, e))
            });
        }
    }
}

/// Records key presses instead of sending them.
#[derive(Debug, Default)]
pub struct LoggingExecutor {
    pub keys_sent: u64,
    pub history:   Vec<(String, String)>,
}

impl InputExecutor for LoggingExecutor {
    fn dispatch(&mut self, action_id: &str, hotkey: &str) -> Result<(), DispatchError> {
        if hotkey.trim().is_empty() {
            return Err(DispatchError {
                action_id: action_id.to_owned(),
                reason:    "empty hotkey".to_owned(),
            });
        }
        tracing::debug!("press {} for {}", hotkey, action_id);
        self.keys_sent += 1;
        self.history.push((action_id.to_owned(), hotkey.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn reads_lines_then_closes() {
        let data = "{\"hp_percent\":90,\"mana_percent\":50,\"has_target\":true}\n\n{\"hp_percent\":0,\"mana_percent\":0}\n";
        let mut p = ReplayProvider::from_reader(Cursor::new(data));

        let first = p.read().unwrap();
        assert_eq!(first.hp_percent, 90.0);
        assert!(first.has_target);
        assert_eq!(p.read().unwrap().hp_percent, 0.0);
        assert_eq!(p.read(), Err(SnapshotError::Closed));
    }

    #[test]
    fn bad_line_is_transient() {
        let data = "not json\n{\"hp_percent\":50,\"mana_percent\":50}\n";
        let mut p = ReplayProvider::from_reader(Cursor::new(data));

        match p.read() {
            Err(SnapshotError::Unavailable(msg)) => assert!(msg.starts_with("line 1")),
            other => panic!("expected transient failure, got {:?}", other),
        }
        assert_eq!(p.read().unwrap().hp_percent, 50.0);
    }

    #[test]
    fn opens_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "{{\"hp_percent\":75,\"mana_percent\":20,\"timestamp_ms\":10}}").unwrap();
        f.flush().unwrap();

        let mut p = ReplayProvider::open(f.path()).unwrap();
        assert_eq!(p.read().unwrap().timestamp_ms, 10);
        assert_eq!(p.read(), Err(SnapshotError::Closed));
    }

    #[test]
    fn logging_executor_records() {
        let mut exec = LoggingExecutor::default();
        exec.dispatch("heal", "F1").unwrap();
        assert_eq!(exec.keys_sent, 1);
        assert_eq!(exec.history, vec![("heal".to_owned(), "F1".to_owned())]);
        assert!(exec.dispatch("x", " ").is_err());
    }
}
