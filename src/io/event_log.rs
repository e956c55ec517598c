//! JSONL mission event log for real-time observability.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::mission::MissionEvent;

/// Writes one JSON line per mission event, flushing after each line so
/// external observers can tail the file while the mission runs.
pub struct EventLogWriter {
    writer: BufWriter<File>,
}

impl EventLogWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create event log dir {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("create event log {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, event: &MissionEvent) -> Result<()> {
        let mut line = serde_json::to_string(event).context("serialize mission event")?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .context("write mission event")?;
        self.writer.flush().context("flush mission event")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::MissionEvent;

    #[test]
    fn append_writes_one_json_line_per_event() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        let mut log = EventLogWriter::create(&path).expect("create");

        log.append(&MissionEvent::MissionCreated {
            mission_id: "m-1".to_string(),
            goal: "goal".to_string(),
        })
        .expect("append");
        log.append(&MissionEvent::MissionCompleted {
            mission_id: "m-1".to_string(),
        })
        .expect("append");

        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(first["event"], "mission_created");
        assert_eq!(first["mission_id"], "m-1");
    }
}
