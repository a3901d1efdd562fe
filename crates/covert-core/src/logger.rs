//! Event Log
//!
//! The append-only diplomatic event stream and its JSONL writer.

use covert_events::{generate_event_id, DiplomaticEvent, EventId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Ordered in-memory record of every event, with sequential ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<DiplomaticEvent>,
    next_event_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    /// Assigns the next id and appends; returns the stored copy.
    pub fn append(&mut self, mut event: DiplomaticEvent) -> &DiplomaticEvent {
        // Default-constructed logs start at zero
        self.next_event_id = self.next_event_id.max(1);
        event.event_id = generate_event_id(self.next_event_id);
        self.next_event_id += 1;
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[DiplomaticEvent] {
        &self.events
    }

    /// Events appended at or after `index`.
    pub fn events_since(&self, index: usize) -> &[DiplomaticEvent] {
        &self.events[index.min(self.events.len())..]
    }

    pub fn find(&self, event_id: &EventId) -> Option<&DiplomaticEvent> {
        self.events.iter().find(|e| &e.event_id == event_id)
    }

    pub fn scandals(&self) -> impl Iterator<Item = &DiplomaticEvent> {
        self.events.iter().filter(|e| e.scandal)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Writes events as JSON lines
pub struct EventLogger {
    writer: Option<Box<dyn Write>>,
    event_count: u64,
}

impl EventLogger {
    /// Create a logger writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(writer: impl Write + 'static) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            event_count: 0,
        }
    }

    /// Create a logger that discards events (for testing)
    pub fn null() -> Self {
        Self {
            writer: None,
            event_count: 0,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn log(&mut self, event: &DiplomaticEvent) -> std::io::Result<()> {
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(event)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    pub fn log_batch(&mut self, events: &[DiplomaticEvent]) -> std::io::Result<()> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush event logger: {}", e);
        }
    }
}

/// Reads a JSONL event file back.
pub fn read_events(path: impl AsRef<Path>) -> std::io::Result<Vec<DiplomaticEvent>> {
    use std::io::BufRead;

    let reader = std::io::BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(DiplomaticEvent::from_jsonl(&line)?);
    }
    Ok(events)
}
