//! Console panel mirroring the logging channel.
//!
//! Installed as the `tracing-subscriber` writer. Every formatted event becomes
//! one entry; events at `ERROR` level become error entries and are rendered
//! differently from ordinary log lines.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Log,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub kind: EntryKind,
    pub text: String,
}

impl ConsoleEntry {
    /// One rendered line, prefixed by its kind.
    pub fn render(&self) -> String {
        match self.kind {
            EntryKind::Log => format!("  log | {}", self.text),
            EntryKind::Error => format!("error | {}", self.text),
        }
    }
}

/// Shared list of console entries, optionally echoed to the terminal.
#[derive(Debug, Clone, Default)]
pub struct ConsolePanel {
    entries: Arc<Mutex<Vec<ConsoleEntry>>>,
    echo: bool,
}

impl ConsolePanel {
    /// Panel that also prints each entry as it arrives.
    pub fn echoing() -> Self {
        Self {
            entries: Arc::default(),
            echo: true,
        }
    }

    pub fn push(&self, kind: EntryKind, text: impl Into<String>) {
        let text = text.into();
        let entry = ConsoleEntry {
            kind,
            text: text.trim_end().to_string(),
        };
        if self.echo {
            let rendered = entry.render();
            match kind {
                EntryKind::Log => {
                    let _ = writeln!(io::stdout(), "{rendered}");
                }
                EntryKind::Error => {
                    let _ = writeln!(io::stderr(), "{rendered}");
                }
            }
        }
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.entries.lock().clone()
    }

    pub fn error_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.kind == EntryKind::Error)
            .count()
    }
}

/// Buffers one formatted event and hands it to the panel when dropped.
pub struct PanelWriter {
    panel: ConsolePanel,
    kind: EntryKind,
    buffer: Vec<u8>,
}

impl Write for PanelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PanelWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let text = String::from_utf8_lossy(&self.buffer).into_owned();
            self.panel.push(self.kind, text);
        }
    }
}

impl<'a> MakeWriter<'a> for ConsolePanel {
    type Writer = PanelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        PanelWriter {
            panel: self.clone(),
            kind: EntryKind::Log,
            buffer: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        let kind = if *meta.level() == Level::ERROR {
            EntryKind::Error
        } else {
            EntryKind::Log
        };
        PanelWriter {
            panel: self.clone(),
            kind,
            buffer: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_events_become_error_entries() {
        let panel = ConsolePanel::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .with_writer(panel.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user_op_hash = "0xabc", "user operation submitted");
            tracing::error!(action = "add_guardian", "action failed");
        });

        let entries = panel.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Log);
        assert!(entries[0].text.contains("0xabc"));
        assert_eq!(entries[1].kind, EntryKind::Error);
        assert!(entries[1].text.contains("action failed"));
        assert_eq!(panel.error_count(), 1);
    }

    #[test]
    fn rendering_distinguishes_kinds() {
        let log = ConsoleEntry {
            kind: EntryKind::Log,
            text: "hello".into(),
        };
        let error = ConsoleEntry {
            kind: EntryKind::Error,
            text: "boom".into(),
        };
        assert_ne!(&log.render()[..6], &error.render()[..6]);
        assert!(error.render().starts_with("error"));
    }
}
