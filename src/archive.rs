//! Durable message history
//!
//! Every delivered message is appended to a plain text side file, one line per
//! entry:
//!
//! ```text
//! [[INFO]] <message> (<credit>)
//! [[INFO]] <message>              (no credit)
//! ```
//!
//! Writes happen on a dedicated thread fed by an unbounded channel so the tick
//! only pays for a send.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error};

use crate::error::Result;
use crate::protocol::INFO;
use crate::sinks::MessageArchive;

/// One archived message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub message: String,
    pub credit: String,
}

/// Format one entry, newline included
pub fn format_entry(message: &str, credit: &str) -> String {
    if credit.trim().is_empty() {
        format!("{} {}\n", INFO, message)
    } else {
        format!("{} {} ({})\n", INFO, message, credit)
    }
}

/// Parse one line of the side file.
///
/// A trailing parenthetical is read as the credit, so a message that itself
/// ends in parentheses and had no credit comes back split.
pub fn parse_entry(line: &str) -> Option<ArchiveEntry> {
    let body = line.trim().strip_prefix(INFO)?.trim();
    if body.is_empty() {
        return None;
    }

    if let Some(open) = trailing_group(body) {
        if body[..open].ends_with(' ') {
            let message = body[..open].trim();
            let credit = &body[open + 1..body.len() - 1];
            if !message.is_empty() {
                return Some(ArchiveEntry {
                    message: message.to_string(),
                    credit: credit.to_string(),
                });
            }
        }
    }

    Some(ArchiveEntry {
        message: body.to_string(),
        credit: String::new(),
    })
}

/// Byte offset of the `(` matching a trailing `)`
fn trailing_group(body: &str) -> Option<usize> {
    if !body.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    for (idx, ch) in body.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// All entries in the side file, oldest first. A missing file is empty history.
pub fn read_history(path: &Path) -> Result<Vec<ArchiveEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content.lines().filter_map(parse_entry).collect())
}

/// Truncate the side file
pub fn clear(path: &Path) -> Result<()> {
    if path.exists() {
        File::create(path)?;
    }
    Ok(())
}

/// Append-only writer backed by a background thread
#[derive(Debug)]
pub struct MessageLog {
    path: PathBuf,
    tx: Option<UnboundedSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl MessageLog {
    /// Open (creating if needed) the side file and start the writer thread
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let shown = path.display().to_string();
        let worker = thread::Builder::new()
            .name("kiosk-archive".into())
            .spawn(move || {
                while let Some(entry) = rx.blocking_recv() {
                    if let Err(e) = file.write_all(entry.as_bytes()) {
                        error!(path = %shown, error = %e, "failed to archive message");
                    }
                }
                let _ = file.flush();
                debug!(path = %shown, "archive writer stopped");
            })?;

        Ok(Self {
            path,
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one entry for writing
    pub fn record(&self, message: &str, credit: &str) {
        if message.is_empty() {
            return;
        }
        if let Some(tx) = &self.tx {
            if tx.send(format_entry(message, credit)).is_err() {
                error!(path = %self.path.display(), "archive writer is gone, message lost");
            }
        }
    }

    /// Flush everything queued and stop the writer
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        // Closing the channel ends the writer loop once the backlog is written
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("archive writer panicked");
            }
        }
    }
}

impl MessageArchive for MessageLog {
    fn append(&mut self, message: &str, credit: &str) {
        self.record(message, credit);
    }
}

impl Drop for MessageLog {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_entry() {
        assert_eq!(format_entry("Hi", "by Aria｜Test"), "[[INFO]] Hi (by Aria｜Test)\n");
        assert_eq!(format_entry("Hi", ""), "[[INFO]] Hi\n");
    }

    #[test]
    fn test_parse_entry() {
        assert_eq!(
            parse_entry("[[INFO]] Hi there (by Aria｜Test)"),
            Some(ArchiveEntry {
                message: "Hi there".into(),
                credit: "by Aria｜Test".into()
            })
        );
        assert_eq!(
            parse_entry("[[INFO]] Plain"),
            Some(ArchiveEntry {
                message: "Plain".into(),
                credit: String::new()
            })
        );
        assert_eq!(
            parse_entry("[[INFO]] Hi (by Aria｜Studio (North) Dia)"),
            Some(ArchiveEntry {
                message: "Hi".into(),
                credit: "by Aria｜Studio (North) Dia".into()
            })
        );
        assert_eq!(parse_entry("random text"), None);
        assert_eq!(parse_entry("[[INFO]]   "), None);
    }

    #[test]
    fn test_credit_with_parentheses_reads_back() {
        let line = format_entry("Hi", "Studio (North) Dia");
        assert_eq!(
            parse_entry(&line),
            Some(ArchiveEntry {
                message: "Hi".into(),
                credit: "Studio (North) Dia".into()
            })
        );

        let line = format_entry("Look (closer)", "by Aria｜Test");
        assert_eq!(parse_entry(&line).map(|e| e.message), Some("Look (closer)".into()));
    }

    #[test]
    fn test_writer_appends_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Message.txt");

        let mut log = MessageLog::open(&path).unwrap();
        log.append("First", "by Aria｜Test");
        log.append("Second", "");
        log.append("", "ignored");
        log.close();

        let history = read_history(&path).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].credit, "by Aria｜Test");
        assert_eq!(history[1].message, "Second");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("Message.txt");

        MessageLog::open(&path).unwrap().record("one", "");
        MessageLog::open(&path).unwrap().record("two", "");

        let messages: Vec<_> = read_history(&path)
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[test]
    fn test_clear_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Message.txt");
        assert!(read_history(&path).unwrap().is_empty());

        fs::write(&path, "[[INFO]] old\n").unwrap();
        clear(&path).unwrap();
        assert!(read_history(&path).unwrap().is_empty());
    }
}
