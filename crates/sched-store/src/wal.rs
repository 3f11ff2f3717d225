// SPDX-License-Identifier: MIT

//! Append-only, line-delimited JSON write-ahead log of [`Event`]s.
//!
//! Each line is one JSON-encoded event. A corrupt or non-UTF-8 line halts
//! replay at that point rather than erroring the whole log: `Wal::open`
//! rotates the existing file to `.bak` and starts fresh, preserving
//! whatever valid entries it could read back out of it first.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use sched_core::Event;
use thiserror::Error;

use crate::backup::rotate_bak_path;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One logged operation: its monotonic sequence number and the event it
/// recorded.
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Number of appended-but-unflushed entries that forces a flush on the
/// next write, independent of any time-based flush policy a caller layers
/// on top.
const FLUSH_THRESHOLD: usize = 100;

pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
    processed_seq: u64,
    read_seq: u64,
    pending_since_flush: usize,
}

impl Wal {
    /// Open (creating if absent) the WAL at `path`, recovering from
    /// corruption by preserving every entry readable up to the first bad
    /// line and rotating the original file to `.bak`.
    ///
    /// `processed_seq` seeds the "already applied to a snapshot" cursor so
    /// [`Wal::next_unprocessed`] skips entries the caller already folded
    /// into a materialized snapshot.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();

        let (valid_entries, was_corrupt) = if path.exists() {
            Self::read_valid_entries(&path)?
        } else {
            (Vec::new(), false)
        };

        if was_corrupt {
            let bak = rotate_bak_path(&path);
            tracing::warn!(path = %path.display(), bak = %bak.display(), "WAL corruption detected, rotating to backup");
            let _ = fs::rename(&path, &bak);
        }

        let write_seq = valid_entries.last().map(|e: &WalEntry| e.seq).unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wal = Self {
            path,
            file,
            write_seq: 0,
            processed_seq,
            read_seq: processed_seq,
            pending_since_flush: 0,
        };

        if was_corrupt {
            for entry in &valid_entries {
                wal.write_entry(entry.seq, &entry.event)?;
            }
            wal.flush()?;
        }
        wal.write_seq = write_seq;
        Ok(wal)
    }

    /// Read every syntactically valid line from `path`, stopping at (and
    /// discarding) the first line that fails to parse as UTF-8 JSON.
    fn read_valid_entries(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
        let bytes = fs::read(path)?;
        let mut entries = Vec::new();
        let mut corrupt = false;
        let reader = BufReader::new(&bytes[..]);
        for line in reader.split(b'\n') {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let text = match std::str::from_utf8(&line) {
                Ok(t) => t,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };
            match serde_json::from_str::<WalLine>(text) {
                Ok(parsed) => entries.push(WalEntry { seq: parsed.seq, event: parsed.event }),
                Err(_) => {
                    corrupt = true;
                    break;
                }
            }
        }
        Ok((entries, corrupt))
    }

    fn write_entry(&mut self, seq: u64, event: &Event) -> Result<(), WalError> {
        let line = WalLine { seq, event: event.clone() };
        let mut json = serde_json::to_vec(&line)?;
        json.push(b'\n');
        self.file.write_all(&json)?;
        Ok(())
    }

    /// Append `event`, returning its assigned sequence number. Buffered
    /// until [`Wal::flush`] or the internal threshold is crossed.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        self.write_entry(seq, event)?;
        self.write_seq = seq;
        self.pending_since_flush += 1;
        if self.pending_since_flush >= FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.pending_since_flush = 0;
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.pending_since_flush >= FLUSH_THRESHOLD
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Mark every entry up to and including `seq` as folded into a
    /// snapshot.
    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// Read and return the next entry after the internal read cursor,
    /// advancing the cursor. Returns `None` at end-of-log or on hitting a
    /// corrupt line (callers should not treat that as fatal: a tailing
    /// writer may still be mid-flush).
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        let all = self.read_all_lines()?;
        let next = all.into_iter().find(|e| e.seq > self.read_seq);
        if let Some(entry) = &next {
            self.read_seq = entry.seq;
        }
        Ok(next)
    }

    /// All entries with `seq > after`, stopping at the first corrupt or
    /// non-UTF-8 line.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let all = self.read_all_lines()?;
        Ok(all.into_iter().filter(|e| e.seq > after).collect())
    }

    fn read_all_lines(&self) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = Self::read_valid_entries(&self.path)?;
        Ok(entries)
    }

    /// Drop entries with `seq < keep_from` by rewriting the file. Used
    /// after a snapshot makes them redundant.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        let all = self.read_all_lines()?;
        let kept: Vec<_> = all.into_iter().filter(|e| e.seq >= keep_from).collect();
        self.flush()?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in &kept {
                let line = WalLine { seq: entry.seq, event: entry.event.clone() };
                let mut json = serde_json::to_vec(&line)?;
                json.push(b'\n');
                tmp.write_all(&json)?;
            }
            tmp.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct WalLine {
    seq: u64,
    event: Event,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
