// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! Progress upload history, persisted as an append-only JSONL log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::Result;

/// A single progress upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: String,
    pub filename: String,
    pub image_url: String,
    pub uploaded_at: DateTime<Utc>,
}

impl ProgressEntry {
    pub fn new(filename: String, image_url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename,
            image_url,
            uploaded_at: Utc::now(),
        }
    }
}

/// Thread-safe progress history store.
///
/// Appends go straight to the JSONL file under a mutex, so concurrent
/// handlers cannot interleave writes and entries survive restarts.
pub struct ProgressHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProgressHistory {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append an entry to the history
    pub fn append(&self, entry: &ProgressEntry) -> Result<()> {
        let _guard = self.lock.lock().expect("history lock poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all entries, oldest first. Corrupt lines are skipped.
    pub fn read_all(&self) -> Result<Vec<ProgressEntry>> {
        let _guard = self.lock.lock().expect("history lock poisoned");
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Number of recorded entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
