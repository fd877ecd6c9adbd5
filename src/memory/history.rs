//! Append-only conversation log
//!
//! One JSON object per line in `history.jsonl`. Lines are only ever appended,
//! so file order is conversation order.

use chrono::NaiveDate;
use eyre::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::turn::Turn;

pub struct TurnLog {
    path: PathBuf,
}

impl TurnLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one turn as a single JSONL line
    pub fn append(&self, turn: &Turn) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create memory directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(format!("Failed to open history file {}", self.path.display()))?;

        let json = serde_json::to_string(turn).context("Failed to serialize turn")?;
        writeln!(file, "{}", json).context(format!("Failed to write history file {}", self.path.display()))?;

        log::debug!("Appended turn {} to {}", turn.id, self.path.display());
        Ok(())
    }

    /// Load every turn in file order, skipping malformed lines
    pub fn load(&self) -> Result<Vec<Turn>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .context(format!("Failed to read history file {}", self.path.display()))?;

        let mut turns = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Turn>(line) {
                Ok(turn) => turns.push(turn),
                Err(e) => {
                    log::warn!("Skipping malformed line {} in {}: {}", i + 1, self.path.display(), e);
                }
            }
        }
        Ok(turns)
    }

    /// Last `count` turns, newest first
    pub fn recent(&self, count: usize) -> Result<Vec<Turn>> {
        let turns = self.load()?;
        Ok(turns.into_iter().rev().take(count).collect())
    }

    /// Turns whose user or bot text matches `pattern`, newest first
    pub fn query(&self, pattern: &str, since: Option<NaiveDate>, limit: usize) -> Result<Vec<Turn>> {
        let regex = regex::Regex::new(pattern).context("Invalid regex pattern")?;

        let matches = self
            .load()?
            .into_iter()
            .rev()
            .filter(|turn| match since {
                Some(since_date) => turn.local_date().is_some_and(|date| date >= since_date),
                None => true,
            })
            .filter(|turn| regex.is_match(&turn.user) || regex.is_match(&turn.bot))
            .take(limit)
            .collect();

        Ok(matches)
    }

    /// Truncate the log
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::write(&self.path, "").context(format!("Failed to clear {}", self.path.display()))?;
        }
        Ok(())
    }
}
