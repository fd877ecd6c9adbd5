//! Flat vector index with cosine similarity search
//!
//! Entries live in `vectors.jsonl` keyed by turn id and are held in memory
//! for a linear scan. All vectors share the dimension of the first entry.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
}

/// A search result
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub score: f32,
}

pub struct VectorIndex {
    path: PathBuf,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Load the index at `path`; a missing file is an empty index
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut seen = HashSet::new();

        if path.exists() {
            let content =
                fs::read_to_string(&path).context(format!("Failed to read vector index {}", path.display()))?;

            for (i, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry = match serde_json::from_str::<IndexEntry>(line) {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Skipping malformed vector on line {} in {}: {}", i + 1, path.display(), e);
                        continue;
                    }
                };

                // same rules as `add`: unique ids, one non-zero dimension
                let dimension = entries.first().map(|e| e.embedding.len());
                if entry.embedding.is_empty() || dimension.is_some_and(|d| d != entry.embedding.len()) {
                    log::warn!(
                        "Skipping {}-d vector {} on line {} in {}",
                        entry.embedding.len(),
                        entry.id,
                        i + 1,
                        path.display()
                    );
                } else if !seen.insert(entry.id.clone()) {
                    log::warn!("Skipping duplicate vector {} on line {} in {}", entry.id, i + 1, path.display());
                } else {
                    entries.push(entry);
                }
            }
        }

        log::debug!("Opened vector index {} ({} entries)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by all vectors, `None` when empty
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            eyre::bail!("Cannot index an empty vector");
        }
        if let Some(dim) = self.dimension()
            && dim != vector.len()
        {
            eyre::bail!("Dimension mismatch: index holds {}-d vectors, got {}-d", dim, vector.len());
        }
        Ok(())
    }

    /// Add a vector under `id` and persist it
    pub fn add(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
        if self.contains(id) {
            eyre::bail!("Duplicate id in vector index: {}", id);
        }
        self.check_vector(&vector)?;

        let entry = IndexEntry {
            id: id.to_string(),
            embedding: vector,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create memory directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(format!("Failed to open vector index {}", self.path.display()))?;
        let json = serde_json::to_string(&entry).context("Failed to serialize vector")?;
        writeln!(file, "{}", json).context("Failed to write vector index")?;

        self.entries.push(entry);
        Ok(())
    }

    /// Top `k` entries by cosine similarity to `query`, most similar first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dim) = self.dimension()
            && dim != query.len()
        {
            eyre::bail!("Dimension mismatch: index holds {}-d vectors, query is {}-d", dim, query.len());
        }

        let mut hits: Vec<Hit> = self
            .entries
            .iter()
            .map(|e| Hit {
                id: e.id.clone(),
                score: cosine_similarity(query, &e.embedding),
            })
            .collect();

        // stable sort keeps insertion order among equal scores
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Replace every entry, writing through a temp file and rename
    pub fn replace_all(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut dim = None;
        for entry in &entries {
            if entry.embedding.is_empty() {
                eyre::bail!("Cannot index an empty vector for {}", entry.id);
            }
            match dim {
                None => dim = Some(entry.embedding.len()),
                Some(d) if d != entry.embedding.len() => {
                    eyre::bail!("Dimension mismatch for {}: expected {}-d", entry.id, d);
                }
                _ => {}
            }
        }

        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).context("Failed to create memory directory")?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).context("Failed to create temp index file")?;
        for entry in &entries {
            let json = serde_json::to_string(entry).context("Failed to serialize vector")?;
            writeln!(tmp, "{}", json).context("Failed to write temp index file")?;
        }
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .context(format!("Failed to replace vector index {}", self.path.display()))?;

        self.entries = entries;
        Ok(())
    }

    /// Drop all entries and truncate the file
    pub fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::write(&self.path, "").context(format!("Failed to clear {}", self.path.display()))?;
        }
        self.entries.clear();
        Ok(())
    }
}

/// Cosine similarity; 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}
