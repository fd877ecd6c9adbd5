//! Conversation memory
//!
//! Pairs the append-only turn log with a vector index of turn embeddings.
//! The log is the source of truth: a turn is committed once it is appended,
//! and the index is a derived view that can be backfilled with `rebuild`.
//! Layout: `<memory dir>/history.jsonl` and `<memory dir>/vectors.jsonl`.

pub mod history;
pub mod index;
pub mod turn;

use eyre::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ollama::Embedder;
use history::TurnLog;
use index::{IndexEntry, VectorIndex};
pub use turn::Turn;

pub const HISTORY_FILE: &str = "history.jsonl";
pub const VECTORS_FILE: &str = "vectors.jsonl";

/// A past turn selected as context, with its similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct Retrieved {
    pub turn: Turn,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemoryStats {
    pub turns: usize,
    pub indexed: usize,
    /// Log turns with no embedding
    pub missing: usize,
    /// Embeddings with no log turn
    pub orphaned: usize,
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RebuildReport {
    pub embedded: usize,
    pub failed: usize,
}

pub struct Memory<E> {
    dir: PathBuf,
    log: TurnLog,
    index: VectorIndex,
    turns: Vec<Turn>,
    embedder: E,
}

impl<E: Embedder> Memory<E> {
    /// Open (creating if needed) the memory stored in `dir`
    pub fn open(dir: &Path, embedder: E) -> Result<Self> {
        fs::create_dir_all(dir).context(format!("Failed to create memory directory {}", dir.display()))?;

        let log = TurnLog::new(dir.join(HISTORY_FILE));
        let turns = log.load()?;
        let index = VectorIndex::open(dir.join(VECTORS_FILE))?;

        log::info!(
            "Opened memory at {} ({} turns, {} vectors)",
            dir.display(),
            turns.len(),
            index.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            log,
            index,
            turns,
            embedder,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Persist a turn and index its embedding
    ///
    /// Fails only if the log append fails. An embedding failure leaves the
    /// turn logged but unindexed.
    pub fn record(&mut self, user: &str, bot: &str) -> Result<Turn> {
        let turn = Turn::new(user, bot);
        self.log.append(&turn)?;
        self.turns.push(turn.clone());

        match self.embedder.embed(&turn.embedding_text()) {
            Ok(vector) => {
                if let Err(e) = self.index.add(&turn.id, vector) {
                    log::warn!("Failed to index turn {}: {}", turn.id, e);
                }
            }
            Err(e) => {
                log::warn!("Could not embed turn {}, not adding to vector index: {}", turn.id, e);
            }
        }

        Ok(turn)
    }

    /// Up to `k` past turns most similar to `query`
    ///
    /// Never fails: embedding or search errors are logged and yield no context.
    pub fn retrieve(&self, query: &str, k: usize, min_similarity: Option<f32>) -> Vec<Retrieved> {
        match self.search(query, k, min_similarity) {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Skipping retrieval: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Like `retrieve`, but reports why a search could not run
    pub fn search(&self, query: &str, k: usize, min_similarity: Option<f32>) -> Result<Vec<Retrieved>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let k = k.min(self.index.len());

        let query_vector = self.embedder.embed(query).context("Could not embed query")?;
        let hits = self.index.search(&query_vector, k).context("Vector search failed")?;

        let results = hits
            .into_iter()
            .filter(|hit| min_similarity.is_none_or(|min| hit.score >= min))
            .filter_map(|hit| match self.turns.iter().find(|t| t.id == hit.id) {
                Some(turn) => Some(Retrieved {
                    turn: turn.clone(),
                    score: hit.score,
                }),
                None => {
                    log::debug!("Vector {} has no turn in the log", hit.id);
                    None
                }
            })
            .collect();

        Ok(results)
    }

    pub fn stats(&self) -> MemoryStats {
        let turn_ids: HashSet<&str> = self.turns.iter().map(|t| t.id.as_str()).collect();
        let indexed_ids: HashSet<&str> = self.index.ids().collect();

        MemoryStats {
            turns: self.turns.len(),
            indexed: self.index.len(),
            missing: turn_ids.difference(&indexed_ids).count(),
            orphaned: indexed_ids.difference(&turn_ids).count(),
            dimension: self.index.dimension(),
        }
    }

    /// Embed turns missing from the index, or every turn when `all` is set
    ///
    /// With `all`, the index is only replaced if every turn embeds.
    pub fn rebuild(&mut self, all: bool) -> Result<RebuildReport> {
        let mut report = RebuildReport::default();

        if all {
            let mut entries = Vec::with_capacity(self.turns.len());
            for turn in &self.turns {
                let vector = self
                    .embedder
                    .embed(&turn.embedding_text())
                    .context(format!("Failed to embed turn {}", turn.id))?;
                entries.push(IndexEntry {
                    id: turn.id.clone(),
                    embedding: vector,
                });
            }
            report.embedded = entries.len();
            self.index.replace_all(entries)?;
            log::info!("Re-embedded {} turns", report.embedded);
            return Ok(report);
        }

        let missing: Vec<Turn> = self
            .turns
            .iter()
            .filter(|t| !self.index.contains(&t.id))
            .cloned()
            .collect();

        for turn in missing {
            let result = self
                .embedder
                .embed(&turn.embedding_text())
                .and_then(|vector| self.index.add(&turn.id, vector));
            match result {
                Ok(()) => report.embedded += 1,
                Err(e) => {
                    log::warn!("Failed to backfill turn {}: {}", turn.id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!("Backfilled {} turns ({} failed)", report.embedded, report.failed);
        Ok(report)
    }

    /// Forget everything
    pub fn clear(&mut self) -> Result<()> {
        self.log.clear()?;
        self.index.clear()?;
        self.turns.clear();
        log::info!("Cleared memory at {}", self.dir.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::KeywordEmbedder;
    use super::*;
    use tempfile::TempDir;

    fn seeded<'a>(dir: &TempDir, embedder: &'a KeywordEmbedder) -> Memory<&'a KeywordEmbedder> {
        let mut memory = Memory::open(dir.path(), embedder).unwrap();
        memory
            .record("Hello, I am looking for information on Python.", "Python is a versatile language.")
            .unwrap();
        memory
            .record("Tell me about its use in web development.", "Web frameworks like Django and Flask.")
            .unwrap();
        memory.record("My name is Alex.", "Nice to meet you, Alex!").unwrap();
        memory
    }

    #[test]
    fn test_record_logs_and_indexes() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);

        let stats = memory.stats();
        assert_eq!(stats.turns, 3);
        assert_eq!(stats.indexed, 3);
        assert_eq!(stats.missing, 0);
        assert_eq!(stats.dimension, Some(7));
        assert!(dir.path().join(HISTORY_FILE).exists());
        assert!(dir.path().join(VECTORS_FILE).exists());
    }

    #[test]
    fn test_retrieve_most_relevant_first() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);

        let results = memory.retrieve("What is my name?", 2, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].turn.user, "My name is Alex.");
        assert!(results[0].score >= results[1].score);

        let results = memory.retrieve("Python web frameworks like flask", 1, None);
        assert_eq!(results[0].turn.bot, "Web frameworks like Django and Flask.");
    }

    #[test]
    fn test_retrieve_caps_k_at_index_size() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);
        assert_eq!(memory.retrieve("anything", 10, None).len(), 3);
    }

    #[test]
    fn test_retrieve_empty_index_skips_embedder() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = Memory::open(dir.path(), &embedder).unwrap();

        assert!(memory.retrieve("hello", 3, None).is_empty());
        assert_eq!(embedder.calls.get(), 0);
    }

    #[test]
    fn test_retrieve_min_similarity() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);

        let results = memory.retrieve("What is my name?", 3, Some(0.3));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].turn.user, "My name is Alex.");
    }

    #[test]
    fn test_retrieve_embed_failure_is_empty() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);

        embedder.fail.set(true);
        assert!(memory.retrieve("What is my name?", 3, None).is_empty());
    }

    #[test]
    fn test_search_reports_failures() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);

        embedder.fail.set(true);
        let err = memory.search("What is my name?", 3, None).unwrap_err();
        assert!(format!("{:#}", err).contains("embedding server unavailable"));

        embedder.fail.set(false);
        embedder.padding.set(1);
        let err = memory.search("What is my name?", 3, None).unwrap_err();
        assert!(format!("{:#}", err).contains("Dimension mismatch"));

        embedder.padding.set(0);
        assert_eq!(memory.search("What is my name?", 1, None).unwrap().len(), 1);
    }

    #[test]
    fn test_record_survives_embed_failure_and_rebuild_backfills() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let mut memory = seeded(&dir, &embedder);

        embedder.fail.set(true);
        let turn = memory.record("What's the weather?", "I can't check the weather.").unwrap();
        assert_eq!(memory.stats().missing, 1);

        embedder.fail.set(false);
        let report = memory.rebuild(false).unwrap();
        assert_eq!(report, RebuildReport { embedded: 1, failed: 0 });

        let stats = memory.stats();
        assert_eq!(stats.missing, 0);
        assert_eq!(stats.indexed, 4);

        let results = memory.retrieve("weather", 1, None);
        assert_eq!(results[0].turn.id, turn.id);
    }

    #[test]
    fn test_rebuild_all_keeps_index_on_failure() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let mut memory = seeded(&dir, &embedder);

        embedder.fail.set(true);
        assert!(memory.rebuild(true).is_err());
        assert_eq!(memory.stats().indexed, 3);

        embedder.fail.set(false);
        let report = memory.rebuild(true).unwrap();
        assert_eq!(report.embedded, 3);
        assert_eq!(memory.stats().indexed, 3);
    }

    #[test]
    fn test_embedding_model_switch_and_rebuild_all() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let mut memory = seeded(&dir, &embedder);

        embedder.padding.set(2);
        let turn = memory.record("What's the weather?", "I can't check the weather.").unwrap();
        let stats = memory.stats();
        assert_eq!(stats.turns, 4);
        assert_eq!(stats.indexed, 3);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.dimension, Some(7));
        assert!(memory.turns().iter().any(|t| t.id == turn.id));

        // queries now come back 9-d against a 7-d index
        assert!(memory.retrieve("weather", 3, None).is_empty());

        let report = memory.rebuild(true).unwrap();
        assert_eq!(report, RebuildReport { embedded: 4, failed: 0 });

        let stats = memory.stats();
        assert_eq!(stats.indexed, 4);
        assert_eq!(stats.missing, 0);
        assert_eq!(stats.dimension, Some(9));

        let results = memory.retrieve("weather", 1, None);
        assert_eq!(results[0].turn.id, turn.id);

        drop(memory);
        let reopened = Memory::open(dir.path(), &embedder).unwrap();
        assert_eq!(reopened.stats().dimension, Some(9));
    }

    #[test]
    fn test_backfill_counts_dimension_mismatch_as_failed() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let mut memory = seeded(&dir, &embedder);

        embedder.fail.set(true);
        memory.record("What's the weather?", "I can't check the weather.").unwrap();
        embedder.fail.set(false);
        embedder.padding.set(1);

        let report = memory.rebuild(false).unwrap();
        assert_eq!(report, RebuildReport { embedded: 0, failed: 1 });
        assert_eq!(memory.stats().missing, 1);
    }

    #[test]
    fn test_reopen_sees_persisted_turns() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        drop(seeded(&dir, &embedder));

        let memory = Memory::open(dir.path(), &embedder).unwrap();
        assert_eq!(memory.turns().len(), 3);
        let results = memory.retrieve("my name", 1, None);
        assert_eq!(results[0].turn.user, "My name is Alex.");
    }

    #[test]
    fn test_orphaned_vectors_skipped() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let memory = seeded(&dir, &embedder);
        drop(memory);
        TurnLog::new(dir.path().join(HISTORY_FILE)).clear().unwrap();

        let memory = Memory::open(dir.path(), &embedder).unwrap();
        let stats = memory.stats();
        assert_eq!(stats.turns, 0);
        assert_eq!(stats.orphaned, 3);
        assert!(memory.retrieve("my name", 3, None).is_empty());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new();
        let mut memory = seeded(&dir, &embedder);

        memory.clear().unwrap();
        let stats = memory.stats();
        assert_eq!(stats.turns, 0);
        assert_eq!(stats.indexed, 0);
    }
}
