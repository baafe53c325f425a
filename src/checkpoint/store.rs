//! Append-only JSONL checkpoint store.
//!
//! Each line is one emitted [`QaPair`]. Read in full at startup to build the
//! skip-sets that make reruns incremental; appended to once per run, after
//! all tasks have been gathered, so the file only ever has a single writer.

use crate::models::{QaPair, QagenError, Result};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Work already recorded in the checkpoint store.
///
/// Any record carrying a `section_title` marks that title processed; any
/// record carrying a `code_snippet` marks its `(context, code)` pair
/// processed. Snippet records contribute to both sets.
#[derive(Debug, Default)]
pub struct SkipSets {
    pub titles: HashSet<String>,
    pub snippets: HashSet<(String, String)>,
}

impl SkipSets {
    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn contains_snippet(&self, context: &str, code: &str) -> bool {
        self.snippets
            .contains(&(context.to_string(), code.to_string()))
    }

    fn insert(&mut self, pair: &QaPair) {
        if let Some(title) = &pair.section_title {
            self.titles.insert(title.clone());
        }
        if let Some(code) = &pair.code_snippet {
            let context = pair.context.clone().unwrap_or_default();
            self.snippets.insert((context, code.clone()));
        }
    }
}

/// Append-only store of emitted Q/A pairs.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record and build the skip-sets.
    ///
    /// A missing file is an empty store. Unparseable lines are fatal; a
    /// corrupt checkpoint should be fixed or rotated, not silently skipped.
    pub fn load_skip_sets(&self) -> Result<SkipSets> {
        let mut sets = SkipSets::default();

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint file, starting fresh");
                return Ok(sets);
            }
            Err(e) => return Err(QagenError::io("opening checkpoint", e)),
        };

        let reader = BufReader::new(file);
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| QagenError::io("reading checkpoint", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let pair: QaPair = serde_json::from_str(&line).map_err(|e| {
                QagenError::ParseError(format!("Checkpoint line {}: {}", line_num + 1, e))
            })?;
            sets.insert(&pair);
        }

        info!(
            titles = sets.titles.len(),
            snippets = sets.snippets.len(),
            "Loaded checkpoint skip-sets"
        );
        Ok(sets)
    }

    /// Append pairs to the store, one JSON line each.
    pub fn append(&self, pairs: &[QaPair]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| QagenError::io("creating checkpoint dir", e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| QagenError::io("opening checkpoint for append", e))?;
        let mut writer = BufWriter::new(file);

        for pair in pairs {
            let json = serde_json::to_string(pair)
                .map_err(|e| QagenError::Internal(format!("Serializing pair: {e}")))?;
            writeln!(writer, "{json}").map_err(|e| QagenError::io("writing checkpoint", e))?;
        }

        writer
            .flush()
            .map_err(|e| QagenError::io("flushing checkpoint", e))?;

        debug!(count = pairs.len(), "Appended pairs to checkpoint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("qa.jsonl"));
        let sets = store.load_skip_sets().unwrap();
        assert!(sets.titles.is_empty());
        assert!(sets.snippets.is_empty());
    }

    #[test]
    fn round_trip_rebuilds_skip_sets() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("qa.jsonl"));

        let section_pair = QaPair::for_section("Intro", "Q?".into(), "A.".into());
        let snippet_pair = QaPair::for_snippet(
            Some("Usage".into()),
            "ctx".into(),
            "code".into(),
            "Q2?".into(),
            "A2.".into(),
        );
        store.append(&[section_pair.clone(), snippet_pair]).unwrap();

        let sets = store.load_skip_sets().unwrap();
        assert!(sets.contains_title("Intro"));
        assert!(sets.contains_title("Usage"));
        assert!(sets.contains_snippet("ctx", "code"));
        assert!(!sets.contains_snippet("other", "code"));

        // The persisted line deserializes back to an equal record.
        let content = std::fs::read_to_string(store.path()).unwrap();
        let first: QaPair = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first, section_pair);
    }

    #[test]
    fn append_is_cumulative() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("qa.jsonl"));

        store
            .append(&[QaPair::for_section("A", "q".into(), "a".into())])
            .unwrap();
        store
            .append(&[QaPair::for_section("B", "q".into(), "a".into())])
            .unwrap();

        let sets = store.load_skip_sets().unwrap();
        assert!(sets.contains_title("A"));
        assert!(sets.contains_title("B"));
    }

    #[test]
    fn corrupt_line_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qa.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let store = CheckpointStore::new(path);
        assert!(store.load_skip_sets().is_err());
    }
}
