//! core::metadata::store
//!
//! Durable storage for `.pancake/stacks.json`. Writes are atomic: a
//! temporary file is written and fsynced in the same directory, then
//! renamed over the target, so a crash mid-write never leaves a partially
//! written file in place. Grounded in the teacher's `core::ops::lock`
//! durability discipline, applied here to the metadata file itself rather
//! than to a lock payload.
//!
//! On successful write, `parent`/`anchor` for every branch are mirrored
//! into `refs/notes/pancake` (one note per branch tip), so the Reconciler's
//! R4 rule can recover metadata if `.pancake/stacks.json` is lost but the
//! repository's refs and notes survive.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::{parse_stacks_file, BranchEntry, MetadataError, StacksFile};
use crate::core::types::BranchName;
use crate::git::Git;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("git error while mirroring metadata: {0}")]
    Git(String),
}

pub const STACKS_FILENAME: &str = "stacks.json";

/// File-backed store for the stack metadata, rooted at `.pancake/` inside
/// a repository working directory.
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(pancake_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: pancake_dir.into().join(STACKS_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<StacksFile, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(parse_stacks_file(&raw)?)
    }

    /// Atomically replace the file's contents: write to a sibling temp file,
    /// flush and sync it, then rename over the target. The rename is atomic
    /// on the same filesystem, so readers never observe a partial write.
    pub fn save(&self, file: &StacksFile) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| std::io::Error::other("metadata path has no parent directory"))?;
        fs::create_dir_all(dir)?;

        let tmp_path = dir.join(format!(".{STACKS_FILENAME}.tmp-{}", std::process::id()));
        let json = serde_json::to_string_pretty(file).map_err(MetadataError::from)?;
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(json.as_bytes())?;
            tmp.write_all(b"\n")?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Write `file` to disk, then mirror parent/anchor for every branch into
    /// `refs/notes/pancake` (R4: the recovery-of-last-resort path).
    pub fn save_and_mirror(&self, file: &StacksFile, git: &Git) -> Result<(), StoreError> {
        self.save(file)?;
        for entry in &file.branches {
            if let Err(e) = mirror_note(git, entry) {
                tracing::warn!(branch = %entry.name, error = %e, "failed to mirror metadata note");
            }
        }
        Ok(())
    }
}

fn mirror_note(git: &Git, entry: &BranchEntry) -> Result<(), StoreError> {
    let note_body = serde_json::json!({
        "parent": entry.parent.as_ref().map(|p| p.as_str()),
        "anchor": entry.anchor.as_str(),
    })
    .to_string();
    git.write_note("pancake", entry.head.as_str(), &note_body)
        .map_err(|e| StoreError::Git(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Oid;

    fn oid() -> Oid {
        Oid::new("abc123def4567890abc123def4567890abc12345").unwrap()
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let mut file = StacksFile::new(BranchName::new("main").unwrap());
        file.insert(BranchEntry::new(
            BranchName::new("feature").unwrap(),
            Some(BranchName::new("main").unwrap()),
            oid(),
            oid(),
        ))
        .unwrap();

        store.save(&file).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.branches.len(), 1);
        assert_eq!(loaded.branches[0].name, BranchName::new("feature").unwrap());
    }

    #[test]
    fn save_is_atomic_no_tmp_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let file = StacksFile::new(BranchName::new("main").unwrap());
        store.save(&file).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
