//! core::metadata::schema
//!
//! The on-disk shape of `.pancake/stacks.json`: a schema-versioned envelope
//! holding one entry per tracked branch. Unlike the teacher's per-ref
//! metadata store, this is a single file written atomically as a whole
//! (see `store.rs`), because the spec fixes the persisted layout explicitly.
//!
//! Unknown fields on a branch entry are preserved round-trip rather than
//! rejected: a future `pk` version may add fields this version doesn't know
//! about, and re-saving the file must not drop them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::types::{BranchName, Oid, UtcTimestamp};
use crate::forge::PrId;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("unsupported schema version {0}, expected {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),

    #[error("invalid branch name in metadata: {0}")]
    InvalidBranchName(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("branch not found in metadata: {0}")]
    BranchNotFound(String),

    #[error("branch already tracked: {0}")]
    AlreadyTracked(String),
}

/// Whether, and how broadly, a branch is excluded from automatic restack
/// propagation. [SUPPLEMENT] cache-layer convenience; does not change
/// structural invariants I1–I5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FreezeState {
    Unfrozen,
    Frozen { scope: FreezeScope },
}

impl Default for FreezeState {
    fn default() -> Self {
        FreezeState::Unfrozen
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeScope {
    /// Only this branch is excluded from restack.
    Single,
    /// This branch and everything below it in the stack is excluded.
    DownstackInclusive,
}

/// Cached PR binding for a tracked branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrBinding {
    pub id: PrId,
    pub base: BranchName,
    pub head: BranchName,
    #[serde(default)]
    pub draft: bool,
    pub status: PrStatus,
    pub fetched_at: UtcTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    Open,
    Closed,
    Merged,
}

/// One tracked branch's entry in `.pancake/stacks.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchEntry {
    pub name: BranchName,
    pub parent: Option<BranchName>,
    #[serde(default)]
    pub children: Vec<BranchName>,
    pub head: Oid,
    /// The parent head this branch was last restacked onto; the upstream
    /// rebase boundary for the next restack.
    pub anchor: Oid,
    pub created_at: UtcTimestamp,
    #[serde(default)]
    pub pr: Option<PrBinding>,
    #[serde(default)]
    pub freeze: FreezeState,

    /// Fields this version of pancake does not recognize, preserved
    /// verbatim so a round-trip through an older binary never loses data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BranchEntry {
    pub fn new(name: BranchName, parent: Option<BranchName>, head: Oid, anchor: Oid) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            head,
            anchor,
            created_at: UtcTimestamp::now(),
            pr: None,
            freeze: FreezeState::Unfrozen,
            extra: Map::new(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        !matches!(self.freeze, FreezeState::Unfrozen)
    }
}

/// The full contents of `.pancake/stacks.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksFile {
    pub version: u32,
    pub main_branch: BranchName,
    pub branches: Vec<BranchEntry>,
}

impl StacksFile {
    pub fn new(main_branch: BranchName) -> Self {
        Self {
            version: SCHEMA_VERSION,
            main_branch,
            branches: Vec::new(),
        }
    }

    pub fn find(&self, name: &BranchName) -> Option<&BranchEntry> {
        self.branches.iter().find(|b| &b.name == name)
    }

    pub fn find_mut(&mut self, name: &BranchName) -> Option<&mut BranchEntry> {
        self.branches.iter_mut().find(|b| &b.name == name)
    }

    pub fn insert(&mut self, entry: BranchEntry) -> Result<(), MetadataError> {
        if self.find(&entry.name).is_some() {
            return Err(MetadataError::AlreadyTracked(entry.name.to_string()));
        }
        self.branches.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &BranchName) -> Result<BranchEntry, MetadataError> {
        let idx = self
            .branches
            .iter()
            .position(|b| &b.name == name)
            .ok_or_else(|| MetadataError::BranchNotFound(name.to_string()))?;
        Ok(self.branches.remove(idx))
    }
}

/// Parse `.pancake/stacks.json` contents, validating the schema version.
pub fn parse_stacks_file(raw: &str) -> Result<StacksFile, MetadataError> {
    let value: Value = serde_json::from_str(raw)?;
    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    if version != SCHEMA_VERSION {
        return Err(MetadataError::UnsupportedVersion(version));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> Oid {
        Oid::new(s.to_string() + &"0".repeat(40 - s.len())).unwrap()
    }

    #[test]
    fn roundtrip_preserves_unknown_fields() {
        let mut file = StacksFile::new(BranchName::new("main").unwrap());
        let mut entry = BranchEntry::new(
            BranchName::new("feature").unwrap(),
            Some(BranchName::new("main").unwrap()),
            oid("abc"),
            oid("abc"),
        );
        entry.extra.insert("future_field".into(), Value::String("xyz".into()));
        file.insert(entry).unwrap();

        let json = serde_json::to_string(&file).unwrap();
        let parsed = parse_stacks_file(&json).unwrap();
        let got = parsed.find(&BranchName::new("feature").unwrap()).unwrap();
        assert_eq!(got.extra.get("future_field").unwrap(), "xyz");
    }

    #[test]
    fn rejects_unsupported_version() {
        let raw = r#"{"version":99,"main_branch":"main","branches":[]}"#;
        assert!(matches!(
            parse_stacks_file(raw),
            Err(MetadataError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn insert_duplicate_rejected() {
        let mut file = StacksFile::new(BranchName::new("main").unwrap());
        let entry = BranchEntry::new(BranchName::new("feature").unwrap(), None, oid("abc"), oid("abc"));
        file.insert(entry.clone()).unwrap();
        assert!(file.insert(entry).is_err());
    }
}
