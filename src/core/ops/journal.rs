//! core::ops::journal
//!
//! The append-only `.pancake/journal.log`: one JSON object per line,
//! recording every step of the currently (or most recently) executing
//! operation. Grounded in the teacher's `Journal`/`OpId`/`OpPhase`/`StepKind`
//! vocabulary (`core/ops/journal.rs`), adapted to the spec's phase set and
//! the spec's fixed one-line-per-entry persisted format — the teacher
//! instead writes one JSON file per operation id plus a separate marker
//! file, which this module does not replicate.
//!
//! At most one entry may be `Open` or `Suspended` at any time: a new
//! operation cannot begin while a previous one is unresolved, and the CLI
//! boundary surfaces that as "an operation is already in progress, run
//! `pk --continue` or `pk --abort`".

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::types::{BranchName, Oid, RefName, UtcTimestamp};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed journal entry: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("an operation is already in progress: {op_id} ({command})")]
    OperationInProgress { op_id: String, command: String },

    #[error("no operation is in progress")]
    NoOperationInProgress,
}

/// Uniquely identifies one Operation Engine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(String);

impl OpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a journaled operation, per spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPhase {
    /// Executing; no conflict encountered yet.
    Open,
    /// Stopped at a conflict; resumable via `--continue` or `--abort`.
    Suspended,
    /// Finished successfully; metadata committed.
    Committed,
    /// Rolled back, either by `--abort` or by the engine itself.
    Aborted,
}

impl OpPhase {
    pub fn is_resolved(&self) -> bool {
        matches!(self, OpPhase::Committed | OpPhase::Aborted)
    }

    pub fn is_resumable(&self) -> bool {
        matches!(self, OpPhase::Suspended)
    }
}

/// One step recorded in the journal. Pre-images are captured before the
/// step executes, so `undo`/`--abort` can restore prior state without
/// re-deriving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    RefUpdate {
        refname: RefName,
        old_oid: Option<Oid>,
        new_oid: Oid,
    },
    RebaseOnto {
        branch: BranchName,
        upstream: Oid,
        new_base: Oid,
    },
    MetadataSnapshot {
        /// The full `.pancake/stacks.json` contents before this operation
        /// touched it, for one-level undo.
        pre_image: String,
    },
    ForgeCall {
        description: String,
    },
    Checkpoint {
        name: String,
    },
}

/// A single line of `.pancake/journal.log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub op_id: OpId,
    pub command: String,
    pub phase: OpPhase,
    pub step: Option<StepKind>,
    pub timestamp: UtcTimestamp,
}

pub const JOURNAL_FILENAME: &str = "journal.log";

/// Handle onto `.pancake/journal.log`, opened for append.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(pancake_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: pancake_dir.into().join(JOURNAL_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every entry currently on disk, in file order.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>, JournalError> {
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
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// The most recent entry for each op id, reduced to that op's current
    /// phase — used to find an in-progress operation at process start.
    pub fn current_op(&self) -> Result<Option<(OpId, String, OpPhase)>, JournalError> {
        let entries = self.read_all()?;
        let mut latest: Option<(OpId, String, OpPhase)> = None;
        for entry in entries {
            latest = Some((entry.op_id, entry.command, entry.phase));
        }
        match latest {
            Some((id, cmd, phase)) if !phase.is_resolved() => Ok(Some((id, cmd, phase))),
            _ => Ok(None),
        }
    }

    /// Begin a new operation. Fails if a previous one is still unresolved.
    pub fn begin(&self, command: impl Into<String>) -> Result<OpId, JournalError> {
        if let Some((op_id, command, _phase)) = self.current_op()? {
            return Err(JournalError::OperationInProgress {
                op_id: op_id.to_string(),
                command,
            });
        }
        let op_id = OpId::new();
        let command = command.into();
        self.append(&JournalEntry {
            op_id: op_id.clone(),
            command,
            phase: OpPhase::Open,
            step: None,
            timestamp: UtcTimestamp::now(),
        })?;
        Ok(op_id)
    }

    pub fn record_step(&self, op_id: &OpId, command: &str, step: StepKind) -> Result<(), JournalError> {
        self.append(&JournalEntry {
            op_id: op_id.clone(),
            command: command.to_string(),
            phase: OpPhase::Open,
            step: Some(step),
            timestamp: UtcTimestamp::now(),
        })
    }

    pub fn suspend(&self, op_id: &OpId, command: &str) -> Result<(), JournalError> {
        self.append(&JournalEntry {
            op_id: op_id.clone(),
            command: command.to_string(),
            phase: OpPhase::Suspended,
            step: None,
            timestamp: UtcTimestamp::now(),
        })
    }

    pub fn commit(&self, op_id: &OpId, command: &str) -> Result<(), JournalError> {
        self.append(&JournalEntry {
            op_id: op_id.clone(),
            command: command.to_string(),
            phase: OpPhase::Committed,
            step: None,
            timestamp: UtcTimestamp::now(),
        })
    }

    pub fn abort(&self, op_id: &OpId, command: &str) -> Result<(), JournalError> {
        self.append(&JournalEntry {
            op_id: op_id.clone(),
            command: command.to_string(),
            phase: OpPhase::Aborted,
            step: None,
            timestamp: UtcTimestamp::now(),
        })
    }

    /// All steps recorded for `op_id`, in order, for replay during
    /// `--continue`/`--abort`/`undo`.
    pub fn steps_for(&self, op_id: &OpId) -> Result<Vec<StepKind>, JournalError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| &e.op_id == op_id)
            .filter_map(|e| e.step)
            .collect())
    }

    /// The most recently committed operation's metadata pre-image, for
    /// `pk undo`. Only one level of undo is retained (spec non-goal: no
    /// persistent undo history beyond one operation's pre-image) — this
    /// looks only at the single most recent committed op.
    pub fn last_undo_snapshot(&self) -> Result<Option<(OpId, String)>, JournalError> {
        let entries = self.read_all()?;
        let mut last_committed: Option<OpId> = None;
        for entry in entries.iter().rev() {
            if entry.phase == OpPhase::Committed {
                last_committed = Some(entry.op_id.clone());
                break;
            }
        }
        let Some(op_id) = last_committed else {
            return Ok(None);
        };
        for entry in entries.iter().rev() {
            if entry.op_id != op_id {
                continue;
            }
            if let Some(StepKind::MetadataSnapshot { pre_image }) = &entry.step {
                return Ok(Some((op_id, pre_image.clone())));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_then_commit_resolves_operation() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let op_id = journal.begin("sync").unwrap();
        journal.commit(&op_id, "sync").unwrap();
        assert!(journal.current_op().unwrap().is_none());
    }

    #[test]
    fn cannot_begin_while_suspended() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let op_id = journal.begin("sync").unwrap();
        journal.suspend(&op_id, "sync").unwrap();
        assert!(journal.begin("restack").is_err());
    }

    #[test]
    fn steps_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let op_id = journal.begin("restack").unwrap();
        journal
            .record_step(
                &op_id,
                "restack",
                StepKind::Checkpoint { name: "start".into() },
            )
            .unwrap();
        journal
            .record_step(
                &op_id,
                "restack",
                StepKind::Checkpoint { name: "end".into() },
            )
            .unwrap();
        let steps = journal.steps_for(&op_id).unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn undo_snapshot_from_most_recent_commit_only() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());

        let op1 = journal.begin("restack").unwrap();
        journal
            .record_step(&op1, "restack", StepKind::MetadataSnapshot { pre_image: "v1".into() })
            .unwrap();
        journal.commit(&op1, "restack").unwrap();

        let op2 = journal.begin("sync").unwrap();
        journal
            .record_step(&op2, "sync", StepKind::MetadataSnapshot { pre_image: "v2".into() })
            .unwrap();
        journal.commit(&op2, "sync").unwrap();

        let (op_id, pre_image) = journal.last_undo_snapshot().unwrap().unwrap();
        assert_eq!(op_id, op2);
        assert_eq!(pre_image, "v2");
    }
}
