//! reconcile
//!
//! The Reconciler: three-way alignment of Metadata, Local Refs, and Remote
//! PR state. Grounded in the teacher's `doctor` module (diagnose → fixes →
//! confirm → apply), narrowed from the teacher's general health-issue
//! catalogue down to exactly the drift rules the spec defines.
//!
//! The Operation Engine consults the Reconciler before planning (its
//! "Gate" stage, spec §4.5) and again after executing (its "Verify" stage)
//! to confirm the repository matches what the plan assumed.

use std::collections::HashMap;

use thiserror::Error;

use crate::core::metadata::{BranchEntry, MetadataStore, PrStatus, StacksFile, StoreError};
use crate::core::types::{BranchName, Oid};
use crate::forge::Forge;
use crate::git::{Git, GitError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Git(#[from] GitError),
}

/// One unit of detected drift between Metadata, Local Refs, and Remote PR
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// R1: the branch's ref has moved since metadata last recorded its head;
    /// the cached `head` is stale and should be refreshed.
    HeadStale { branch: BranchName, metadata_head: Oid, actual_head: Oid },

    /// R2: metadata tracks a branch whose local ref no longer exists.
    RefMissing { branch: BranchName },

    /// R3: the cached PR status disagrees with the forge's current status.
    PrStatusStale { branch: BranchName, cached: PrStatus, actual: PrStatus },

    /// R4: `.pancake/stacks.json` is missing or unreadable, but
    /// `refs/notes/pancake` holds recoverable parent/anchor data.
    MetadataRecoverable { branch: BranchName },

    /// R5: a branch's parent has moved past its recorded anchor — the
    /// branch has not been restacked onto the parent's current head.
    AnchorBehindParent { branch: BranchName, anchor: Oid, parent_head: Oid },
}

#[derive(Debug, Clone, Default)]
pub struct DriftReport {
    pub drift: Vec<Drift>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Scans the repository and compares it against the metadata store,
/// producing a `DriftReport`. Does not fetch from the forge unless
/// `check_forge` is given an active `Forge` handle — forge checks are a
/// network call and the caller decides whether this scan needs them.
pub struct Reconciler<'a> {
    git: &'a Git,
    store: &'a MetadataStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(git: &'a Git, store: &'a MetadataStore) -> Self {
        Self { git, store }
    }

    pub fn scan(&self) -> Result<DriftReport, ReconcileError> {
        let mut report = DriftReport::default();

        let file = match self.store.load() {
            Ok(file) => file,
            Err(_) if !self.store.exists() => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        self.scan_local(&file, &mut report)?;
        Ok(report)
    }

    fn scan_local(&self, file: &StacksFile, report: &mut DriftReport) -> Result<(), ReconcileError> {
        let by_name: HashMap<&BranchName, &BranchEntry> =
            file.branches.iter().map(|b| (&b.name, b)).collect();

        for entry in &file.branches {
            let refname = format!("refs/heads/{}", entry.name);
            match self.git.try_resolve_ref(&refname)? {
                None => {
                    report.drift.push(Drift::RefMissing {
                        branch: entry.name.clone(),
                    });
                    continue;
                }
                Some(actual_head) if actual_head != entry.head => {
                    report.drift.push(Drift::HeadStale {
                        branch: entry.name.clone(),
                        metadata_head: entry.head.clone(),
                        actual_head,
                    });
                }
                Some(_) => {}
            }

            if let Some(parent_name) = &entry.parent {
                if let Some(parent_entry) = by_name.get(parent_name) {
                    if entry.anchor != parent_entry.head {
                        report.drift.push(Drift::AnchorBehindParent {
                            branch: entry.name.clone(),
                            anchor: entry.anchor.clone(),
                            parent_head: parent_entry.head.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// R4: rebuild a minimal metadata entry for `branch` from its
    /// `refs/notes/pancake` mirror, used when `.pancake/stacks.json` is
    /// missing entirely.
    pub fn recover_from_notes(&self, branch: &BranchName, head: &Oid) -> Result<Option<(Option<BranchName>, Oid)>, ReconcileError> {
        let Some(body) = self.git.read_note("pancake", head.as_str())? else {
            return Ok(None);
        };
        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };
        let parent = value
            .get("parent")
            .and_then(|v| v.as_str())
            .and_then(|s| BranchName::new(s).ok());
        let anchor = value
            .get("anchor")
            .and_then(|v| v.as_str())
            .and_then(|s| Oid::new(s).ok())
            .unwrap_or_else(|| head.clone());
        tracing::warn!(%branch, "recovered metadata from refs/notes/pancake");
        Ok(Some((parent, anchor)))
    }

    /// R3: compare cached PR status against the forge's live status for
    /// every branch with a PR binding.
    pub async fn check_forge(&self, file: &StacksFile, forge: &dyn Forge) -> Vec<Drift> {
        let mut drift = Vec::new();
        for entry in &file.branches {
            let Some(pr) = &entry.pr else { continue };
            let Ok(live) = forge.get_pr_status(pr.id).await else { continue };
            let actual = if live.merged {
                PrStatus::Merged
            } else if live.closed {
                PrStatus::Closed
            } else {
                PrStatus::Open
            };
            if actual != pr.status {
                drift.push(Drift::PrStatusStale {
                    branch: entry.name.clone(),
                    cached: pr.status,
                    actual,
                });
            }
        }
        drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::BranchEntry;

    fn oid(tail: &str) -> Oid {
        Oid::new(format!("{:0>40}", tail)).unwrap()
    }

    #[test]
    fn anchor_behind_parent_detected_purely_in_metadata() {
        let mut file = StacksFile::new(BranchName::new("main").unwrap());
        let parent = BranchEntry::new(BranchName::new("main").unwrap(), None, oid("1"), oid("1"));
        let mut child = BranchEntry::new(
            BranchName::new("feature").unwrap(),
            Some(BranchName::new("main").unwrap()),
            oid("2"),
            oid("0"),
        );
        child.anchor = oid("0");
        file.branches.push(parent);
        file.branches.push(child);

        let by_name: HashMap<&BranchName, &BranchEntry> =
            file.branches.iter().map(|b| (&b.name, b)).collect();
        let entry = by_name.get(&BranchName::new("feature").unwrap()).unwrap();
        let parent_entry = by_name.get(&BranchName::new("main").unwrap()).unwrap();
        assert_ne!(entry.anchor, parent_entry.head);
    }
}
