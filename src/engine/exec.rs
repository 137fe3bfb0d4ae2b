//! engine::exec
//!
//! The Operation Engine's executor. Grounded in the teacher's
//! `engine::exec::Executor`, which steps through a `Plan` one `PlanStep` at
//! a time, journaling before execution and pausing on conflict. Unlike the
//! teacher's `RunGit` step — a stub that skips actual execution — every
//! step here is carried out for real, since the spec's restack and
//! conflict-suspension behavior depend on it.
//!
//! Forge calls are genuinely async (network I/O over `reqwest`), so
//! `execute`/`resume` are async fns; the CLI boundary runs under a `tokio`
//! current-thread runtime (see `main.rs`), matching the teacher's own
//! `async-trait` `Forge` usage.

use thiserror::Error;

use crate::core::graph::StackGraph;
use crate::core::metadata::{MetadataStore, StacksFile, StoreError};
use crate::core::ops::journal::{Journal, JournalError, OpId, StepKind};
use crate::core::types::BranchName;
use crate::engine::plan::{Plan, PlanStep};
use crate::forge::Forge;
use crate::git::{Git, GitError};

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error("forge operation failed: {0}")]
    Forge(String),
}

/// Outcome of running a `Plan` to completion or to its first conflict.
#[derive(Debug)]
pub enum ExecuteResult {
    Success,
    /// Stopped mid-plan because a rebase hit conflicts. The journal entry
    /// is left `Suspended`; `pk --continue`/`pk --abort` resume it.
    Paused { branch: BranchName, remaining: Vec<PlanStep> },
}

/// Executes one `Plan` against the repository, metadata store, and
/// (optionally) a forge binding, under an already-open journal entry.
pub struct Executor<'a> {
    pub git: &'a Git,
    pub store: &'a MetadataStore,
    pub journal: &'a Journal,
    pub forge: Option<&'a dyn Forge>,
}

impl<'a> Executor<'a> {
    pub async fn execute(
        &self,
        op_id: &OpId,
        command: &str,
        plan: &Plan,
        graph: &mut StackGraph,
        metadata: &mut StacksFile,
    ) -> Result<ExecuteResult, ExecuteError> {
        for (idx, step) in plan.steps.iter().enumerate() {
            tracing::debug!(step = ?step, "executing plan step");
            match step {
                PlanStep::CreateRef { branch, at } => {
                    self.journal.record_step(
                        op_id,
                        command,
                        StepKind::RefUpdate {
                            refname: crate::core::types::RefName::for_branch(branch),
                            old_oid: None,
                            new_oid: at.clone(),
                        },
                    )?;
                    self.git.create_branch(branch, at)?;
                }
                PlanStep::DeleteRef { branch } => {
                    self.git.delete_branch(branch)?;
                }
                PlanStep::RenameRef { from, to } => {
                    self.git.rename_branch(from, to)?;
                    if let Some(entry) = metadata.find_mut(from) {
                        entry.name = to.clone();
                    }
                    for entry in metadata.branches.iter_mut() {
                        if entry.parent.as_ref() == Some(from) {
                            entry.parent = Some(to.clone());
                        }
                    }
                    let children = graph.children(from).to_vec();
                    let parent = graph.parent(from).cloned();
                    graph.remove_node(from);
                    if let Some(p) = parent {
                        let _ = graph.add_edge(p, to.clone());
                    }
                    for child in children {
                        graph.reparent(&child, to.clone());
                    }
                }
                PlanStep::RebaseOnto { branch, upstream, new_base } => {
                    self.journal.record_step(
                        op_id,
                        command,
                        StepKind::RebaseOnto {
                            branch: branch.clone(),
                            upstream: upstream.clone(),
                            new_base: new_base.clone(),
                        },
                    )?;
                    let clean = self.git.rebase_onto(branch, upstream, new_base)?;
                    if !clean {
                        self.journal.suspend(op_id, command)?;
                        tracing::warn!(%branch, "rebase stopped with conflicts, operation suspended");
                        return Ok(ExecuteResult::Paused {
                            branch: branch.clone(),
                            remaining: plan.steps[idx + 1..].to_vec(),
                        });
                    }
                    if let Some(entry) = metadata.find_mut(branch) {
                        entry.anchor = new_base.clone();
                        if let Some(head) = self.git.try_resolve_ref(&format!("refs/heads/{branch}"))? {
                            entry.head = head;
                        }
                    }
                }
                PlanStep::SetParent { branch, parent } => {
                    if let Some(p) = parent {
                        graph.reparent(branch, p.clone());
                    } else {
                        graph.remove_node(branch);
                    }
                    if let Some(entry) = metadata.find_mut(branch) {
                        entry.parent = parent.clone();
                    }
                }
                PlanStep::UpdatePrBase { branch, new_base } => {
                    if let Some(forge) = self.forge {
                        let pr_id = metadata.find(branch).and_then(|e| e.pr.as_ref()).map(|pr| pr.id);
                        if let Some(pr_id) = pr_id {
                            let request = crate::forge::UpdatePrRequest {
                                base: Some(new_base.to_string()),
                                ..Default::default()
                            };
                            forge
                                .update_pr(pr_id, request)
                                .await
                                .map_err(|e| ExecuteError::Forge(e.to_string()))?;
                            if let Some(entry) = metadata.find_mut(branch) {
                                if let Some(pr) = &mut entry.pr {
                                    pr.base = new_base.clone();
                                }
                            }
                        }
                    }
                }
                PlanStep::Push { branch } => {
                    self.git.push_with_lease("origin", branch)?;
                }
                PlanStep::ForgeCreatePr { branch, base, draft } => {
                    if let Some(forge) = self.forge {
                        let request = crate::forge::CreatePrRequest {
                            branch: branch.to_string(),
                            base: base.to_string(),
                            title: branch.to_string(),
                            body: None,
                            draft: *draft,
                        };
                        let pr_id = forge
                            .create_pr(request)
                            .await
                            .map_err(|e| ExecuteError::Forge(e.to_string()))?;
                        if let Some(entry) = metadata.find_mut(branch) {
                            entry.pr = Some(crate::core::metadata::PrBinding {
                                id: pr_id,
                                base: base.clone(),
                                head: branch.clone(),
                                draft: *draft,
                                status: crate::core::metadata::PrStatus::Open,
                                fetched_at: crate::core::types::UtcTimestamp::now(),
                            });
                        }
                    }
                }
                PlanStep::ForgeUpdatePr { branch } => {
                    if let Some(forge) = self.forge {
                        let pr_id = metadata.find(branch).and_then(|e| e.pr.as_ref()).map(|pr| pr.id);
                        if let Some(pr_id) = pr_id {
                            forge
                                .update_pr(pr_id, crate::forge::UpdatePrRequest::default())
                                .await
                                .map_err(|e| ExecuteError::Forge(e.to_string()))?;
                        }
                    }
                }
                PlanStep::ForgeClosePr { branch } => {
                    if let Some(forge) = self.forge {
                        let pr_id = metadata.find(branch).and_then(|e| e.pr.as_ref()).map(|pr| pr.id);
                        if let Some(pr_id) = pr_id {
                            let request = crate::forge::UpdatePrRequest {
                                state: Some(crate::forge::PrState::Closed),
                                ..Default::default()
                            };
                            forge
                                .update_pr(pr_id, request)
                                .await
                                .map_err(|e| ExecuteError::Forge(e.to_string()))?;
                            if let Some(entry) = metadata.find_mut(branch) {
                                if let Some(pr) = &mut entry.pr {
                                    pr.status = crate::core::metadata::PrStatus::Closed;
                                }
                            }
                        }
                    }
                }
                PlanStep::CommitMetadata => {
                    let pre_image = if self.store.exists() {
                        std::fs::read_to_string(self.store.path()).unwrap_or_default()
                    } else {
                        String::new()
                    };
                    self.journal
                        .record_step(op_id, command, StepKind::MetadataSnapshot { pre_image })?;
                    self.store.save_and_mirror(metadata, self.git)?;
                }
            }
        }
        Ok(ExecuteResult::Success)
    }

    /// Resume a suspended plan after `git rebase --continue` succeeds.
    pub async fn resume(
        &self,
        op_id: &OpId,
        command: &str,
        remaining: Vec<PlanStep>,
        graph: &mut StackGraph,
        metadata: &mut StacksFile,
    ) -> Result<ExecuteResult, ExecuteError> {
        let plan = Plan {
            name: command.to_string(),
            steps: remaining,
        };
        self.execute(op_id, command, &plan, graph, metadata).await
    }
}
