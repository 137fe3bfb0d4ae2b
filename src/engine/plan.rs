//! engine::plan
//!
//! Intent→Plan compilation. Grounded in the teacher's `engine::plan::Plan`/
//! `PlanStep` (pure, deterministic, no I/O): a `Plan` is a list of
//! `PlanStep`s compiled from an `Intent` against a read-only snapshot of
//! the Stack Model. The planner never touches the repository; the
//! Operation Engine (`exec.rs`) is the only thing that executes steps.

use thiserror::Error;

use crate::core::graph::StackGraph;
use crate::core::metadata::StacksFile;
use crate::core::types::{BranchName, Oid};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("branch already tracked: {0}")]
    AlreadyTracked(String),

    #[error("cannot delete trunk")]
    CannotDeleteTrunk,

    #[error("max stack depth exceeded: {0}")]
    MaxDepthExceeded(usize),
}

/// What the caller wants to happen, independent of how it gets done.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Track a new branch under `parent`, created at `at`.
    CreateBranch {
        name: BranchName,
        parent: BranchName,
        at: Oid,
    },
    /// Splice `name` in between `parent` and `parent`'s current parent:
    /// `name` inherits `parent`'s old parent, and `parent` (with its
    /// existing subtree, untouched) is restacked onto `name`.
    InsertBefore {
        name: BranchName,
        parent: BranchName,
        at: Oid,
    },
    /// Untrack `name`, re-parenting its children onto its former parent.
    DeleteBranch { name: BranchName },
    /// Rebase `name` and every descendant onto the current head of `name`'s
    /// parent, in post-order with sibling order preserved.
    Restack { from: BranchName },
    /// Re-parent `branch` onto `new_parent` (spec's "conservative choice":
    /// a rebase of both branches, see SPEC_FULL §9).
    Move { branch: BranchName, new_parent: BranchName },
}

/// One atomic unit of execution. The full set named in spec §4.5's step
/// vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    CreateRef { branch: BranchName, at: Oid },
    DeleteRef { branch: BranchName },
    RenameRef { from: BranchName, to: BranchName },
    RebaseOnto { branch: BranchName, upstream: Oid, new_base: Oid },
    SetParent { branch: BranchName, parent: Option<BranchName> },
    UpdatePrBase { branch: BranchName, new_base: BranchName },
    Push { branch: BranchName },
    ForgeCreatePr { branch: BranchName, base: BranchName, draft: bool },
    ForgeUpdatePr { branch: BranchName },
    ForgeClosePr { branch: BranchName },
    CommitMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub name: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn touched_branches(&self) -> Vec<BranchName> {
        let mut result = Vec::new();
        for step in &self.steps {
            match step {
                PlanStep::CreateRef { branch, .. }
                | PlanStep::DeleteRef { branch }
                | PlanStep::RebaseOnto { branch, .. }
                | PlanStep::SetParent { branch, .. }
                | PlanStep::UpdatePrBase { branch, .. }
                | PlanStep::Push { branch }
                | PlanStep::ForgeCreatePr { branch, .. }
                | PlanStep::ForgeUpdatePr { branch }
                | PlanStep::ForgeClosePr { branch } => result.push(branch.clone()),
                PlanStep::RenameRef { from, to } => {
                    result.push(from.clone());
                    result.push(to.clone());
                }
                PlanStep::CommitMetadata => {}
            }
        }
        result
    }
}

/// Compile an `Intent` into a `Plan`, validating against the current
/// `StackGraph`/`StacksFile` snapshot. Pure: no I/O, deterministic given
/// the same inputs (spec property P4).
pub fn compile(intent: &Intent, graph: &StackGraph, metadata: &StacksFile, max_depth: usize) -> Result<Plan, PlanError> {
    match intent {
        Intent::CreateBranch { name, parent, at } => {
            if metadata.find(name).is_some() {
                return Err(PlanError::AlreadyTracked(name.to_string()));
            }
            if !graph.contains(parent) {
                return Err(PlanError::BranchNotFound(parent.to_string()));
            }
            let depth = graph.depth(parent) + 1;
            if depth > max_depth {
                return Err(PlanError::MaxDepthExceeded(max_depth));
            }
            Ok(Plan::new("branch create")
                .with_step(PlanStep::CreateRef {
                    branch: name.clone(),
                    at: at.clone(),
                })
                .with_step(PlanStep::SetParent {
                    branch: name.clone(),
                    parent: Some(parent.clone()),
                })
                .with_step(PlanStep::CommitMetadata))
        }

        Intent::InsertBefore { name, parent, at } => {
            if metadata.find(name).is_some() {
                return Err(PlanError::AlreadyTracked(name.to_string()));
            }
            if !graph.contains(parent) {
                return Err(PlanError::BranchNotFound(parent.to_string()));
            }
            let grandparent = graph
                .parent(parent)
                .cloned()
                .ok_or_else(|| PlanError::BranchNotFound(parent.to_string()))?;
            let target_entry = metadata
                .find(parent)
                .ok_or_else(|| PlanError::BranchNotFound(parent.to_string()))?;

            // Inserting above `parent` shifts it and its whole subtree one
            // level deeper; validate the deepest descendant post-shift.
            let mut deepest = graph.depth(parent);
            for descendant in graph.descendants(parent) {
                deepest = deepest.max(graph.depth(&descendant));
            }
            if deepest + 1 > max_depth {
                return Err(PlanError::MaxDepthExceeded(max_depth));
            }

            let plan = Plan::new("branch create --insert-before")
                .with_step(PlanStep::CreateRef {
                    branch: name.clone(),
                    at: at.clone(),
                })
                .with_step(PlanStep::SetParent {
                    branch: name.clone(),
                    parent: Some(grandparent),
                })
                .with_step(PlanStep::SetParent {
                    branch: parent.clone(),
                    parent: Some(name.clone()),
                })
                .with_step(PlanStep::RebaseOnto {
                    branch: parent.clone(),
                    upstream: target_entry.anchor.clone(),
                    new_base: at.clone(),
                });
            Ok(plan.with_step(PlanStep::CommitMetadata))
        }

        Intent::DeleteBranch { name } => {
            if graph.is_root(name) {
                return Err(PlanError::CannotDeleteTrunk);
            }
            if !graph.contains(name) {
                return Err(PlanError::BranchNotFound(name.to_string()));
            }
            let parent = graph.parent(name).cloned();
            let parent_head = parent.as_ref().and_then(|p| metadata.find(p)).map(|e| e.head.clone());

            let mut plan = Plan::new("branch delete");
            for child in graph.children(name) {
                plan = plan.with_step(PlanStep::SetParent {
                    branch: child.clone(),
                    parent: parent.clone(),
                });

                let Some(child_entry) = metadata.find(child) else { continue };
                if let Some(new_base) = parent_head.clone() {
                    plan = plan.with_step(PlanStep::RebaseOnto {
                        branch: child.clone(),
                        upstream: child_entry.anchor.clone(),
                        new_base,
                    });
                }
                if let Some(parent_name) = &parent {
                    if child_entry.pr.is_some() {
                        plan = plan
                            .with_step(PlanStep::UpdatePrBase {
                                branch: child.clone(),
                                new_base: parent_name.clone(),
                            })
                            .with_step(PlanStep::ForgeUpdatePr { branch: child.clone() });
                    }
                }
            }
            Ok(plan
                .with_step(PlanStep::ForgeClosePr { branch: name.clone() })
                .with_step(PlanStep::DeleteRef { branch: name.clone() })
                .with_step(PlanStep::CommitMetadata))
        }

        Intent::Restack { from } => {
            if !graph.contains(from) {
                return Err(PlanError::BranchNotFound(from.to_string()));
            }
            let mut plan = Plan::new("restack");
            // Top-down (BFS) over `from` and its descendants, sibling order
            // preserved — a parent's new head must exist before its
            // children are rebased onto it.
            let mut order = vec![from.clone()];
            order.extend(graph.descendants(from));
            for branch in order {
                let Some(entry) = metadata.find(&branch) else { continue };
                if entry.is_frozen() {
                    continue;
                }
                let Some(parent) = graph.parent(&branch) else { continue };
                let Some(parent_entry) = metadata.find(parent) else { continue };
                if entry.anchor == parent_entry.head {
                    continue;
                }
                plan = plan
                    .with_step(PlanStep::RebaseOnto {
                        branch: branch.clone(),
                        upstream: entry.anchor.clone(),
                        new_base: parent_entry.head.clone(),
                    })
                    .with_step(PlanStep::Push { branch: branch.clone() })
                    .with_step(PlanStep::ForgeUpdatePr { branch: branch.clone() });
            }
            Ok(plan.with_step(PlanStep::CommitMetadata))
        }

        Intent::Move { branch, new_parent } => {
            if !graph.contains(branch) || !graph.contains(new_parent) {
                return Err(PlanError::BranchNotFound(branch.to_string()));
            }
            let new_parent_entry = metadata
                .find(new_parent)
                .ok_or_else(|| PlanError::BranchNotFound(new_parent.to_string()))?;
            let entry = metadata
                .find(branch)
                .ok_or_else(|| PlanError::BranchNotFound(branch.to_string()))?;
            Ok(Plan::new("move")
                .with_step(PlanStep::SetParent {
                    branch: branch.clone(),
                    parent: Some(new_parent.clone()),
                })
                .with_step(PlanStep::RebaseOnto {
                    branch: branch.clone(),
                    upstream: entry.anchor.clone(),
                    new_base: new_parent_entry.head.clone(),
                })
                .with_step(PlanStep::Push { branch: branch.clone() })
                .with_step(PlanStep::UpdatePrBase {
                    branch: branch.clone(),
                    new_base: new_parent.clone(),
                })
                .with_step(PlanStep::CommitMetadata))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::BranchEntry;

    fn b(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn oid(tail: &str) -> Oid {
        Oid::new(format!("{:0>40}", tail)).unwrap()
    }

    fn sample() -> (StackGraph, StacksFile) {
        let mut graph = StackGraph::new(b("main"));
        graph.add_edge(b("main"), b("feature-a")).unwrap();

        let mut metadata = StacksFile::new(b("main"));
        metadata
            .insert(BranchEntry::new(b("main"), None, oid("1"), oid("1")))
            .unwrap();
        metadata
            .insert(BranchEntry::new(b("feature-a"), Some(b("main")), oid("2"), oid("1")))
            .unwrap();
        (graph, metadata)
    }

    #[test]
    fn create_branch_compiles_create_and_set_parent() {
        let (graph, metadata) = sample();
        let intent = Intent::CreateBranch {
            name: b("feature-b"),
            parent: b("feature-a"),
            at: oid("2"),
        };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();
        assert!(matches!(plan.steps[0], PlanStep::CreateRef { .. }));
        assert!(matches!(plan.steps[1], PlanStep::SetParent { .. }));
    }

    #[test]
    fn create_branch_rejects_duplicate() {
        let (graph, metadata) = sample();
        let intent = Intent::CreateBranch {
            name: b("feature-a"),
            parent: b("main"),
            at: oid("2"),
        };
        assert!(matches!(compile(&intent, &graph, &metadata, 20), Err(PlanError::AlreadyTracked(_))));
    }

    #[test]
    fn delete_trunk_rejected() {
        let (graph, metadata) = sample();
        let intent = Intent::DeleteBranch { name: b("main") };
        assert_eq!(compile(&intent, &graph, &metadata, 20), Err(PlanError::CannotDeleteTrunk));
    }

    #[test]
    fn delete_branch_reparents_children() {
        let (mut graph, mut metadata) = sample();
        graph.add_edge(b("feature-a"), b("feature-b")).unwrap();
        metadata
            .insert(BranchEntry::new(b("feature-b"), Some(b("feature-a")), oid("3"), oid("2")))
            .unwrap();

        let intent = Intent::DeleteBranch { name: b("feature-a") };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();
        let reparent = plan.steps.iter().find(|s| matches!(s, PlanStep::SetParent { branch, .. } if branch == &b("feature-b")));
        assert!(reparent.is_some());
    }

    #[test]
    fn restack_skips_branches_already_on_anchor() {
        let (graph, metadata) = sample();
        let intent = Intent::Restack { from: b("main") };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();
        assert!(plan.steps.iter().all(|s| !matches!(s, PlanStep::RebaseOnto { .. })));
    }

    #[test]
    fn restack_rebases_when_anchor_stale() {
        let (graph, mut metadata) = sample();
        metadata.find_mut(&b("main")).unwrap().head = oid("9");
        let intent = Intent::Restack { from: b("main") };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();
        assert!(plan.steps.iter().any(|s| matches!(s, PlanStep::RebaseOnto { .. })));
    }

    #[test]
    fn insert_before_gives_new_branch_the_targets_old_parent() {
        let (graph, metadata) = sample();
        let intent = Intent::InsertBefore {
            name: b("feature-mid"),
            parent: b("feature-a"),
            at: oid("9"),
        };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();

        let new_parent = plan.steps.iter().find_map(|s| match s {
            PlanStep::SetParent { branch, parent } if branch == &b("feature-mid") => Some(parent.clone()),
            _ => None,
        });
        assert_eq!(new_parent, Some(Some(b("main"))));

        let target_parent = plan.steps.iter().find_map(|s| match s {
            PlanStep::SetParent { branch, parent } if branch == &b("feature-a") => Some(parent.clone()),
            _ => None,
        });
        assert_eq!(target_parent, Some(Some(b("feature-mid"))));

        assert!(plan
            .steps
            .iter()
            .any(|s| matches!(s, PlanStep::RebaseOnto { branch, .. } if branch == &b("feature-a"))));
    }

    #[test]
    fn insert_before_does_not_touch_targets_children() {
        let (mut graph, mut metadata) = sample();
        graph.add_edge(b("feature-a"), b("feature-b")).unwrap();
        metadata
            .insert(BranchEntry::new(b("feature-b"), Some(b("feature-a")), oid("3"), oid("2")))
            .unwrap();

        let intent = Intent::InsertBefore {
            name: b("feature-mid"),
            parent: b("feature-a"),
            at: oid("9"),
        };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();

        assert!(!plan
            .steps
            .iter()
            .any(|s| matches!(s, PlanStep::SetParent { branch, .. } if branch == &b("feature-b"))));
    }

    #[test]
    fn insert_before_rejects_when_it_would_exceed_max_depth() {
        let (graph, metadata) = sample();
        let intent = Intent::InsertBefore {
            name: b("feature-mid"),
            parent: b("feature-a"),
            at: oid("9"),
        };
        assert_eq!(compile(&intent, &graph, &metadata, 1), Err(PlanError::MaxDepthExceeded(1)));
    }

    #[test]
    fn delete_branch_rebases_children_onto_parents_head_and_updates_pr_base() {
        let (mut graph, mut metadata) = sample();
        graph.add_edge(b("feature-a"), b("feature-b")).unwrap();
        let mut child = BranchEntry::new(b("feature-b"), Some(b("feature-a")), oid("3"), oid("2"));
        child.pr = Some(crate::core::metadata::PrBinding {
            id: crate::forge::PrId(1),
            base: b("feature-a"),
            head: b("feature-b"),
            draft: false,
            status: crate::core::metadata::PrStatus::Open,
            fetched_at: crate::core::types::UtcTimestamp::now(),
        });
        metadata.insert(child).unwrap();

        let intent = Intent::DeleteBranch { name: b("feature-a") };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();

        let forge_close_idx = plan.steps.iter().position(|s| matches!(s, PlanStep::ForgeClosePr { .. })).unwrap();
        let rebase_idx = plan
            .steps
            .iter()
            .position(|s| matches!(s, PlanStep::RebaseOnto { branch, .. } if branch == &b("feature-b")))
            .unwrap();
        let update_base_idx = plan
            .steps
            .iter()
            .position(|s| matches!(s, PlanStep::UpdatePrBase { branch, .. } if branch == &b("feature-b")))
            .unwrap();
        let forge_update_idx = plan
            .steps
            .iter()
            .position(|s| matches!(s, PlanStep::ForgeUpdatePr { branch } if branch == &b("feature-b")))
            .unwrap();

        assert!(rebase_idx < forge_close_idx);
        assert!(update_base_idx < forge_close_idx);
        assert!(forge_update_idx < forge_close_idx);
    }

    #[test]
    fn restack_skips_frozen_branch() {
        let (graph, mut metadata) = sample();
        metadata.find_mut(&b("main")).unwrap().head = oid("9");
        metadata.find_mut(&b("feature-a")).unwrap().freeze =
            crate::core::metadata::FreezeState::Frozen { scope: crate::core::metadata::FreezeScope::Single };
        let intent = Intent::Restack { from: b("main") };
        let plan = compile(&intent, &graph, &metadata, 20).unwrap();
        assert!(plan.steps.iter().all(|s| !matches!(s, PlanStep::RebaseOnto { .. })));
    }
}
