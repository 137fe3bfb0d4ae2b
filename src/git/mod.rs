//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and writes
//! flow through this interface. Direct parsing of `.git` internal files
//! outside this module is prohibited. No other module should import `git2`.
//!
//! Most operations use the `git2` crate. Rebase and force-with-lease push
//! are shelled out to the system `git` binary, since reimplementing
//! three-way merge conflict resolution is out of scope.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Ref operations (read, CAS update, delete)
//! - Object operations (read blob, write blob)
//! - Ancestry queries (merge-base, is-ancestor)
//! - Status and state detection
//! - Remote URL parsing
//! - Rebase onto / continue / abort, push with lease, branch create/rename/delete
//! - Notes mirror (`refs/notes/<namespace>`)
//!
//! # Invariants
//!
//! - All ref updates use CAS (compare-and-swap) semantics
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, BranchName, RefName)
//!
//! # Example
//!
//! ```ignore
//! use pancake::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//!
//! // Query operations
//! let oid = git.resolve_ref("refs/heads/main")?;
//! let branches = git.list_branches()?;
//! ```

mod interface;

pub use interface::{CommitInfo, Git, GitError, GitState, RefEntry, RepoInfo, WorktreeStatus};
