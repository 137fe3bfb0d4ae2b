//! forge
//!
//! The Forge Binding (C6): a narrow window into a remote hosting service —
//! create/update a PR, read its status, list a repo's PRs. Nothing else.
//! Forge operations run only after local structural invariants are
//! satisfied, and forge failures never compromise local correctness; their
//! results land only in cached metadata fields.
//!
//! # Modules
//!
//! - `traits`: the `Forge` trait and its request/response types
//! - [`rest`]: one REST client implementing `Forge` for GitHub and GitLab
//! - [`mock`]: in-memory `Forge` for tests
//! - `factory`: provider detection and `create_forge`
//! - `stack_block`: the PR-body stack table
//!
//! # Example
//!
//! ```ignore
//! use pancake::forge::{create_forge, Forge, CreatePrRequest};
//!
//! let forge = create_forge("git@github.com:owner/repo.git", token, None)?;
//! let pr_id = forge.create_pr(CreatePrRequest {
//!     branch: "feature".to_string(),
//!     base: "main".to_string(),
//!     title: "Add feature".to_string(),
//!     body: None,
//!     draft: false,
//! }).await?;
//! ```

mod factory;
pub mod mock;
pub mod rest;
pub mod stack_block;
mod traits;

pub use factory::{create_forge, detect_provider, valid_forge_names, ForgeProvider};
pub use traits::*;
