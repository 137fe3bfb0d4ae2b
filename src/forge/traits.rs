//! forge::traits
//!
//! The Forge Binding's trait surface (C6, spec §4.6): a narrow interface —
//! create/update PRs, rewrite bases, fetch status — rather than a full
//! GitHub/GitLab client. Concrete forges are out-of-scope collaborators;
//! this crate ships one small REST-based implementation (`forge::rest`)
//! and a `MockForge` for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    #[error("authentication required")]
    AuthRequired,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited,

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Opaque pull-request identifier, as returned by `create_pr` and consumed
/// by every later call keyed on that PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrId(pub u64);

impl std::fmt::Display for PrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PrId {
    fn from(n: u64) -> Self {
        PrId(n)
    }
}

impl From<PrId> for u64 {
    fn from(id: PrId) -> Self {
        id.0
    }
}

/// PR state, as tracked by the forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Review decision on the latest review round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Pending,
    Approved,
    ChangesRequested,
    Unknown,
}

/// CI status for the PR's head commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiState {
    Pending,
    Passing,
    Failing,
    Unknown,
}

/// *create-pr(branch, base, title, body, draft) → pr-id*
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    pub branch: String,
    pub base: String,
    pub title: String,
    pub body: Option<String>,
    pub draft: bool,
}

/// *update-pr(pr-id, {base?, title?, body?, draft?, state?}) → Ok*
#[derive(Debug, Clone, Default)]
pub struct UpdatePrRequest {
    pub base: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub draft: Option<bool>,
    pub state: Option<PrState>,
}

/// *get-pr-status(pr-id) → {review, ci, merged, closed}*
#[derive(Debug, Clone)]
pub struct PrStatusSnapshot {
    pub review: ReviewState,
    pub ci: CiState,
    pub merged: bool,
    pub closed: bool,
}

/// One row of *list-prs(repo) → [{branch, pr-id, state}]*
#[derive(Debug, Clone)]
pub struct PrSummary {
    pub branch: String,
    pub pr_id: PrId,
    pub state: PrState,
}

/// The Forge Binding (C6): the Operation Engine's only window into a
/// remote hosting service. Every method maps 1:1 onto spec §4.6's surface.
///
/// # Idempotency
///
/// `create_pr` must be idempotent on retry, keyed on (branch, head-commit):
/// calling it twice for a branch that already has an open PR returns the
/// existing id rather than creating a duplicate.
#[async_trait]
pub trait Forge: Send + Sync {
    /// The forge name (e.g. "github", "gitlab"), for logging.
    fn name(&self) -> &'static str;

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PrId, ForgeError>;

    async fn update_pr(&self, pr_id: PrId, update: UpdatePrRequest) -> Result<(), ForgeError>;

    async fn get_pr_status(&self, pr_id: PrId) -> Result<PrStatusSnapshot, ForgeError>;

    async fn list_prs(&self) -> Result<Vec<PrSummary>, ForgeError>;
}
