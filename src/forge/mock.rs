//! forge::mock
//!
//! In-memory `Forge` for tests: stores PRs in a `Mutex`-guarded map, no
//! network calls. `create_pr` is idempotent on branch name, matching the
//! real forges' behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{
    CiState, CreatePrRequest, Forge, ForgeError, PrId, PrState, PrStatusSnapshot, PrSummary,
    ReviewState, UpdatePrRequest,
};

#[derive(Debug, Clone)]
struct StoredPr {
    branch: String,
    base: String,
    title: String,
    body: Option<String>,
    draft: bool,
    state: PrState,
}

/// In-memory `Forge` double.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    prs: HashMap<u64, StoredPr>,
    next_id: u64,
}

impl MockForge {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { prs: HashMap::new(), next_id: 1 })) }
    }

    /// Inspect a PR's current state, for test assertions.
    pub fn state_of(&self, pr_id: PrId) -> Option<PrState> {
        self.inner.lock().unwrap().prs.get(&pr_id.0).map(|pr| pr.state)
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PrId, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some((id, _)) =
            inner.prs.iter().find(|(_, pr)| pr.branch == request.branch && pr.state == PrState::Open)
        {
            return Ok(PrId(*id));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.prs.insert(
            id,
            StoredPr {
                branch: request.branch,
                base: request.base,
                title: request.title,
                body: request.body,
                draft: request.draft,
                state: PrState::Open,
            },
        );
        Ok(PrId(id))
    }

    async fn update_pr(&self, pr_id: PrId, update: UpdatePrRequest) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        let pr = inner
            .prs
            .get_mut(&pr_id.0)
            .ok_or_else(|| ForgeError::NotFound(format!("pr {}", pr_id.0)))?;
        if let Some(base) = update.base {
            pr.base = base;
        }
        if let Some(title) = update.title {
            pr.title = title;
        }
        if update.body.is_some() {
            pr.body = update.body;
        }
        if let Some(draft) = update.draft {
            pr.draft = draft;
        }
        if let Some(state) = update.state {
            pr.state = state;
        }
        Ok(())
    }

    async fn get_pr_status(&self, pr_id: PrId) -> Result<PrStatusSnapshot, ForgeError> {
        let inner = self.inner.lock().unwrap();
        let pr = inner.prs.get(&pr_id.0).ok_or_else(|| ForgeError::NotFound(format!("pr {}", pr_id.0)))?;
        Ok(PrStatusSnapshot {
            review: ReviewState::Unknown,
            ci: CiState::Unknown,
            merged: pr.state == PrState::Merged,
            closed: pr.state != PrState::Open,
        })
    }

    async fn list_prs(&self) -> Result<Vec<PrSummary>, ForgeError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .prs
            .iter()
            .map(|(id, pr)| PrSummary { branch: pr.branch.clone(), pr_id: PrId(*id), state: pr.state })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_pr_is_idempotent_on_open_branch() {
        let forge = MockForge::new();
        let request = CreatePrRequest {
            branch: "feature".into(),
            base: "main".into(),
            title: "Add feature".into(),
            body: None,
            draft: false,
        };
        let first = forge.create_pr(request.clone()).await.unwrap();
        let second = forge.create_pr(request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn update_pr_merged_reflects_in_status() {
        let forge = MockForge::new();
        let id = forge
            .create_pr(CreatePrRequest {
                branch: "feature".into(),
                base: "main".into(),
                title: "Add feature".into(),
                body: None,
                draft: false,
            })
            .await
            .unwrap();

        forge
            .update_pr(id, UpdatePrRequest { state: Some(PrState::Merged), ..Default::default() })
            .await
            .unwrap();

        let status = forge.get_pr_status(id).await.unwrap();
        assert!(status.merged);
        assert!(status.closed);
    }

    #[tokio::test]
    async fn list_prs_reports_branch_and_state() {
        let forge = MockForge::new();
        forge
            .create_pr(CreatePrRequest {
                branch: "feature".into(),
                base: "main".into(),
                title: "Add feature".into(),
                body: None,
                draft: false,
            })
            .await
            .unwrap();

        let prs = forge.list_prs().await.unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].branch, "feature");
        assert_eq!(prs[0].state, PrState::Open);
    }
}
