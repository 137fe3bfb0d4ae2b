//! forge::rest
//!
//! One small REST client implementing the narrow `Forge` trait for GitHub
//! and GitLab. No GraphQL, no reviewer management, no draft-toggle
//! mutation beyond what `update_pr`'s `draft` field already covers — the
//! C6 surface is four calls and this module exists only to make those four
//! calls against a real API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{
    CiState, CreatePrRequest, Forge, ForgeError, PrId, PrState, PrStatusSnapshot, PrSummary,
    ReviewState, UpdatePrRequest,
};

const USER_AGENT_VALUE: &str = "pancake-cli";

/// Which forge flavor a [`RestForge`] speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    fn default_api_base(self) -> &'static str {
        match self {
            Provider::GitHub => "https://api.github.com",
            Provider::GitLab => "https://gitlab.com/api/v4",
        }
    }
}

/// A REST-backed `Forge` for GitHub or GitLab, selected by `Provider`.
#[derive(Debug, Clone)]
pub struct RestForge {
    client: Client,
    token: String,
    owner: String,
    repo: String,
    api_base: String,
    provider: Provider,
}

impl RestForge {
    pub fn new(
        provider: Provider,
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: provider.default_api_base().to_string(),
            provider,
        }
    }

    /// Use a custom API base, for GitHub Enterprise or a self-hosted GitLab.
    pub fn with_api_base(
        provider: Provider,
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self { api_base: api_base.into(), ..Self::new(provider, token, owner, repo) }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        match self.provider {
            Provider::GitHub => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", self.token))
                        .unwrap_or_else(|_| HeaderValue::from_static("")),
                );
                headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
            }
            Provider::GitLab => {
                headers.insert(
                    "PRIVATE-TOKEN",
                    HeaderValue::from_str(&self.token).unwrap_or_else(|_| HeaderValue::from_static("")),
                );
            }
        }
        headers
    }

    fn collection_url(&self) -> String {
        match self.provider {
            Provider::GitHub => format!("{}/repos/{}/{}/pulls", self.api_base, self.owner, self.repo),
            Provider::GitLab => {
                format!("{}/projects/{}%2F{}/merge_requests", self.api_base, self.owner, self.repo)
            }
        }
    }

    fn item_url(&self, id: PrId) -> String {
        format!("{}/{}", self.collection_url(), id.0)
    }

    fn merge_url(&self, id: PrId) -> String {
        format!("{}/merge", self.item_url(id))
    }

    async fn parse<T: for<'de> Deserialize<'de>>(&self, response: Response) -> Result<T, ForgeError> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {e}"),
            })
        } else {
            Err(self.map_error(response, status).await)
        }
    }

    async fn map_error(&self, response: Response, status: StatusCode) -> ForgeError {
        let message = response.text().await.unwrap_or_else(|_| "unknown error".into());
        match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed(message),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ => ForgeError::ApiError { status: status.as_u16(), message },
        }
    }

    fn create_body(&self, request: &CreatePrRequest) -> serde_json::Value {
        let mut body = match self.provider {
            Provider::GitHub => serde_json::json!({
                "head": request.branch,
                "base": request.base,
                "title": request.title,
                "draft": request.draft,
            }),
            Provider::GitLab => serde_json::json!({
                "source_branch": request.branch,
                "target_branch": request.base,
                "title": request.title,
                "draft": request.draft,
            }),
        };
        if let Some(text) = &request.body {
            let key = match self.provider {
                Provider::GitHub => "body",
                Provider::GitLab => "description",
            };
            body[key] = serde_json::json!(text);
        }
        body
    }

    fn update_body(&self, update: &UpdatePrRequest) -> serde_json::Value {
        let state_field = update.state.map(|s| match self.provider {
            Provider::GitHub => match s {
                PrState::Closed => "closed",
                _ => "open",
            },
            Provider::GitLab => match s {
                PrState::Closed => "close",
                _ => "reopen",
            },
        });

        // PATCH semantics: an absent field leaves that value alone, so
        // unset fields are omitted rather than serialized as null.
        let mut body = serde_json::Map::new();
        let (title_key, body_key, base_key, state_key) = match self.provider {
            Provider::GitHub => ("title", "body", "base", "state"),
            Provider::GitLab => ("title", "description", "target_branch", "state_event"),
        };
        if let Some(title) = &update.title {
            body.insert(title_key.into(), serde_json::json!(title));
        }
        if let Some(text) = &update.body {
            body.insert(body_key.into(), serde_json::json!(text));
        }
        if let Some(base) = &update.base {
            body.insert(base_key.into(), serde_json::json!(base));
        }
        if let Some(draft) = update.draft {
            body.insert("draft".into(), serde_json::json!(draft));
        }
        if let Some(state) = state_field {
            body.insert(state_key.into(), serde_json::json!(state));
        }
        serde_json::Value::Object(body)
    }

    fn normalize(&self, raw: &RawPr) -> PrStatusSnapshot {
        let merged = raw.merged_at.is_some() || raw.state == "merged";
        let closed = merged || raw.state == "closed";
        PrStatusSnapshot { review: ReviewState::Unknown, ci: CiState::Unknown, merged, closed }
    }

    fn pr_state(&self, raw: &RawPr) -> PrState {
        if raw.merged_at.is_some() || raw.state == "merged" {
            PrState::Merged
        } else if raw.state == "closed" {
            PrState::Closed
        } else {
            PrState::Open
        }
    }

    fn branch_of(&self, raw: &RawPr) -> String {
        match self.provider {
            Provider::GitHub => raw.head.as_ref().map(|h| h.ref_name.clone()).unwrap_or_default(),
            Provider::GitLab => raw.source_branch.clone().unwrap_or_default(),
        }
    }

    fn id_of(&self, raw: &RawPr) -> PrId {
        match self.provider {
            Provider::GitHub => PrId(raw.number.unwrap_or_default()),
            Provider::GitLab => PrId(raw.iid.unwrap_or_default()),
        }
    }
}

/// Shape shared by GitHub's pull-request and GitLab's merge-request
/// payloads, narrowed to the fields this binding actually reads.
#[derive(Debug, Deserialize)]
struct RawPr {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    iid: Option<u64>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    merged_at: Option<String>,
    #[serde(default)]
    head: Option<RawRef>,
    #[serde(default)]
    source_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[async_trait]
impl Forge for RestForge {
    fn name(&self) -> &'static str {
        match self.provider {
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
        }
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PrId, ForgeError> {
        for existing in self.list_prs().await? {
            if existing.branch == request.branch && existing.state == PrState::Open {
                return Ok(existing.pr_id);
            }
        }

        let response = self
            .client
            .post(self.collection_url())
            .headers(self.headers())
            .json(&self.create_body(&request))
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let raw: RawPr = self.parse(response).await?;
        Ok(self.id_of(&raw))
    }

    async fn update_pr(&self, pr_id: PrId, update: UpdatePrRequest) -> Result<(), ForgeError> {
        if update.state == Some(PrState::Merged) {
            let response = self
                .client
                .put(self.merge_url(pr_id))
                .headers(self.headers())
                .send()
                .await
                .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
            let status = response.status();
            return if status.is_success() { Ok(()) } else { Err(self.map_error(response, status).await) };
        }

        let response = self
            .client
            .patch(self.item_url(pr_id))
            .headers(self.headers())
            .json(&self.update_body(&update))
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.map_error(response, status).await)
        }
    }

    async fn get_pr_status(&self, pr_id: PrId) -> Result<PrStatusSnapshot, ForgeError> {
        let response = self
            .client
            .get(self.item_url(pr_id))
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let raw: RawPr = self.parse(response).await?;
        Ok(self.normalize(&raw))
    }

    async fn list_prs(&self) -> Result<Vec<PrSummary>, ForgeError> {
        let url = match self.provider {
            Provider::GitHub => format!("{}?state=all", self.collection_url()),
            Provider::GitLab => format!("{}?state=all", self.collection_url()),
        };

        let response = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let raw: Vec<RawPr> = self.parse(response).await?;
        Ok(raw
            .iter()
            .map(|pr| PrSummary { branch: self.branch_of(pr), pr_id: self.id_of(pr), state: self.pr_state(pr) })
            .collect())
    }
}
