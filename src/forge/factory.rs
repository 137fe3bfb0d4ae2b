//! forge::factory
//!
//! Forge selection and creation. Commands call `create_forge()` rather than
//! importing `RestForge` directly, so the provider choice stays in one
//! place.

use super::rest::{Provider, RestForge};
use super::traits::{Forge, ForgeError};

/// Supported forge providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeProvider {
    GitHub,
    #[cfg(feature = "gitlab")]
    GitLab,
}

impl ForgeProvider {
    pub fn all() -> &'static [ForgeProvider] {
        &[ForgeProvider::GitHub, #[cfg(feature = "gitlab")] ForgeProvider::GitLab]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ForgeProvider::GitHub => "github",
            #[cfg(feature = "gitlab")]
            ForgeProvider::GitLab => "gitlab",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(ForgeProvider::GitHub),
            #[cfg(feature = "gitlab")]
            "gitlab" => Some(ForgeProvider::GitLab),
            _ => None,
        }
    }
}

impl std::fmt::Display for ForgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parse `owner/repo` out of an SSH or HTTPS git remote URL for the given
/// host (e.g. `github.com`, `gitlab.com`).
fn parse_owner_repo(remote_url: &str, host: &str) -> Option<(String, String)> {
    let rest = if let Some(stripped) = remote_url.strip_prefix(&format!("git@{host}:")) {
        stripped
    } else if let Some(stripped) = remote_url.strip_prefix(&format!("https://{host}/")) {
        stripped
    } else if let Some(stripped) = remote_url.strip_prefix(&format!("http://{host}/")) {
        stripped
    } else {
        return None;
    };

    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Detect the forge provider from a remote URL.
pub fn detect_provider(remote_url: &str) -> Option<ForgeProvider> {
    if parse_owner_repo(remote_url, "github.com").is_some() {
        return Some(ForgeProvider::GitHub);
    }

    #[cfg(feature = "gitlab")]
    if parse_owner_repo(remote_url, "gitlab.com").is_some() {
        return Some(ForgeProvider::GitLab);
    }

    None
}

/// Create a forge from a remote URL and token, auto-detecting the provider
/// unless `provider_override` names one explicitly.
pub fn create_forge(
    remote_url: &str,
    token: &str,
    provider_override: Option<&str>,
) -> Result<Box<dyn Forge>, ForgeError> {
    let provider = if let Some(name) = provider_override {
        resolve_provider_override(name)?
    } else {
        detect_provider(remote_url).ok_or_else(|| {
            ForgeError::NotFound(format!(
                "could not detect forge provider from remote URL: {remote_url}. supported: {}",
                available_providers_string()
            ))
        })?
    };

    create_forge_for_provider(provider, remote_url, token)
}

fn resolve_provider_override(name: &str) -> Result<ForgeProvider, ForgeError> {
    if let Some(provider) = ForgeProvider::parse(name) {
        return Ok(provider);
    }

    if is_known_but_disabled(name) {
        return Err(ForgeError::NotImplemented(format!(
            "forge '{name}' is not enabled in this build. rebuild with `--features {name}` to enable it."
        )));
    }

    Err(ForgeError::NotFound(format!(
        "unknown forge provider '{name}'. available providers: {}",
        available_providers_string()
    )))
}

fn is_known_but_disabled(name: &str) -> bool {
    match name.to_lowercase().as_str() {
        #[cfg(not(feature = "gitlab"))]
        "gitlab" => true,
        _ => false,
    }
}

fn create_forge_for_provider(
    provider: ForgeProvider,
    remote_url: &str,
    token: &str,
) -> Result<Box<dyn Forge>, ForgeError> {
    match provider {
        ForgeProvider::GitHub => {
            let (owner, repo) = parse_owner_repo(remote_url, "github.com").ok_or_else(|| {
                ForgeError::NotFound(format!(
                    "could not parse '{remote_url}' as a GitHub URL. \
                     expected git@github.com:owner/repo.git or https://github.com/owner/repo.git"
                ))
            })?;
            Ok(Box::new(RestForge::new(Provider::GitHub, token, owner, repo)))
        }
        #[cfg(feature = "gitlab")]
        ForgeProvider::GitLab => {
            let (owner, repo) = parse_owner_repo(remote_url, "gitlab.com").ok_or_else(|| {
                ForgeError::NotFound(format!(
                    "could not parse '{remote_url}' as a GitLab URL. \
                     expected git@gitlab.com:owner/project.git or https://gitlab.com/owner/project.git"
                ))
            })?;
            Ok(Box::new(RestForge::new(Provider::GitLab, token, owner, repo)))
        }
    }
}

fn available_providers_string() -> String {
    ForgeProvider::all().iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
}

/// Valid forge names for config validation — includes providers not
/// enabled by the current feature set so config can be checked ahead of a
/// rebuild.
pub fn valid_forge_names() -> &'static [&'static str] {
    &["github", "gitlab"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_includes_github() {
        assert!(ForgeProvider::all().contains(&ForgeProvider::GitHub));
    }

    #[test]
    fn detect_provider_matches_github_ssh_url() {
        assert_eq!(detect_provider("git@github.com:owner/repo.git"), Some(ForgeProvider::GitHub));
    }

    #[test]
    fn detect_provider_matches_github_https_url() {
        assert_eq!(detect_provider("https://github.com/owner/repo.git"), Some(ForgeProvider::GitHub));
    }

    #[test]
    fn detect_provider_rejects_unknown_host() {
        assert_eq!(detect_provider("git@bitbucket.org:owner/repo.git"), None);
    }

    #[test]
    fn create_forge_with_unknown_override_fails() {
        let err = create_forge("git@github.com:owner/repo.git", "tok", Some("bitbucket"));
        assert!(err.is_err());
    }
}
