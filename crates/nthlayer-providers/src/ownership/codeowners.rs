//! CODEOWNERS catch-all rule as an ownership signal.

use std::time::Duration;

use async_trait::async_trait;

use nthlayer_core::config::ProviderConfig;
use nthlayer_core::domain::{OwnershipSignal, OwnershipSource, OwnerType};
use nthlayer_core::error::ProviderError;
use nthlayer_core::ownership::OwnershipProvider;

use crate::http::build_client;

/// Reads `.github/CODEOWNERS` through the GitHub contents API.
pub struct CodeownersOwnership {
    api_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl CodeownersOwnership {
    /// Build from provider configuration (`url` for GHE/test overrides,
    /// `token`).
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            api_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone(),
            client: build_client(Duration::from_secs(5)),
        }
    }

    /// `https://github.com/org/repo(.git)` or `git://host/org/repo` ->
    /// `org/repo`.
    fn repo_slug(repository: &str) -> Option<String> {
        let trimmed = repository.trim_end_matches('/').trim_end_matches(".git");
        let after_scheme = trimmed.split("://").nth(1).unwrap_or(trimmed);
        let mut segments = after_scheme.split('/');
        let _host = segments.next()?;
        let org = segments.next()?;
        let repo = segments.next()?;
        if org.is_empty() || repo.is_empty() {
            return None;
        }
        Some(format!("{org}/{repo}"))
    }

    async fn fetch_codeowners(&self, slug: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/repos/{}/contents/.github/CODEOWNERS", self.api_url, slug);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.raw+json")
            .header("User-Agent", "nthlayer/0.1");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| ProviderError::Transient {
            provider: self.name().to_string(),
            message: e.to_string(),
        })?;
        match response.status().as_u16() {
            404 => Ok(None),
            status if status >= 400 => Err(ProviderError::Permanent {
                provider: self.name().to_string(),
                message: format!("{url} returned {status}"),
            }),
            _ => Ok(Some(response.text().await.map_err(|e| {
                ProviderError::Transient {
                    provider: self.name().to_string(),
                    message: e.to_string(),
                }
            })?)),
        }
    }
}

/// First owner of the catch-all (`*`) rule, falling back to the first rule
/// in the file.
fn parse_catch_all_owner(content: &str) -> Option<(String, OwnerType)> {
    let mut first_rule_owner = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let pattern = fields.next()?;
        let Some(owner) = fields.next() else {
            continue;
        };
        let parsed = parse_owner_handle(owner);
        if pattern == "*" {
            return Some(parsed);
        }
        if first_rule_owner.is_none() {
            first_rule_owner = Some(parsed);
        }
    }
    first_rule_owner
}

/// `@org/payments-team` is a team; `@alice` is a person.
fn parse_owner_handle(handle: &str) -> (String, OwnerType) {
    let stripped = handle.trim_start_matches('@');
    match stripped.split_once('/') {
        Some((_org, team)) => (team.to_string(), OwnerType::Team),
        None => (stripped.to_string(), OwnerType::User),
    }
}

#[async_trait]
impl OwnershipProvider for CodeownersOwnership {
    fn name(&self) -> &str {
        "codeowners"
    }

    async fn signal(
        &self,
        _service: &str,
        repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError> {
        let Some(slug) = repository.and_then(Self::repo_slug) else {
            return Ok(None);
        };
        let Some(content) = self.fetch_codeowners(&slug).await? else {
            return Ok(None);
        };
        let Some((owner, owner_type)) = parse_catch_all_owner(&content) else {
            return Ok(None);
        };

        let mut signal = OwnershipSignal::team(OwnershipSource::CodeOwners, owner, 0.9);
        signal.owner_type = owner_type;
        Ok(Some(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_repo_slug_parsing() {
        assert_eq!(
            CodeownersOwnership::repo_slug("https://github.com/example/checkout.git"),
            Some("example/checkout".to_string())
        );
        assert_eq!(
            CodeownersOwnership::repo_slug("git://example.com/example/pay"),
            Some("example/pay".to_string())
        );
        assert_eq!(CodeownersOwnership::repo_slug("not-a-url"), None);
    }

    #[test]
    fn test_catch_all_rule_wins() {
        let content = "# comment\n/docs @example/docs-team\n* @example/payments-team\n";
        let (owner, owner_type) = parse_catch_all_owner(content).unwrap();
        assert_eq!(owner, "payments-team");
        assert_eq!(owner_type, OwnerType::Team);
    }

    #[test]
    fn test_falls_back_to_first_rule() {
        let content = "/src @alice\n/docs @bob\n";
        let (owner, owner_type) = parse_catch_all_owner(content).unwrap();
        assert_eq!(owner, "alice");
        assert_eq!(owner_type, OwnerType::User);
    }

    #[tokio::test]
    async fn test_signal_from_fetched_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/example/checkout/contents/.github/CODEOWNERS"))
            .respond_with(ResponseTemplate::new(200).set_body_string("* @example/payments-team\n"))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        let signal = CodeownersOwnership::new(&config)
            .signal("checkout", Some("https://github.com/example/checkout"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.owner, "payments-team");
        assert_eq!(signal.source, OwnershipSource::CodeOwners);
    }

    #[tokio::test]
    async fn test_missing_file_yields_no_signal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/example/checkout/contents/.github/CODEOWNERS"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            url: Some(server.uri()),
            ..Default::default()
        };
        let signal = CodeownersOwnership::new(&config)
            .signal("checkout", Some("https://github.com/example/checkout"))
            .await
            .unwrap();
        assert!(signal.is_none());
    }
}
