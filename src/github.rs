use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use crate::error::UpstreamError;
use crate::models::{ActivityEvent, GithubRepo};

/// Read-only access to the public GitHub surfaces the site scrapes.
#[async_trait]
pub trait GithubSource: Send + Sync + 'static {
    async fn public_events(&self, username: &str) -> Result<Vec<ActivityEvent>, UpstreamError>;

    async fn contribution_markup(
        &self,
        username: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<String, UpstreamError>;

    async fn repositories(&self, username: &str, limit: usize) -> Result<Vec<GithubRepo>, UpstreamError>;
}

/// Unauthenticated HTTP client for the GitHub API and profile pages
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    web_base: String,
}

impl GithubClient {
    pub fn new(api_base: &str, web_base: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            web_base: web_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str, accept: &'static str) -> Result<reqwest::Response, UpstreamError> {
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        Ok(response)
    }
}

#[async_trait]
impl GithubSource for GithubClient {
    async fn public_events(&self, username: &str) -> Result<Vec<ActivityEvent>, UpstreamError> {
        let url = format!("{}/users/{}/events/public?per_page=100", self.api_base, username);
        let body: serde_json::Value = self
            .get(&url, "application/vnd.github+json")
            .await?
            .json()
            .await?;

        let serde_json::Value::Array(items) = body else {
            return Err(UpstreamError::Payload("events feed is not an array".to_string()));
        };

        // A single odd record should not cost the whole feed.
        let events = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ActivityEvent>(item) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::debug!("Skipping malformed event: {}", e);
                    None
                }
            })
            .collect();
        Ok(events)
    }

    async fn contribution_markup(
        &self,
        username: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/users/{}/contributions?from={}&to={}",
            self.web_base, username, from, to
        );
        Ok(self.get(&url, "text/html").await?.text().await?)
    }

    async fn repositories(&self, username: &str, limit: usize) -> Result<Vec<GithubRepo>, UpstreamError> {
        let url = format!(
            "{}/users/{}/repos?sort=updated&per_page={}&type=owner",
            self.api_base, username, limit
        );
        let repos = self
            .get(&url, "application/vnd.github+json")
            .await?
            .json::<Vec<GithubRepo>>()
            .await
            .map_err(|e| UpstreamError::Payload(e.to_string()))?;
        Ok(repos)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slashes() {
        let client = GithubClient::new(
            "https://api.github.com/",
            "https://github.com//",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.api_base, "https://api.github.com");
        assert_eq!(client.web_base, "https://github.com");
    }
}
