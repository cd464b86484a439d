use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use reviewbot_core::{FilePatch, ReviewPayload};

const DIFF_ACCEPT: &str = "application/vnd.github.v3.diff";
const JSON_ACCEPT: &str = "application/vnd.github.v3+json";

/// Read/write operations against the hosting platform, behind a trait
/// so the pipeline and the diff assembler can be exercised with
/// in-process doubles.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Fetch change-request metadata, which carries the diff locator.
    async fn pull_request(&self, repo_name: &str, number: u64) -> Result<PullRequestMeta>;

    /// Fetch the canonical unified diff text from its locator.
    async fn raw_diff(&self, diff_url: &str) -> Result<String>;

    /// Fetch the paginated per-file patch listing.
    async fn pull_request_files(&self, repo_name: &str, number: u64) -> Result<Vec<FilePatch>>;

    /// Post a review and return the host-assigned review id.
    async fn create_review(
        &self,
        repo_name: &str,
        number: u64,
        review: &ReviewPayload,
    ) -> Result<u64>;
}

#[derive(Debug, Deserialize)]
pub struct PullRequestMeta {
    pub number: u64,
    pub diff_url: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    id: u64,
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("reviewbot/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            token,
        }
    }

    fn get(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(url).header("Accept", accept);
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }
}

#[async_trait]
impl HostApi for GitHubClient {
    async fn pull_request(&self, repo_name: &str, number: u64) -> Result<PullRequestMeta> {
        let url = format!("{}/repos/{}/pulls/{}", self.base_url, repo_name, number);

        info!("Fetching PR #{} from {}", number, repo_name);

        let response = self
            .get(&url, JSON_ACCEPT)
            .send()
            .await
            .context("Failed to send pull request metadata request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!("GitHub API error fetching PR: {} - {}", status, error_text);
            return Err(anyhow!(
                "GitHub API error fetching PR: {} - {}",
                status,
                error_text
            ));
        }

        let meta: PullRequestMeta = response
            .json()
            .await
            .context("Failed to parse pull request response")?;

        Ok(meta)
    }

    async fn raw_diff(&self, diff_url: &str) -> Result<String> {
        info!("Fetching canonical diff from {}", diff_url);

        let response = self
            .get(diff_url, DIFF_ACCEPT)
            .send()
            .await
            .context("Failed to send diff request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!(
                "GitHub API error fetching diff: {} - {}",
                status, error_text
            );
            return Err(anyhow!(
                "GitHub API error fetching diff: {} - {}",
                status,
                error_text
            ));
        }

        let diff = response
            .text()
            .await
            .context("Failed to read diff response body")?;
        info!("Fetched diff ({} bytes)", diff.len());

        Ok(diff)
    }

    async fn pull_request_files(&self, repo_name: &str, number: u64) -> Result<Vec<FilePatch>> {
        let mut all_files = Vec::new();
        let mut page = 1;
        let per_page = 100;

        loop {
            let url = format!(
                "{}/repos/{}/pulls/{}/files?page={}&per_page={}",
                self.base_url, repo_name, number, page, per_page
            );

            let response = self
                .get(&url, JSON_ACCEPT)
                .send()
                .await
                .context("Failed to send PR files request")?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .context("Failed to read error response body")?;
                error!(
                    "GitHub API error fetching PR files: {} - {}",
                    status, error_text
                );
                return Err(anyhow!(
                    "GitHub API error fetching PR files: {} - {}",
                    status,
                    error_text
                ));
            }

            let files: Vec<FilePatch> = response
                .json()
                .await
                .context("Failed to parse PR files response")?;
            let page_count = files.len();
            all_files.extend(files);

            // Fewer results than per_page means this was the last page.
            if page_count < per_page {
                break;
            }
            page += 1;
        }

        info!("Found {} changed files for PR #{}", all_files.len(), number);
        Ok(all_files)
    }

    async fn create_review(
        &self,
        repo_name: &str,
        number: u64,
        review: &ReviewPayload,
    ) -> Result<u64> {
        let url = format!(
            "{}/repos/{}/pulls/{}/reviews",
            self.base_url, repo_name, number
        );

        info!(
            "Posting review to PR #{} in {} ({} inline comments)",
            number,
            repo_name,
            review.comments.len()
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Accept", JSON_ACCEPT)
            .json(review);
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder
            .send()
            .await
            .context("Failed to send create review request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!(
                "GitHub API error posting review: {} - {}",
                status, error_text
            );
            return Err(anyhow!(
                "GitHub API error posting review: {} - {}",
                status,
                error_text
            ));
        }

        let review_response: ReviewResponse = response
            .json()
            .await
            .context("Failed to parse review response")?;
        info!("Posted review with ID: {}", review_response.id);

        Ok(review_response.id)
    }
}
