use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    /// Bearer token for the hosting platform's API. Optional: without
    /// it requests go out unauthenticated and anonymous rate limits
    /// apply.
    pub github_token: Option<String>,
    pub github_api_url: String,
    /// Webhook signing secret. If unset, inbound deliveries are
    /// accepted without signature verification.
    pub webhook_secret: Option<String>,
    /// Base URL of the analysis service exposing POST /analyze.
    pub analysis_service_url: String,
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let github_api_url =
            env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string());

        let webhook_secret = env::var("GITHUB_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let analysis_service_url = env::var("ANALYSIS_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        Ok(Config {
            github_token,
            github_api_url,
            webhook_secret,
            analysis_service_url,
            port,
            state_dir,
        })
    }
}
