//! Retrieval and reconstruction of a change request's unified diff.
//!
//! The host omits the canonical diff for certain change shapes
//! (merge-only commits, binary-only changes). When that happens the
//! diff is reconstructed from the per-file patch listing instead; the
//! fallback trades completeness (binary files stay unmapped) for
//! availability.

use tracing::{info, warn};

use reviewbot_core::FilePatch;

use crate::error::PipelineError;
use crate::github::HostApi;

pub struct DiffAssembler<'a> {
    host: &'a dyn HostApi,
}

impl<'a> DiffAssembler<'a> {
    pub fn new(host: &'a dyn HostApi) -> Self {
        Self { host }
    }

    /// Fetch or reconstruct the unified diff for a change request.
    ///
    /// Returns an empty string when the change has no analyzable file
    /// hunks; that is a valid outcome, not an error. Fails with
    /// `UpstreamUnavailable` when any host endpoint errors.
    pub async fn fetch(&self, repo_name: &str, number: u64) -> Result<String, PipelineError> {
        let meta = self
            .host
            .pull_request(repo_name, number)
            .await
            .map_err(PipelineError::UpstreamUnavailable)?;

        let raw = self
            .host
            .raw_diff(&meta.diff_url)
            .await
            .map_err(PipelineError::UpstreamUnavailable)?;

        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }

        warn!(
            "Canonical diff for PR #{} is empty, stitching from file patches",
            number
        );

        let files = self
            .host
            .pull_request_files(repo_name, number)
            .await
            .map_err(PipelineError::UpstreamUnavailable)?;

        let combined = stitch_file_patches(&files);
        if combined.trim().is_empty() {
            info!("PR #{} has no file changes to analyze", number);
            return Ok(String::new());
        }

        Ok(combined)
    }
}

/// Synthesize a unified diff from per-file patches: a minimal
/// `diff --git` header per file followed by its hunks, in listing
/// order. Files without a patch (binary, pure rename) are skipped.
fn stitch_file_patches(files: &[FilePatch]) -> String {
    let mut combined = String::new();

    for file in files {
        let patch = match file.patch.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => continue,
        };
        combined.push_str(&format!(
            "diff --git a/{} b/{}\n",
            file.filename, file.filename
        ));
        combined.push_str(patch);
        combined.push('\n');
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::PullRequestMeta;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use reviewbot_core::ReviewPayload;

    struct FakeHost {
        diff: Result<String, String>,
        files: Vec<FilePatch>,
        metadata_down: bool,
    }

    impl FakeHost {
        fn with_diff(diff: &str) -> Self {
            Self {
                diff: Ok(diff.to_string()),
                files: Vec::new(),
                metadata_down: false,
            }
        }

        fn with_files(files: Vec<FilePatch>) -> Self {
            Self {
                diff: Ok(String::new()),
                files,
                metadata_down: false,
            }
        }
    }

    #[async_trait]
    impl HostApi for FakeHost {
        async fn pull_request(&self, repo_name: &str, number: u64) -> Result<PullRequestMeta> {
            if self.metadata_down {
                return Err(anyhow!("connection refused"));
            }
            Ok(PullRequestMeta {
                number,
                diff_url: format!("https://example.test/{}/{}.diff", repo_name, number),
                state: Some("open".to_string()),
                html_url: None,
            })
        }

        async fn raw_diff(&self, _diff_url: &str) -> Result<String> {
            self.diff.clone().map_err(|e| anyhow!(e))
        }

        async fn pull_request_files(&self, _repo: &str, _number: u64) -> Result<Vec<FilePatch>> {
            Ok(self.files.clone())
        }

        async fn create_review(
            &self,
            _repo: &str,
            _number: u64,
            _review: &ReviewPayload,
        ) -> Result<u64> {
            unreachable!("diff assembly never posts reviews")
        }
    }

    fn patch_file(name: &str, patch: Option<&str>) -> FilePatch {
        FilePatch {
            filename: name.to_string(),
            patch: patch.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_canonical_diff_returned_directly() {
        let host = FakeHost::with_diff("diff --git a/x b/x\n+added\n");
        let assembler = DiffAssembler::new(&host);

        let diff = assembler.fetch("owner/repo", 1).await.unwrap();
        assert_eq!(diff, "diff --git a/x b/x\n+added");
    }

    #[tokio::test]
    async fn test_fallback_stitches_patches_in_listing_order() {
        let host = FakeHost::with_files(vec![
            patch_file("first.rs", Some("@@ -1,1 +1,2 @@\n+one")),
            patch_file("second.rs", Some("@@ -3,1 +3,2 @@\n+two")),
        ]);
        let assembler = DiffAssembler::new(&host);

        let diff = assembler.fetch("owner/repo", 2).await.unwrap();
        let first = diff.find("diff --git a/first.rs b/first.rs").unwrap();
        let second = diff.find("diff --git a/second.rs b/second.rs").unwrap();
        assert!(first < second);
        assert_eq!(diff.matches("diff --git").count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_skips_files_without_patch() {
        let host = FakeHost::with_files(vec![
            patch_file("logo.png", None),
            patch_file("code.rs", Some("@@ -1,1 +1,2 @@\n+x")),
        ]);
        let assembler = DiffAssembler::new(&host);

        let diff = assembler.fetch("owner/repo", 3).await.unwrap();
        assert!(!diff.contains("logo.png"));
        assert!(diff.contains("diff --git a/code.rs b/code.rs"));
    }

    #[tokio::test]
    async fn test_no_changes_yields_empty_string_not_error() {
        let host = FakeHost::with_files(vec![patch_file("logo.png", None)]);
        let assembler = DiffAssembler::new(&host);

        let diff = assembler.fetch("owner/repo", 4).await.unwrap();
        assert_eq!(diff, "");
    }

    #[tokio::test]
    async fn test_unreachable_metadata_is_upstream_unavailable() {
        let host = FakeHost {
            diff: Ok(String::new()),
            files: Vec::new(),
            metadata_down: true,
        };
        let assembler = DiffAssembler::new(&host);

        let err = assembler.fetch("owner/repo", 5).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamUnavailable(_)));
    }
}
