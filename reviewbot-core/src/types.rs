use serde::{Deserialize, Serialize};

/// One changed file as reported by the hosting platform's per-file
/// patch listing.
///
/// `patch` is absent for binary or rename-only changes; those files
/// contribute no hunks and cannot carry inline comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePatch {
    pub filename: String,
    #[serde(default)]
    pub patch: Option<String>,
}

/// A comment as produced by the analysis service, before any mapping
/// onto the host's diff-position addressing scheme.
///
/// `path` is whatever the analysis named the file, which may not match
/// the host's exact filename. `line` is a logical line number in the
/// new version of the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractComment {
    pub path: String,
    #[serde(default)]
    pub line: Option<u64>,
    pub body: String,
}

/// A suggested patch for one file, passed through verbatim from the
/// analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub path: String,
    pub patch: String,
}

/// Per-category scores on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CategoryScores {
    #[serde(default)]
    pub lint: u8,
    #[serde(default)]
    pub bugs: u8,
    #[serde(default)]
    pub security: u8,
    #[serde(default)]
    pub performance: u8,
}

/// The full result of one analysis run over a diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: u8,
    #[serde(default)]
    pub categories: CategoryScores,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub comments: Vec<AbstractComment>,
    #[serde(default)]
    pub fix_suggestions: Vec<FixSuggestion>,
}

/// A comment anchored to a diff position, postable as part of an
/// inline review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineComment {
    pub path: String,
    pub position: u64,
    pub body: String,
}

/// A comment that could not be anchored to a diff position and is
/// attached at file level instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralComment {
    pub path: String,
    pub body: String,
}
