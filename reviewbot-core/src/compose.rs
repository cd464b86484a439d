//! Turning an analysis result into a postable review payload.

use serde::{Deserialize, Serialize};

use crate::position::MappedComments;
use crate::types::{AnalysisResult, InlineComment};

/// Review verdict, serialized as the event names the hosting
/// platform's review API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "APPROVE")]
    Approve,
    #[serde(rename = "REQUEST_CHANGES")]
    RequestChanges,
    #[serde(rename = "COMMENT")]
    Comment,
}

/// The complete review as posted to the host: summary body, verdict,
/// and positioned inline comments.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPayload {
    pub body: String,
    pub event: Verdict,
    pub comments: Vec<InlineComment>,
}

/// Select the review verdict from the overall score.
///
/// Scores strictly below 50 request changes; 80 and above approve;
/// everything in between (50 included) is a plain comment.
pub fn verdict_for_score(score: u8) -> Verdict {
    if score < 50 {
        Verdict::RequestChanges
    } else if score >= 80 {
        Verdict::Approve
    } else {
        Verdict::Comment
    }
}

fn format_review_body(result: &AnalysisResult) -> String {
    format!(
        "## 🤖 AI Code Review Summary\n\n\
         **Overall Score: {}/100**\n\n\
         {}\n\n\
         ### 📊 Category Scores:\n\
         - ✅ **Lint & Style**: {}/100\n\
         - 🐛 **Bug Detection**: {}/100\n\
         - 🔒 **Security**: {}/100\n\
         - ⚡ **Performance**: {}/100\n\n\
         *This review was automatically generated by an AI code review system.*",
        result.score,
        result.summary,
        result.categories.lint,
        result.categories.bugs,
        result.categories.security,
        result.categories.performance,
    )
}

/// Compose the review payload from an analysis result and its mapped
/// comments.
///
/// General (unmapped) comments are not lost: they are appended to the
/// review body as a labeled addendum.
pub fn compose_review(result: &AnalysisResult, mapped: MappedComments) -> ReviewPayload {
    let mut body = format_review_body(result);

    if !mapped.general.is_empty() {
        body.push_str("\n\n### ⚡ General Comments:\n");
        let addendum = mapped
            .general
            .iter()
            .map(|c| format!("- {}", c.body))
            .collect::<Vec<_>>()
            .join("\n");
        body.push_str(&addendum);
    }

    ReviewPayload {
        body,
        event: verdict_for_score(result.score),
        comments: mapped.inline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryScores, GeneralComment};

    fn result_with_score(score: u8) -> AnalysisResult {
        AnalysisResult {
            score,
            categories: CategoryScores {
                lint: 90,
                bugs: 70,
                security: 85,
                performance: 60,
            },
            summary: "Looks mostly fine.".to_string(),
            comments: Vec::new(),
            fix_suggestions: Vec::new(),
        }
    }

    #[test]
    fn test_verdict_boundaries() {
        assert_eq!(verdict_for_score(0), Verdict::RequestChanges);
        assert_eq!(verdict_for_score(49), Verdict::RequestChanges);
        assert_eq!(verdict_for_score(50), Verdict::Comment);
        assert_eq!(verdict_for_score(79), Verdict::Comment);
        assert_eq!(verdict_for_score(80), Verdict::Approve);
        assert_eq!(verdict_for_score(100), Verdict::Approve);
    }

    #[test]
    fn test_verdict_serializes_as_host_event_name() {
        assert_eq!(
            serde_json::to_string(&Verdict::RequestChanges).unwrap(),
            "\"REQUEST_CHANGES\""
        );
        assert_eq!(serde_json::to_string(&Verdict::Approve).unwrap(), "\"APPROVE\"");
        assert_eq!(serde_json::to_string(&Verdict::Comment).unwrap(), "\"COMMENT\"");
    }

    #[test]
    fn test_body_renders_scores_and_summary() {
        let payload = compose_review(&result_with_score(72), MappedComments::default());
        assert_eq!(payload.event, Verdict::Comment);
        assert!(payload.body.contains("**Overall Score: 72/100**"));
        assert!(payload.body.contains("Looks mostly fine."));
        assert!(payload.body.contains("**Lint & Style**: 90/100"));
        assert!(payload.body.contains("**Bug Detection**: 70/100"));
        assert!(payload.body.contains("**Security**: 85/100"));
        assert!(payload.body.contains("**Performance**: 60/100"));
        assert!(!payload.body.contains("General Comments"));
    }

    #[test]
    fn test_general_comments_appended_to_body() {
        let mapped = MappedComments {
            inline: Vec::new(),
            general: vec![
                GeneralComment {
                    path: "a.rs".to_string(),
                    body: "📌 [General Comment on a.rs] first".to_string(),
                },
                GeneralComment {
                    path: "b.rs".to_string(),
                    body: "📌 [General Comment on b.rs] second".to_string(),
                },
            ],
        };

        let payload = compose_review(&result_with_score(85), mapped);
        assert_eq!(payload.event, Verdict::Approve);
        assert!(payload.body.contains("### ⚡ General Comments:"));
        assert!(payload.body.contains("- 📌 [General Comment on a.rs] first"));
        assert!(payload.body.contains("- 📌 [General Comment on b.rs] second"));
        assert!(payload.comments.is_empty());
    }
}
