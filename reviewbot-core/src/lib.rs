pub mod compose;
pub mod position;
pub mod types;

pub use compose::{compose_review, verdict_for_score, ReviewPayload, Verdict};
pub use position::{map_comments, MappedComments};
pub use types::{
    AbstractComment, AnalysisResult, CategoryScores, FilePatch, FixSuggestion, GeneralComment,
    InlineComment,
};
