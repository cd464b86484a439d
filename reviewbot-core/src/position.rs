//! Mapping of analysis comments onto the host's diff-position scheme.
//!
//! Inline review APIs address comments by "position": the 1-based
//! offset of a line within a file's patch text, counting the hunk
//! header as the first entry. This module turns (file, logical line)
//! comments into positioned comments, degrading to file-level general
//! comments whenever a position cannot be computed.

use crate::types::{AbstractComment, FilePatch, GeneralComment, InlineComment};

/// Marker prefixed to every inline comment body so automated output is
/// distinguishable from human reviewers.
pub const INLINE_MARKER: &str = "🤖 **AI Suggestion:**";

/// Result of mapping a batch of analysis comments against a file list.
///
/// Every non-empty input comment lands in exactly one of the two
/// sequences; comments with an empty body are dropped.
#[derive(Debug, Default)]
pub struct MappedComments {
    pub inline: Vec<InlineComment>,
    pub general: Vec<GeneralComment>,
}

/// Parse the new-file start line (the `c` in `@@ -a,b +c,d @@`) from a
/// hunk header line. Returns `None` for anything that is not a
/// well-formed header.
fn parse_hunk_header(line: &str) -> Option<u64> {
    let rest = line.strip_prefix("@@ -")?;
    let plus = rest.find('+')?;
    let after = &rest[plus + 1..];
    let digits_end = after
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after.len());
    if digits_end == 0 || !after[digits_end..].contains("@@") {
        return None;
    }
    after[..digits_end].parse().ok()
}

/// New-file start line of the first hunk in a patch, or 1 if no hunk
/// header can be found.
fn first_hunk_new_start(patch: &str) -> u64 {
    patch.split('\n').find_map(parse_hunk_header).unwrap_or(1)
}

/// Resolve a comment's path against the host's file list: exact
/// filename match first, then basename equality or suffix match. An
/// empty path resolves to nothing (every filename ends with "", so the
/// suffix rule would otherwise pick an arbitrary file).
fn resolve_file<'a>(files: &'a [FilePatch], path: &str) -> Option<&'a FilePatch> {
    if path.is_empty() {
        return None;
    }
    files.iter().find(|f| f.filename == path).or_else(|| {
        files.iter().find(|f| {
            basename(&f.filename) == basename(path) || f.filename.ends_with(path)
        })
    })
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Scan a patch for the diff position of `target_line` in the new
/// file.
///
/// The new-file line counter is re-seeded at each hunk header. Added
/// lines are position candidates and advance the counter; context
/// lines advance it without being candidates; removed lines do not
/// advance it. The returned position counts the patch's lines 1-based
/// with the first hunk header occupying slot 1.
fn position_of_line(patch: &str, target_line: u64) -> Option<u64> {
    let mut current_line = 0u64;

    for (idx, line) in patch.split('\n').enumerate() {
        if line.starts_with("@@") {
            if let Some(start) = parse_hunk_header(line) {
                current_line = start;
            }
            continue;
        }

        if line.starts_with('+') {
            if current_line == target_line {
                return Some(idx as u64 + 1);
            }
            current_line += 1;
        } else if !line.starts_with('-') {
            current_line += 1;
        }
    }

    None
}

/// Map analysis comments onto host-postable comments.
///
/// Filename resolution misses, absent patches, and unreachable target
/// lines all degrade to general comments rather than failing; the only
/// comments not emitted at all are those with an empty body.
pub fn map_comments(files: &[FilePatch], comments: &[AbstractComment]) -> MappedComments {
    let mut mapped = MappedComments::default();

    for comment in comments {
        if comment.body.is_empty() {
            continue;
        }

        let file = resolve_file(files, &comment.path);
        let filename = match file {
            Some(f) => f.filename.clone(),
            None if comment.path.is_empty() => "Unknown file".to_string(),
            None => comment.path.clone(),
        };

        // A comment without a line number targets the first hunk of
        // its file; without a patch there is nothing to anchor to.
        let patch = file.and_then(|f| f.patch.as_deref());
        let target_line = comment
            .line
            .or_else(|| patch.map(first_hunk_new_start));

        let position = match (patch, target_line) {
            (Some(patch), Some(line)) => position_of_line(patch, line),
            _ => None,
        };

        match position {
            Some(position) => mapped.inline.push(InlineComment {
                path: filename,
                position,
                body: format!("{} {}", INLINE_MARKER, comment.body),
            }),
            None => mapped.general.push(GeneralComment {
                body: format!("📌 [General Comment on {}] {}", filename, comment.body),
                path: filename,
            }),
        }
    }

    mapped
}
