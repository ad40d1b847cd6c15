//! Sub-answer extraction.
//!
//! Form answers can pack several logical values into one string, separated by
//! the configured delimiter. End users treat spaces around the delimiter as
//! cosmetic, so `" : "` and `":"` must split identically.

use crate::config::Settings;
use crate::forms::Submission;
use crate::mapping::MappingEntry;

/// Extract one delimiter-separated element from a raw answer.
///
/// Returns `None` when the answer is the null sentinel or when `sub_index`
/// points past the split parts; the latter is a data-mapping mismatch and is
/// logged as a warning, not an error. Pure function, no hidden state.
pub fn extract(
    answer_text: &str,
    sub_index: usize,
    delimiter: char,
    null_answer: &str,
) -> Option<String> {
    if answer_text == null_answer {
        tracing::debug!("null answer; no value supplied");
        return None;
    }

    // Fuse " <delim> " to the bare delimiter before splitting.
    let spaced = format!(" {delimiter} ");
    let fused = answer_text.replace(&spaced, &delimiter.to_string());
    let parts: Vec<&str> = fused.split(delimiter).collect();

    if sub_index >= parts.len() {
        tracing::warn!(
            sub_index,
            parts = parts.len(),
            answer = answer_text,
            "answer has fewer elements than mapping expects; check delimiter configuration"
        );
        return None;
    }
    Some(parts[sub_index].trim().to_string())
}

/// Resolve a mapping entry against one submission's answer set.
///
/// A question id missing from the submission (form changed since the mapping
/// was defined) or a question with no answer field at all (e.g. a page-title
/// element) both resolve as absent.
pub fn resolve(submission: &Submission, entry: &MappingEntry, settings: &Settings) -> Option<String> {
    let Some(answer) = submission.answers.get(&entry.answer_id) else {
        tracing::warn!(
            submission = %submission.id,
            question = %entry.answer_id,
            "mapped question missing from submission; re-run setup against the current form"
        );
        return None;
    };
    tracing::trace!(question = %answer.text, "resolving mapped answer");
    let text = answer.answer.as_deref()?;
    extract(
        text,
        entry.sub_index,
        settings.delimiter,
        &settings.null_answer,
    )
}
