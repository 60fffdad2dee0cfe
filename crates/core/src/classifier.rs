//! Heuristics over free-form assistant text: completion detection and the
//! question-progress count. Both are best-effort pattern matching with no
//! structural guarantee from the gateway, which is why the completion check
//! sits behind a swappable trait so a future backend that returns a discrete
//! "done" flag can replace it without touching the session controller.

/// Phrases that signal the persona has ended the session. Matched
/// case-insensitively as substrings.
pub const COMPLETION_PHRASES: &[&str] = &[
    "interview is complete",
    "interview has concluded",
    "end of our interview",
    "viva is complete",
    "viva has concluded",
];

/// Openers that mark an assistant question as a clarifying aside rather than
/// a new main question.
pub const CLARIFYING_OPENERS: &[&str] = &["could you"];

pub trait CompletionClassifier: Send + Sync {
    fn is_complete(&self, content: &str) -> bool;
}

/// Default classifier: fixed phrase list, case-insensitive substring match.
/// Known fragility: a persona that paraphrases completion differently will
/// not be detected.
#[derive(Debug, Clone, Default)]
pub struct PhraseClassifier;

impl CompletionClassifier for PhraseClassifier {
    fn is_complete(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        COMPLETION_PHRASES.iter().any(|phrase| lower.contains(phrase))
    }
}

/// Progress heuristic: an assistant turn counts as a main question when it
/// contains a question mark and does not open with a clarifying phrase.
/// Both under- and over-counting are possible; the count is display-only
/// and capped by the controller.
pub fn counts_as_question(content: &str) -> bool {
    if !content.contains('?') {
        return false;
    }
    let lower = content.trim_start().to_lowercase();
    !CLARIFYING_OPENERS.iter().any(|opener| lower.starts_with(opener))
}
