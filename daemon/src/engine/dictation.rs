//! Dictation: turns finalized speech into text appended to the focused field.

use regex::Regex;
use std::sync::LazyLock;

static CONTROL_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:start|stop)\s+dictat(?:ing|ion)\b").expect("control phrase pattern")
});

static STOP_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstop\s+dictat(?:ing|ion)\b").expect("stop phrase pattern"));

static EMAIL_TOKENS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [("at", "@"), ("dot", "."), ("underscore", "_"), ("dash", "-")]
        .into_iter()
        .map(|(word, symbol)| {
            let pattern = format!(r"\b{}\b", word);
            (Regex::new(&pattern).expect("email token pattern"), symbol)
        })
        .collect()
});

/// How dictated text is shaped for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Email,
    Text,
}

/// Mutable view of the input that currently has focus.
#[derive(Debug)]
pub struct FocusedField<'a> {
    pub kind: FieldKind,
    pub value: &'a mut String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationOutcome {
    /// `fragment` is the cleaned speech (the duplicate-guard key), `inserted`
    /// what was actually appended.
    Inserted { fragment: String, inserted: String },
    Empty,
    Duplicate,
    NoFocus,
}

/// True when the utterance ends dictation instead of adding text.
pub fn is_stop_request(text: &str) -> bool {
    if STOP_PHRASES.is_match(text) {
        return true;
    }
    let normalized = super::commands::normalize_phrase(text);
    normalized == "cancel" || normalized == "cancel dictation"
}

/// Removes start/stop dictation phrases and tidies the leftover whitespace.
pub fn strip_control_phrases(text: &str) -> String {
    let stripped = CONTROL_PHRASES.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Spoken address to address: "john dot smith at example dot com" becomes
/// "john.smith@example.com".
pub fn email_fragment(text: &str) -> String {
    let mut out = text.to_lowercase();
    for (pattern, symbol) in EMAIL_TOKENS.iter() {
        out = pattern.replace_all(&out, *symbol).into_owned();
    }
    out.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Prose fragment, separated from existing content by one space.
pub fn text_fragment(existing: &str, fragment: &str) -> String {
    if existing.is_empty() || existing.ends_with(char::is_whitespace) {
        fragment.to_string()
    } else {
        format!(" {}", fragment)
    }
}

/// Runs one finalized transcript through the dictation pipeline.
///
/// `previous` is the last inserted fragment (empty once the guard expired).
/// The field is only touched on [`DictationOutcome::Inserted`].
pub fn dictate(text: &str, previous: &str, field: Option<FocusedField<'_>>) -> DictationOutcome {
    let fragment = strip_control_phrases(text);
    if fragment.is_empty() {
        return DictationOutcome::Empty;
    }
    if fragment == previous {
        return DictationOutcome::Duplicate;
    }

    let Some(FocusedField { kind, value }) = field else {
        return DictationOutcome::NoFocus;
    };

    let inserted = match kind {
        FieldKind::Email => email_fragment(&fragment),
        FieldKind::Text => text_fragment(value.as_str(), &fragment),
    };
    value.push_str(&inserted);

    DictationOutcome::Inserted { fragment, inserted }
}
