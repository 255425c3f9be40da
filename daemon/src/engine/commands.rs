//! Voice command phrase table.
//!
//! Phrases are normalized (lowercase, single spaces) and kept in an ordered
//! map, so substring scans visit keys lexicographically and every lookup is
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    SignIn,
    ReadInbox,
    ComposeEmail,
    ShowSettings,
    ReadEmail,
    Reply,
    Forward,
    Delete,
    MarkAsSpam,
    SearchEmails,
    Help,
    Repeat,
    Louder,
    Quieter,
    ToggleContrast,
    LargerText,
    ConfirmLargerText,
    GoBack,
    StartDictating,
    StopDictating,
    DictateRecipient,
    DictateSubject,
    DictateMessage,
    SendEmail,
    ConfirmSend,
    SaveDraft,
    ConfirmSave,
    CancelMessage,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 29] = [
        Action::SignIn,
        Action::ReadInbox,
        Action::ComposeEmail,
        Action::ShowSettings,
        Action::ReadEmail,
        Action::Reply,
        Action::Forward,
        Action::Delete,
        Action::MarkAsSpam,
        Action::SearchEmails,
        Action::Help,
        Action::Repeat,
        Action::Louder,
        Action::Quieter,
        Action::ToggleContrast,
        Action::LargerText,
        Action::ConfirmLargerText,
        Action::GoBack,
        Action::StartDictating,
        Action::StopDictating,
        Action::DictateRecipient,
        Action::DictateSubject,
        Action::DictateMessage,
        Action::SendEmail,
        Action::ConfirmSend,
        Action::SaveDraft,
        Action::ConfirmSave,
        Action::CancelMessage,
        Action::Cancel,
    ];

    /// Stable identifier used in config files and status output.
    pub fn id(&self) -> &'static str {
        match self {
            Action::SignIn => "sign-in",
            Action::ReadInbox => "read-inbox",
            Action::ComposeEmail => "compose-email",
            Action::ShowSettings => "show-settings",
            Action::ReadEmail => "read-email",
            Action::Reply => "reply",
            Action::Forward => "forward",
            Action::Delete => "delete",
            Action::MarkAsSpam => "mark-as-spam",
            Action::SearchEmails => "search-emails",
            Action::Help => "help",
            Action::Repeat => "repeat",
            Action::Louder => "louder",
            Action::Quieter => "quieter",
            Action::ToggleContrast => "toggle-contrast",
            Action::LargerText => "larger-text",
            Action::ConfirmLargerText => "confirm-larger-text",
            Action::GoBack => "go-back",
            Action::StartDictating => "start-dictating",
            Action::StopDictating => "stop-dictating",
            Action::DictateRecipient => "dictate-recipient",
            Action::DictateSubject => "dictate-subject",
            Action::DictateMessage => "dictate-message",
            Action::SendEmail => "send-email",
            Action::ConfirmSend => "confirm-send",
            Action::SaveDraft => "save-draft",
            Action::ConfirmSave => "confirm-save",
            Action::CancelMessage => "cancel-message",
            Action::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Action {
    type Err = CommandTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', ' '], "-");
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.id() == wanted)
            .ok_or_else(|| CommandTableError::UnknownAction(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandTableError {
    #[error("Duplicate command phrase: '{0}'")]
    DuplicatePhrase(String),

    #[error("Empty command phrase")]
    EmptyPhrase,

    #[error("Unknown action id: '{0}'")]
    UnknownAction(String),

    #[error("Destructive action '{0}' has no phrase in the command table")]
    UnreachableDestructive(Action),
}

/// Lowercases and collapses runs of whitespace to a single space.
pub fn normalize_phrase(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

const DEFAULT_PHRASES: &[(&str, Action)] = &[
    ("sign in", Action::SignIn),
    ("login", Action::SignIn),
    ("read inbox", Action::ReadInbox),
    ("read all emails", Action::ReadInbox),
    ("compose email", Action::ComposeEmail),
    ("show settings", Action::ShowSettings),
    ("read email", Action::ReadEmail),
    ("reply", Action::Reply),
    ("forward", Action::Forward),
    ("delete", Action::Delete),
    ("mark as spam", Action::MarkAsSpam),
    ("search emails", Action::SearchEmails),
    ("help", Action::Help),
    ("repeat", Action::Repeat),
    ("louder", Action::Louder),
    ("quieter", Action::Quieter),
    ("high contrast", Action::ToggleContrast),
    ("toggle contrast", Action::ToggleContrast),
    ("larger text", Action::LargerText),
    ("confirm larger text", Action::ConfirmLargerText),
    ("go back", Action::GoBack),
    ("start dictating", Action::StartDictating),
    ("stop dictating", Action::StopDictating),
    ("dictate recipient", Action::DictateRecipient),
    ("dictate subject", Action::DictateSubject),
    ("dictate message", Action::DictateMessage),
    ("send email", Action::SendEmail),
    ("confirm send", Action::ConfirmSend),
    ("save draft", Action::SaveDraft),
    ("confirm save", Action::ConfirmSave),
    ("cancel message", Action::CancelMessage),
    ("cancel", Action::Cancel),
];

/// A table hit: the phrase that matched and the action it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    pub phrase: String,
    pub action: Action,
    pub exact: bool,
}

#[derive(Debug, Clone)]
pub struct CommandTable {
    phrases: BTreeMap<String, Action>,
}

impl CommandTable {
    pub fn new<I, S>(entries: I) -> Result<Self, CommandTableError>
    where
        I: IntoIterator<Item = (S, Action)>,
        S: AsRef<str>,
    {
        let mut phrases = BTreeMap::new();
        for (phrase, action) in entries {
            let key = normalize_phrase(phrase.as_ref());
            if key.is_empty() {
                return Err(CommandTableError::EmptyPhrase);
            }
            if phrases.insert(key.clone(), action).is_some() {
                return Err(CommandTableError::DuplicatePhrase(key));
            }
        }
        Ok(Self { phrases })
    }

    /// The built-in English table.
    pub fn english() -> Self {
        let phrases = DEFAULT_PHRASES
            .iter()
            .map(|(phrase, action)| (phrase.to_string(), *action))
            .collect();
        Self { phrases }
    }

    /// The built-in table plus `phrase -> action id` aliases.
    pub fn english_with_aliases<'a, I>(aliases: I) -> Result<Self, CommandTableError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut entries: Vec<(String, Action)> = DEFAULT_PHRASES
            .iter()
            .map(|(phrase, action)| (phrase.to_string(), *action))
            .collect();
        for (phrase, action_id) in aliases {
            entries.push((phrase.clone(), action_id.parse()?));
        }
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn get(&self, phrase: &str) -> Option<Action> {
        self.phrases.get(&normalize_phrase(phrase)).copied()
    }

    pub fn contains_action(&self, action: Action) -> bool {
        self.phrases.values().any(|candidate| *candidate == action)
    }

    /// First phrase that maps to `action`, in table order.
    pub fn phrase_for(&self, action: Action) -> Option<&str> {
        self.phrases
            .iter()
            .find(|(_, candidate)| **candidate == action)
            .map(|(phrase, _)| phrase.as_str())
    }

    /// Exact lookup first, then the longest key contained in the transcript.
    /// Equal-length candidates resolve to the lexicographically smallest key.
    pub fn find(&self, transcript: &str) -> Option<CommandMatch> {
        let normalized = normalize_phrase(transcript);
        if let Some(action) = self.phrases.get(&normalized) {
            return Some(CommandMatch {
                phrase: normalized,
                action: *action,
                exact: true,
            });
        }

        let mut best: Option<(&String, Action)> = None;
        for (phrase, action) in &self.phrases {
            if !normalized.contains(phrase.as_str()) {
                continue;
            }
            // strictly longer only: ties keep the earlier (smaller) key
            if best.map_or(true, |(current, _)| phrase.len() > current.len()) {
                best = Some((phrase, *action));
            }
        }

        best.map(|(phrase, action)| CommandMatch {
            phrase: phrase.clone(),
            action,
            exact: false,
        })
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::english()
    }
}

/// Actions that wait for a spoken "yes" before they run.
#[derive(Debug, Clone)]
pub struct DestructiveActionSet {
    actions: BTreeSet<Action>,
}

impl DestructiveActionSet {
    pub fn new<I>(actions: I, table: &CommandTable) -> Result<Self, CommandTableError>
    where
        I: IntoIterator<Item = Action>,
    {
        let actions: BTreeSet<Action> = actions.into_iter().collect();
        if let Some(missing) = actions.iter().find(|action| !table.contains_action(**action)) {
            return Err(CommandTableError::UnreachableDestructive(*missing));
        }
        Ok(Self { actions })
    }

    pub fn standard(table: &CommandTable) -> Result<Self, CommandTableError> {
        Self::new([Action::Delete, Action::MarkAsSpam], table)
    }

    pub fn contains(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_table_has_every_action() {
        let table = CommandTable::english();
        for action in Action::ALL {
            assert!(table.contains_action(action), "missing phrase for {}", action);
        }
        assert_eq!(table.len(), DEFAULT_PHRASES.len());
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let table = CommandTable::english();
        let hit = table.find("confirm send").unwrap();
        assert_eq!(hit.action, Action::ConfirmSend);
        assert!(hit.exact);

        let hit = table.find("  Cancel  ").unwrap();
        assert_eq!(hit.action, Action::Cancel);
        assert!(hit.exact);
    }

    #[test]
    fn test_longest_substring_wins() {
        let table = CommandTable::english();
        let hit = table.find("please cancel message now").unwrap();
        assert_eq!(hit.phrase, "cancel message");
        assert_eq!(hit.action, Action::CancelMessage);
        assert!(!hit.exact);

        let hit = table.find("ok confirm larger text please").unwrap();
        assert_eq!(hit.action, Action::ConfirmLargerText);
    }

    #[test]
    fn test_equal_length_tie_breaks_lexicographically() {
        let table =
            CommandTable::new([("abc", Action::Help), ("xyz", Action::Repeat)]).unwrap();
        let hit = table.find("xyz then abc").unwrap();
        assert_eq!(hit.phrase, "abc");
        assert_eq!(hit.action, Action::Help);
    }

    #[test]
    fn test_no_match_returns_none() {
        let table = CommandTable::english();
        assert!(table.find("what's the weather").is_none());
        assert!(table.find("").is_none());
    }

    #[test]
    fn test_duplicate_phrase_rejected() {
        let err = CommandTable::new([("Go  Back", Action::GoBack), ("go back", Action::Cancel)])
            .unwrap_err();
        assert_eq!(err, CommandTableError::DuplicatePhrase("go back".to_string()));
    }

    #[test]
    fn test_empty_phrase_rejected() {
        let err = CommandTable::new([("   ", Action::Help)]).unwrap_err();
        assert_eq!(err, CommandTableError::EmptyPhrase);
    }

    #[test]
    fn test_aliases_extend_table() {
        let aliases = BTreeMap::from([
            ("Trash It".to_string(), "delete".to_string()),
            ("new message".to_string(), "compose_email".to_string()),
        ]);
        let table = CommandTable::english_with_aliases(&aliases).unwrap();
        assert_eq!(table.get("trash it"), Some(Action::Delete));
        assert_eq!(table.get("new message"), Some(Action::ComposeEmail));
        assert_eq!(table.len(), DEFAULT_PHRASES.len() + 2);
    }

    #[test]
    fn test_alias_with_unknown_action_rejected() {
        let aliases = BTreeMap::from([("launch".to_string(), "rocket".to_string())]);
        let err = CommandTable::english_with_aliases(&aliases).unwrap_err();
        assert_eq!(err, CommandTableError::UnknownAction("rocket".to_string()));
    }

    #[test]
    fn test_alias_colliding_with_builtin_rejected() {
        let aliases = BTreeMap::from([("help".to_string(), "cancel".to_string())]);
        assert!(matches!(
            CommandTable::english_with_aliases(&aliases),
            Err(CommandTableError::DuplicatePhrase(_))
        ));
    }

    #[test]
    fn test_action_id_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.id().parse::<Action>().unwrap(), action);
        }
        assert_eq!("Mark As Spam".parse::<Action>().unwrap(), Action::MarkAsSpam);
    }

    #[test]
    fn test_destructive_set_requires_table_phrase() {
        let table = CommandTable::new([("delete", Action::Delete)]).unwrap();
        let err = DestructiveActionSet::standard(&table).unwrap_err();
        assert_eq!(err, CommandTableError::UnreachableDestructive(Action::MarkAsSpam));

        let set = DestructiveActionSet::standard(&CommandTable::english()).unwrap();
        assert!(set.contains(Action::Delete));
        assert!(set.contains(Action::MarkAsSpam));
        assert!(!set.contains(Action::Reply));
    }

    #[test]
    fn test_phrase_for_uses_table_order() {
        let table = CommandTable::english();
        assert_eq!(table.phrase_for(Action::SignIn), Some("login"));
        assert_eq!(table.phrase_for(Action::MarkAsSpam), Some("mark as spam"));
    }
}
