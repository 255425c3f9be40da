use super::commands::Action;

/// Per-session engine state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub listening: bool,
    pub dictating: bool,
    pub pending_confirmation: Option<Action>,
    pub last_dictated_fragment: String,
    pub last_spoken_text: String,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_confirmation.is_some()
    }
}
