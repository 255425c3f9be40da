//! Voice command and dictation engine.
//!
//! [`VoiceEngine`] wires the recognition listener, the command router, the
//! dictation transformer and the speech player together. It owns every piece
//! of mutable state; the surrounding application is handed in per call as an
//! [`EngineHost`].

pub mod commands;
pub mod dictation;
pub mod listener;
pub mod speech;
pub mod state;
pub mod timer;

use crate::config::Config;
use commands::{Action, CommandTable, CommandTableError, DestructiveActionSet};
use dictation::{DictationOutcome, FocusedField};
use listener::{ListenerOutput, RecognitionEvent, RecognitionListener, RecognizerSettings, SpeechRecognizer};
use shared::{FieldId, Notification, VoiceStatus};
use speech::{Playback, PlayerUpdate, SpeechEvent, SpeechOutput, SpeechPlayer, VoiceSettings};
use state::EngineState;
use std::time::Duration;
use thiserror::Error;
use timer::{TimerId, TimerTask, Timers};
use tracing::{debug, info, warn};

pub use commands::CommandMatch;
pub use listener::{RecognitionError, Transcript};
pub use speech::SpeechError;

const READY_TEXT: &str = "Voice commands ready";
const VOLUME_STEP: f32 = 0.1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("Action not available: {0}")]
    Unsupported(Action),
}

/// The application the engine drives: action targets, focus, notifications
/// and the status indicator.
pub trait EngineHost {
    /// Runs an application action. `Ok(Some(text))` is spoken back.
    fn execute(&mut self, action: Action) -> Result<Option<String>, ActionError>;

    /// Moves focus to `field`; false when the field is not on screen.
    fn focus_field(&mut self, field: FieldId) -> bool;

    fn focused_field(&mut self) -> Option<FocusedField<'_>>;

    fn notify(&mut self, notification: Notification);

    fn status_changed(&mut self, _status: VoiceStatus, _text: &str) {}
}

pub struct VoiceEngine<R, S> {
    table: CommandTable,
    destructive: DestructiveActionSet,
    listener: RecognitionListener<R>,
    player: SpeechPlayer<S>,
    timers: Timers,
    state: EngineState,
    status: VoiceStatus,
    status_text: String,
    confirm_actions: bool,
    confirmation_timeout: Option<Duration>,
    confirmation_timer: Option<TimerId>,
    status_reset: Duration,
    duplicate_window: Duration,
    resume_delay: Duration,
}

impl<R: SpeechRecognizer, S: SpeechOutput> VoiceEngine<R, S> {
    pub fn new(config: &Config, recognizer: R, output: S) -> Result<Self, CommandTableError> {
        let table = CommandTable::english_with_aliases(&config.commands.aliases)?;
        let destructive = DestructiveActionSet::standard(&table)?;

        let listener = RecognitionListener::new(
            recognizer,
            RecognizerSettings::continuous(config.recognition.language.clone()),
            Duration::from_millis(config.recognition.restart_delay_ms),
        );
        let player = SpeechPlayer::new(
            output,
            VoiceSettings {
                rate: config.speech.rate,
                volume: config.speech.volume,
                locale: config.recognition.language.clone(),
                voice: config.speech.voice.clone(),
            },
            config.speech.enabled,
            config.speech.max_chunk_chars,
            Duration::from_millis(config.speech.interrupt_settle_ms),
        );

        info!("Voice engine ready with {} command phrases", table.len());

        Ok(Self {
            table,
            destructive,
            listener,
            player,
            timers: Timers::new(),
            state: EngineState::new(),
            status: VoiceStatus::Inactive,
            status_text: READY_TEXT.to_string(),
            confirm_actions: config.commands.confirm_actions,
            confirmation_timeout: config.commands.confirmation_timeout(),
            confirmation_timer: None,
            status_reset: Duration::from_millis(config.commands.status_reset_ms),
            duplicate_window: Duration::from_millis(config.dictation.duplicate_window_ms),
            resume_delay: Duration::from_millis(config.speech.resume_delay_ms),
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn status(&self) -> (VoiceStatus, &str) {
        (self.status, &self.status_text)
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn listener(&self) -> &RecognitionListener<R> {
        &self.listener
    }

    pub fn player(&self) -> &SpeechPlayer<S> {
        &self.player
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn recognizer_mut(&mut self) -> &mut R {
        self.listener.recognizer_mut()
    }

    pub fn speech_output_mut(&mut self) -> &mut S {
        self.player.output_mut()
    }

    pub fn confirm_actions(&self) -> bool {
        self.confirm_actions
    }

    pub fn set_confirm_actions(&mut self, enabled: bool) {
        self.confirm_actions = enabled;
        if !enabled {
            self.clear_pending();
        }
        info!("Destructive action confirmation {}", if enabled { "on" } else { "off" });
    }

    pub fn start_listening(&mut self, host: &mut dyn EngineHost) {
        info!("Starting voice recognition");
        let output = self.listener.start();
        self.apply(output, host);
    }

    pub fn stop_listening(&mut self, host: &mut dyn EngineHost) {
        info!("Stopping voice recognition");
        self.timers.cancel_task(TimerTask::RestartRecognition);
        self.timers.cancel_task(TimerTask::ResumeAfterSpeech);
        let output = self.listener.stop();
        self.apply(output, host);
    }

    /// Returns whether the listener is enabled afterwards.
    pub fn toggle_listening(&mut self, host: &mut dyn EngineHost) -> bool {
        if self.listener.is_enabled() {
            self.stop_listening(host);
        } else {
            self.start_listening(host);
        }
        self.listener.is_enabled()
    }

    pub fn regrant_permission(&mut self, host: &mut dyn EngineHost) {
        self.listener.regrant_permission();
        if self.listener.is_enabled() {
            let output = self.listener.reopen();
            self.apply(output, host);
        }
    }

    pub fn handle_recognition(&mut self, event: RecognitionEvent, host: &mut dyn EngineHost) {
        let output = self.listener.handle(event, &mut self.timers);
        self.apply(output, host);
    }

    pub fn handle_speech(&mut self, event: SpeechEvent, host: &mut dyn EngineHost) {
        match self.player.on_event(event) {
            PlayerUpdate::FirstChunkStarted => {
                self.set_status(host, VoiceStatus::Speaking, "Speaking...");
            }
            PlayerUpdate::Drained => self.speech_drained(host),
            PlayerUpdate::Continue | PlayerUpdate::Ignored => {}
        }
    }

    /// Moves virtual time forward and runs every task that came due,
    /// including tasks scheduled by the tasks themselves.
    pub fn advance(&mut self, elapsed: Duration, host: &mut dyn EngineHost) {
        self.timers.advance_clock(elapsed);
        while let Some(task) = self.timers.pop_due() {
            debug!("Timer fired: {:?}", task);
            self.fire(task, host);
        }
    }

    /// Entry point for finalized speech, whether recognized or typed.
    pub fn handle_final_transcript(&mut self, text: &str, host: &mut dyn EngineHost) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.state.dictating {
            self.handle_dictation(text, host);
        } else {
            self.route_command(text, host);
        }
    }

    /// Speaks `text`, pausing recognition until the output has drained.
    pub fn speak(&mut self, text: &str, interrupt: bool, host: &mut dyn EngineHost) {
        self.state.last_spoken_text = text.to_string();
        if !self.player.is_available() {
            info!("Text to speak: {}", text);
            return;
        }

        self.timers.cancel_task(TimerTask::RestartRecognition);
        self.timers.cancel_task(TimerTask::ResumeAfterSpeech);
        self.listener.suspend();
        self.sync_listening();

        if self.player.speak(text, interrupt, &mut self.timers) == Playback::Drained {
            self.speech_drained(host);
        }
    }

    fn route_command(&mut self, text: &str, host: &mut dyn EngineHost) {
        info!("Processing voice command: '{}'", text);
        self.set_status(host, VoiceStatus::Processing, "Processing command...");
        self.timers
            .reschedule(self.status_reset, TimerTask::ResetProcessingStatus);

        let transcript = text.to_lowercase();
        if let Some(matched) = self.table.find(&transcript) {
            debug!(
                "Matched '{}' -> {} ({})",
                matched.phrase,
                matched.action,
                if matched.exact { "exact" } else { "substring" }
            );

            if self.confirm_actions && self.destructive.contains(matched.action) {
                self.request_confirmation(matched, host);
                return;
            }
            if matched.action != Action::Cancel && self.state.has_pending() {
                info!("Dropping pending confirmation, superseded by '{}'", matched.phrase);
                self.clear_pending();
            }
            self.run(matched.action, &matched.phrase, host);
            return;
        }

        if let Some(pending) = self.state.pending_confirmation {
            if has_word(&transcript, &["yes", "confirm"]) {
                self.clear_pending();
                let phrase = self.phrase_for(pending);
                self.run(pending, &phrase, host);
            } else if has_word(&transcript, &["no", "cancel"]) {
                self.clear_pending();
                self.speak("Command cancelled.", false, host);
                host.notify(Notification::info("Cancelled"));
            } else {
                debug!("Still waiting for confirmation of {}", pending);
            }
            return;
        }

        self.speak(
            "Command not recognized. Say 'help' to hear available commands.",
            false,
            host,
        );
        host.notify(Notification::error("Command not recognized"));
    }

    fn request_confirmation(&mut self, matched: CommandMatch, host: &mut dyn EngineHost) {
        info!("Awaiting confirmation for {}", matched.action);
        self.state.pending_confirmation = Some(matched.action);
        self.cancel_confirmation_timer();
        self.confirmation_timer = self
            .confirmation_timeout
            .map(|timeout| self.timers.schedule(timeout, TimerTask::ExpireConfirmation));
        let prompt = format!(
            "Are you sure you want to {}? Say \"yes\" to confirm or \"no\" to cancel.",
            matched.phrase
        );
        self.speak(&prompt, false, host);
    }

    fn clear_pending(&mut self) {
        self.state.pending_confirmation = None;
        self.cancel_confirmation_timer();
    }

    fn cancel_confirmation_timer(&mut self) {
        if let Some(id) = self.confirmation_timer.take() {
            self.timers.cancel(id);
        }
    }

    fn phrase_for(&self, action: Action) -> String {
        self.table
            .phrase_for(action)
            .map(str::to_string)
            .unwrap_or_else(|| action.to_string())
    }

    fn run(&mut self, action: Action, phrase: &str, host: &mut dyn EngineHost) {
        match self.dispatch(action, host) {
            Ok(()) => {
                info!("Command executed: {}", phrase);
                host.notify(Notification::success(format!("Command executed: {}", phrase)));
            }
            Err(e) => {
                warn!("Command '{}' failed: {}", phrase, e);
                host.notify(Notification::error(e.to_string()));
                self.speak(&e.to_string(), false, host);
            }
        }
    }

    fn dispatch(&mut self, action: Action, host: &mut dyn EngineHost) -> Result<(), ActionError> {
        match action {
            Action::Repeat => {
                let text = if self.state.last_spoken_text.is_empty() {
                    "Nothing to repeat.".to_string()
                } else {
                    self.state.last_spoken_text.clone()
                };
                self.speak(&text, false, host);
            }
            Action::Louder => {
                let volume = self.player.adjust_volume(VOLUME_STEP);
                debug!("Speech volume now {:.1}", volume);
                self.speak("Volume increased.", false, host);
            }
            Action::Quieter => {
                let volume = self.player.adjust_volume(-VOLUME_STEP);
                debug!("Speech volume now {:.1}", volume);
                self.speak("Volume decreased.", false, host);
            }
            Action::StartDictating => self.start_dictation(host),
            Action::StopDictating => self.stop_dictation(host),
            Action::DictateRecipient => self.dictate_field(FieldId::Recipient, host),
            Action::DictateSubject => self.dictate_field(FieldId::Subject, host),
            Action::DictateMessage => self.dictate_field(FieldId::Body, host),
            Action::Cancel if self.state.has_pending() => {
                self.clear_pending();
                self.speak("Command cancelled.", false, host);
                host.notify(Notification::info("Cancelled"));
            }
            Action::Cancel if self.state.dictating => self.stop_dictation(host),
            _ => {
                if let Some(reply) = host.execute(action)? {
                    self.speak(&reply, false, host);
                }
            }
        }
        Ok(())
    }

    fn start_dictation(&mut self, host: &mut dyn EngineHost) {
        self.state.dictating = true;
        self.speak(
            "Dictation started. Speak your message. Say \"stop dictating\" when finished.",
            false,
            host,
        );
        host.notify(Notification::info("Dictation mode activated"));
    }

    fn stop_dictation(&mut self, host: &mut dyn EngineHost) {
        self.state.dictating = false;
        self.state.last_dictated_fragment.clear();
        self.timers.cancel_task(TimerTask::ClearDictationGuard);
        self.speak("Dictation stopped.", false, host);
        host.notify(Notification::info("Dictation mode deactivated"));
    }

    fn dictate_field(&mut self, field: FieldId, host: &mut dyn EngineHost) {
        if !host.focus_field(field) {
            self.speak("Please open the compose screen first.", false, host);
            return;
        }
        self.state.dictating = true;

        let prompt = match field {
            FieldId::Recipient => {
                "Dictating recipient. Speak the email address. For example, say: john dot smith at company dot com"
            }
            FieldId::Subject => "Dictating subject. Speak the email subject.",
            FieldId::Body => "Dictating message. Speak your email message.",
            FieldId::Search => "Dictating search. Speak your search terms.",
        };
        self.speak(prompt, false, host);
        host.notify(Notification::info(format!(
            "Dictation mode: {}",
            capitalize(field.label())
        )));
    }

    fn handle_dictation(&mut self, text: &str, host: &mut dyn EngineHost) {
        if dictation::is_stop_request(text) {
            self.stop_dictation(host);
            return;
        }

        let outcome = dictation::dictate(text, &self.state.last_dictated_fragment, host.focused_field());
        match outcome {
            DictationOutcome::Inserted { fragment, inserted } => {
                debug!("Dictated '{}'", inserted);
                self.state.last_dictated_fragment = fragment;
                self.timers
                    .reschedule(self.duplicate_window, TimerTask::ClearDictationGuard);
            }
            DictationOutcome::Duplicate => debug!("Skipping duplicate dictation '{}'", text),
            DictationOutcome::Empty => debug!("Nothing left to dictate after control phrases"),
            DictationOutcome::NoFocus => debug!("No focused text field, discarding '{}'", text),
        }
    }

    fn fire(&mut self, task: TimerTask, host: &mut dyn EngineHost) {
        match task {
            TimerTask::RestartRecognition | TimerTask::ResumeAfterSpeech => {
                let output = self.listener.reopen();
                self.apply(output, host);
            }
            TimerTask::SpeakDeferred => {
                if self.player.play_deferred() == Playback::Drained {
                    self.speech_drained(host);
                }
            }
            TimerTask::ClearDictationGuard => self.state.last_dictated_fragment.clear(),
            TimerTask::ExpireConfirmation => {
                self.confirmation_timer = None;
                if let Some(action) = self.state.pending_confirmation.take() {
                    info!("Confirmation for {} timed out", action);
                    host.notify(Notification::info("Confirmation timed out"));
                }
            }
            TimerTask::ResetProcessingStatus => {
                if self.status == VoiceStatus::Processing {
                    self.settle_status(host);
                }
            }
        }
    }

    fn speech_drained(&mut self, host: &mut dyn EngineHost) {
        debug!("Speech output drained");
        self.listener.lift_suspension();
        if self.listener.is_enabled() {
            self.timers
                .reschedule(self.resume_delay, TimerTask::ResumeAfterSpeech);
        }
        self.settle_status(host);
    }

    /// Resting status once nothing is processing or speaking.
    fn settle_status(&mut self, host: &mut dyn EngineHost) {
        let (status, text) = self.listener.resting_status();
        self.set_status(host, status, text);
    }

    fn apply(&mut self, output: ListenerOutput, host: &mut dyn EngineHost) {
        self.sync_listening();
        match output {
            ListenerOutput::Idle => {}
            ListenerOutput::Status(status, text) => self.set_status(host, status, text),
            ListenerOutput::Transcript(transcript) => {
                self.handle_final_transcript(&transcript.text, host);
            }
        }
    }

    fn sync_listening(&mut self) {
        self.state.listening = self.listener.is_listening();
    }

    fn set_status(&mut self, host: &mut dyn EngineHost, status: VoiceStatus, text: &str) {
        if self.status == status && self.status_text == text {
            return;
        }
        debug!("Voice status: {} ({})", status, text);
        self.status = status;
        self.status_text = text.to_string();
        host.status_changed(status, text);
    }
}

/// Whole-word check, so "no" does not fire on "know" or "now".
fn has_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| words.contains(&word))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_word_matches_whole_words() {
        assert!(has_word("yes please", &["yes"]));
        assert!(has_word("ok, confirm.", &["confirm"]));
        assert!(!has_word("i know", &["no"]));
        assert!(!has_word("yesterday", &["yes"]));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("recipient"), "Recipient");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_action_error_messages() {
        assert_eq!(ActionError::Failed("No email selected.".into()).to_string(), "No email selected.");
        assert_eq!(
            ActionError::Unsupported(Action::Reply).to_string(),
            "Action not available: reply"
        );
    }
}
