// Common test helpers for voxmaild engine tests
//
// This module provides:
// - A scripted recognizer and a recording speech output
// - A minimal compose-screen host that records what the engine asks of it
// - A harness that owns an engine plus host and steps virtual time

#![allow(dead_code)]

use shared::{FieldId, Notification, NotificationLevel, VoiceStatus};
use std::time::Duration;
use voxmaild::config::Config;
use voxmaild::engine::commands::Action;
use voxmaild::engine::dictation::{FieldKind, FocusedField};
use voxmaild::engine::listener::{
    RecognitionError, RecognitionEvent, RecognizerSettings, SpeechRecognizer, Transcript,
};
use voxmaild::engine::speech::{SpeechError, SpeechEvent, SpeechOutput, VoiceSettings};
use voxmaild::engine::{ActionError, EngineHost, VoiceEngine};

#[derive(Debug)]
pub struct FakeRecognizer {
    pub available: bool,
    pub fail_with: Option<RecognitionError>,
    pub starts: usize,
    pub stops: usize,
    pub settings: Option<RecognizerSettings>,
}

impl Default for FakeRecognizer {
    fn default() -> Self {
        Self {
            available: true,
            fail_with: None,
            starts: 0,
            stops: 0,
            settings: None,
        }
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn configure(&mut self, settings: &RecognizerSettings) {
        self.settings = Some(settings.clone());
    }

    fn start(&mut self) -> Result<(), RecognitionError> {
        self.starts += 1;
        match self.fail_with.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

#[derive(Debug)]
pub struct FakeSpeech {
    pub available: bool,
    pub spoken: Vec<String>,
    pub volumes: Vec<f32>,
    pub cancels: usize,
}

impl Default for FakeSpeech {
    fn default() -> Self {
        Self {
            available: true,
            spoken: Vec::new(),
            volumes: Vec::new(),
            cancels: 0,
        }
    }
}

impl SpeechOutput for FakeSpeech {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, chunk: &str, settings: &VoiceSettings) -> Result<(), SpeechError> {
        self.spoken.push(chunk.to_string());
        self.volumes.push(settings.volume);
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancels += 1;
    }
}

/// Compose screen with three fields. Every other action just gets recorded.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub executed: Vec<Action>,
    pub notifications: Vec<Notification>,
    pub statuses: Vec<(VoiceStatus, String)>,
    pub compose_open: bool,
    pub focus: Option<FieldId>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub replies: Vec<(Action, String)>,
    pub failures: Vec<(Action, String)>,
}

impl RecordingHost {
    pub fn messages(&self, level: NotificationLevel) -> Vec<&str> {
        self.notifications
            .iter()
            .filter(|notification| notification.level == level)
            .map(|notification| notification.message.as_str())
            .collect()
    }
}

impl EngineHost for RecordingHost {
    fn execute(&mut self, action: Action) -> Result<Option<String>, ActionError> {
        if let Some((_, message)) = self.failures.iter().find(|(failing, _)| *failing == action) {
            return Err(ActionError::Failed(message.clone()));
        }
        self.executed.push(action);
        if action == Action::ComposeEmail {
            self.compose_open = true;
            self.focus = Some(FieldId::Recipient);
        }
        Ok(self
            .replies
            .iter()
            .find(|(replying, _)| *replying == action)
            .map(|(_, reply)| reply.clone()))
    }

    fn focus_field(&mut self, field: FieldId) -> bool {
        if !self.compose_open || field == FieldId::Search {
            return false;
        }
        self.focus = Some(field);
        true
    }

    fn focused_field(&mut self) -> Option<FocusedField<'_>> {
        match self.focus? {
            FieldId::Recipient => Some(FocusedField {
                kind: FieldKind::Email,
                value: &mut self.recipient,
            }),
            FieldId::Subject => Some(FocusedField {
                kind: FieldKind::Text,
                value: &mut self.subject,
            }),
            FieldId::Body => Some(FocusedField {
                kind: FieldKind::Text,
                value: &mut self.body,
            }),
            FieldId::Search => None,
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn status_changed(&mut self, status: VoiceStatus, text: &str) {
        self.statuses.push((status, text.to_string()));
    }
}

pub struct Harness {
    pub engine: VoiceEngine<FakeRecognizer, FakeSpeech>,
    pub host: RecordingHost,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_parts(config, FakeRecognizer::default(), FakeSpeech::default())
    }

    pub fn with_parts(config: Config, recognizer: FakeRecognizer, speech: FakeSpeech) -> Self {
        let engine =
            VoiceEngine::new(&config, recognizer, speech).expect("default command table is valid");
        Self {
            engine,
            host: RecordingHost::default(),
        }
    }

    /// A finalized transcript straight into the router.
    pub fn say(&mut self, text: &str) {
        self.engine.handle_final_transcript(text, &mut self.host);
    }

    /// A finalized transcript delivered by the recognizer.
    pub fn hear(&mut self, text: &str) {
        self.recognition(RecognitionEvent::Result(Transcript::final_text(text)));
    }

    pub fn recognition(&mut self, event: RecognitionEvent) {
        self.engine.handle_recognition(event, &mut self.host);
    }

    pub fn speech(&mut self, event: SpeechEvent) {
        self.engine.handle_speech(event, &mut self.host);
    }

    /// Plays every chunk currently in flight or queued to completion.
    pub fn finish_speech(&mut self) {
        for _ in 0..100 {
            if !self.engine.player().is_speaking() {
                return;
            }
            self.speech(SpeechEvent::Started);
            self.speech(SpeechEvent::Ended);
        }
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.engine.advance(Duration::from_millis(ms), &mut self.host);
    }

    pub fn spoken(&self) -> &[String] {
        &self.engine.player().output().spoken
    }

    pub fn last_spoken(&self) -> Option<&str> {
        self.spoken().last().map(String::as_str)
    }

    pub fn recognizer(&self) -> &FakeRecognizer {
        self.engine.listener().recognizer()
    }

    pub fn status(&self) -> VoiceStatus {
        self.engine.status().0
    }
}
