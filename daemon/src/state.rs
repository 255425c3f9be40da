use crate::config::Config;
use crate::devices::{ConsoleSpeech, IpcRecognizer};
use crate::engine::listener::{RecognitionEvent, Transcript};
use crate::engine::VoiceEngine;
use crate::mailbox::MailboxHost;
use shared::ipc::{Feedback, FieldId, StatusInfo};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub type DaemonEngine = VoiceEngine<IpcRecognizer, ConsoleSpeech>;

pub struct DaemonState {
    pub config: Config,
    engine: DaemonEngine,
    host: MailboxHost,
    last_tick: Instant,
}

impl DaemonState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let engine = VoiceEngine::new(&config, IpcRecognizer::new(), ConsoleSpeech::new())?;
        Ok(Self {
            config,
            engine,
            host: MailboxHost::new(),
            last_tick: Instant::now(),
        })
    }

    pub fn engine(&self) -> &DaemonEngine {
        &self.engine
    }

    pub fn host(&self) -> &MailboxHost {
        &self.host
    }

    pub fn activate(&mut self) {
        self.engine.start_listening(&mut self.host);
        self.pump();
        info!("Daemon activated");
    }

    pub fn deactivate(&mut self) {
        self.engine.stop_listening(&mut self.host);
        self.pump();
        info!("Daemon deactivated");
    }

    pub fn toggle(&mut self) -> bool {
        let enabled = self.engine.toggle_listening(&mut self.host);
        self.pump();
        enabled
    }

    /// A finalized transcript typed by the user.
    pub fn say(&mut self, text: &str) -> Feedback {
        self.engine.handle_final_transcript(text, &mut self.host);
        self.pump();
        self.drain_feedback()
    }

    /// Goes through the listener, so it is dropped unless listening.
    pub fn recognized(&mut self, transcript: Transcript) -> Feedback {
        self.engine
            .handle_recognition(RecognitionEvent::Result(transcript), &mut self.host);
        self.pump();
        self.drain_feedback()
    }

    pub fn speak(&mut self, text: &str, interrupt: bool) -> Feedback {
        self.engine.speak(text, interrupt, &mut self.host);
        self.pump();
        self.drain_feedback()
    }

    pub fn focus(&mut self, field: Option<FieldId>) -> bool {
        self.host.set_focus(field)
    }

    pub fn set_confirm_actions(&mut self, enabled: bool) {
        self.engine.set_confirm_actions(enabled);
    }

    /// Advances engine time by the wall-clock time since the previous tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.advance(elapsed);
    }

    pub fn advance(&mut self, elapsed: Duration) {
        self.engine.advance(elapsed, &mut self.host);
        self.pump();
    }

    pub fn get_status(&self) -> StatusInfo {
        let state = self.engine.state();
        let (voice_status, _) = self.engine.status();
        StatusInfo {
            is_running: true,
            is_listening: state.listening,
            voice_status,
            is_dictating: state.dictating,
            pending_confirmation: state.pending_confirmation.map(|action| action.to_string()),
            language: self.config.recognition.language.clone(),
            screen: self.host.screen().to_string(),
            focused_field: self.host.focus(),
            compose: self.host.compose().clone(),
        }
    }

    pub fn drain_feedback(&mut self) -> Feedback {
        let (status, _) = self.engine.status();
        Feedback {
            spoken: self.engine.speech_output_mut().take_spoken(),
            notifications: self.host.take_notifications(),
            status,
        }
    }

    /// Feeds queued backend events to the engine until both queues are empty.
    fn pump(&mut self) {
        loop {
            if let Some(event) = self.engine.recognizer_mut().next_event() {
                debug!("Recognition event: {:?}", event);
                self.engine.handle_recognition(event, &mut self.host);
                continue;
            }
            if let Some(event) = self.engine.speech_output_mut().next_event() {
                self.engine.handle_speech(event, &mut self.host);
                continue;
            }
            break;
        }
    }
}
