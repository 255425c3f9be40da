//! Continuous speech recognition lifecycle and the auto-restart policy.

use super::timer::{TimerTask, Timers};
use shared::VoiceStatus;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Speech recognition is not supported")]
    Unavailable,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No speech detected")]
    NoSpeech,

    #[error("Recognition aborted")]
    Aborted,

    #[error("Recognition already started")]
    AlreadyStarted,

    #[error("Recognition failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub is_final: bool,
}

impl Transcript {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Result(Transcript),
    Error(RecognitionError),
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerSettings {
    pub continuous: bool,
    pub interim_results: bool,
    pub locale: String,
}

impl RecognizerSettings {
    pub fn continuous(locale: impl Into<String>) -> Self {
        Self {
            continuous: true,
            interim_results: true,
            locale: locale.into(),
        }
    }
}

/// The platform recognizer. Results arrive separately as [`RecognitionEvent`]s.
pub trait SpeechRecognizer {
    fn is_available(&self) -> bool;
    fn configure(&mut self, settings: &RecognizerSettings);
    fn start(&mut self) -> Result<(), RecognitionError>;
    fn stop(&mut self);
}

/// What the engine has to do after the listener handled something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutput {
    Idle,
    Status(VoiceStatus, &'static str),
    Transcript(Transcript),
}

pub struct RecognitionListener<R> {
    recognizer: R,
    settings: RecognizerSettings,
    restart_delay: Duration,
    supported: bool,
    listening: bool,
    enabled: bool,
    suspended: bool,
    permission_denied: bool,
    failed_this_cycle: bool,
    faulted: bool,
}

impl<R: SpeechRecognizer> RecognitionListener<R> {
    pub fn new(mut recognizer: R, settings: RecognizerSettings, restart_delay: Duration) -> Self {
        let supported = recognizer.is_available();
        if supported {
            recognizer.configure(&settings);
            info!("Speech recognition ready ({})", settings.locale);
        } else {
            warn!("Speech recognition not supported");
        }

        Self {
            recognizer,
            settings,
            restart_delay,
            supported,
            listening: false,
            enabled: false,
            suspended: false,
            permission_denied: false,
            failed_this_cycle: false,
            faulted: false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Status to show once nothing is processing or speaking. Denial and
    /// missing capability outrank everything else.
    pub fn resting_status(&self) -> (VoiceStatus, &'static str) {
        if !self.supported {
            (VoiceStatus::Error, "Voice recognition not supported")
        } else if self.permission_denied {
            (VoiceStatus::Error, "Microphone permission denied")
        } else if !self.enabled {
            (VoiceStatus::Inactive, "Voice commands ready")
        } else if self.faulted {
            (VoiceStatus::Error, "Voice recognition unavailable")
        } else {
            (VoiceStatus::Listening, "Listening for commands...")
        }
    }

    pub fn settings(&self) -> &RecognizerSettings {
        &self.settings
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn recognizer_mut(&mut self) -> &mut R {
        &mut self.recognizer
    }

    /// User-level start. Never fails; problems come back as a status update.
    pub fn start(&mut self) -> ListenerOutput {
        self.enabled = true;
        self.open()
    }

    /// User-level stop. Auto-restart stays off until the next [`start`](Self::start).
    pub fn stop(&mut self) -> ListenerOutput {
        self.enabled = false;
        self.faulted = false;
        self.close();
        ListenerOutput::Status(VoiceStatus::Inactive, "Voice commands ready")
    }

    /// Closes the microphone while speech output is playing.
    pub fn suspend(&mut self) {
        if !self.suspended {
            debug!("Suspending recognition for speech output");
        }
        self.suspended = true;
        self.close();
    }

    /// Allows restarts again; the caller schedules the actual resume.
    pub fn lift_suspension(&mut self) {
        self.suspended = false;
    }

    /// Clears a permission denial after the user granted access again.
    pub fn regrant_permission(&mut self) {
        if self.permission_denied {
            info!("Microphone permission re-granted");
        }
        self.permission_denied = false;
    }

    /// Fired by the restart and resume timers.
    pub fn reopen(&mut self) -> ListenerOutput {
        if !self.enabled || self.suspended || self.listening {
            return ListenerOutput::Idle;
        }
        debug!("Attempting to restart recognition");
        self.open()
    }

    pub fn handle(&mut self, event: RecognitionEvent, timers: &mut Timers) -> ListenerOutput {
        match event {
            RecognitionEvent::Started => {
                self.listening = true;
                self.failed_this_cycle = false;
                self.faulted = false;
                ListenerOutput::Status(VoiceStatus::Listening, "Listening for commands...")
            }
            RecognitionEvent::Result(transcript) => {
                if !self.enabled {
                    debug!("Dropping transcript after stop: '{}'", transcript.text);
                    return ListenerOutput::Idle;
                }
                if !transcript.is_final {
                    debug!("Interim transcript: '{}'", transcript.text);
                    return ListenerOutput::Idle;
                }
                if transcript.text.trim().is_empty() {
                    return ListenerOutput::Idle;
                }
                ListenerOutput::Transcript(transcript)
            }
            RecognitionEvent::Error(err) => self.handle_error(err),
            RecognitionEvent::Ended => self.handle_ended(timers),
        }
    }

    fn handle_error(&mut self, err: RecognitionError) -> ListenerOutput {
        match err {
            RecognitionError::NoSpeech => {
                debug!("No speech detected");
                ListenerOutput::Idle
            }
            RecognitionError::Aborted => {
                debug!("Recognition aborted (expected during speech)");
                self.listening = false;
                ListenerOutput::Idle
            }
            RecognitionError::AlreadyStarted => {
                self.listening = true;
                ListenerOutput::Idle
            }
            RecognitionError::PermissionDenied => {
                error!("Speech recognition error: {}", err);
                self.listening = false;
                self.permission_denied = true;
                ListenerOutput::Status(VoiceStatus::Error, "Microphone permission denied")
            }
            RecognitionError::Unavailable => {
                error!("Speech recognition error: {}", err);
                self.listening = false;
                self.supported = false;
                ListenerOutput::Status(VoiceStatus::Error, "Voice recognition not supported")
            }
            RecognitionError::Other(_) => {
                error!("Speech recognition error: {}", err);
                self.listening = false;
                self.failed_this_cycle = true;
                self.faulted = true;
                ListenerOutput::Status(VoiceStatus::Error, "Voice recognition unavailable")
            }
        }
    }

    fn handle_ended(&mut self, timers: &mut Timers) -> ListenerOutput {
        self.listening = false;
        let failed = std::mem::take(&mut self.failed_this_cycle);

        if self.permission_denied || !self.supported || failed {
            debug!("Recognition ended after an error, not restarting");
            return ListenerOutput::Idle;
        }
        if self.suspended {
            debug!("Recognition ended while speaking");
            return ListenerOutput::Idle;
        }
        if self.enabled {
            timers.reschedule(self.restart_delay, TimerTask::RestartRecognition);
            return ListenerOutput::Idle;
        }
        ListenerOutput::Status(VoiceStatus::Inactive, "Voice commands ready")
    }

    fn open(&mut self) -> ListenerOutput {
        if !self.supported {
            info!("Speech recognition unavailable, ignoring start request");
            return ListenerOutput::Status(VoiceStatus::Error, "Voice recognition not supported");
        }
        if self.permission_denied {
            warn!("Microphone permission denied, not starting recognition");
            return ListenerOutput::Status(VoiceStatus::Error, "Microphone permission denied");
        }
        if self.listening {
            return ListenerOutput::Idle;
        }
        if self.suspended {
            debug!("Recognition start deferred until speech ends");
            return ListenerOutput::Idle;
        }

        match self.recognizer.start() {
            Ok(()) | Err(RecognitionError::AlreadyStarted) => {
                self.listening = true;
                self.faulted = false;
                ListenerOutput::Idle
            }
            Err(RecognitionError::Unavailable) => {
                warn!("Speech recognition not supported");
                self.supported = false;
                ListenerOutput::Status(VoiceStatus::Error, "Voice recognition not supported")
            }
            Err(RecognitionError::PermissionDenied) => {
                error!("Failed to start voice recognition: permission denied");
                self.permission_denied = true;
                ListenerOutput::Status(VoiceStatus::Error, "Microphone permission denied")
            }
            Err(e) => {
                error!("Failed to start voice recognition: {}", e);
                self.faulted = true;
                ListenerOutput::Status(VoiceStatus::Error, "Click to activate voice")
            }
        }
    }

    fn close(&mut self) {
        if self.listening {
            self.recognizer.stop();
            self.listening = false;
        }
    }
}
