//! Recognizer and synthesizer backends used by the daemon.
//!
//! Neither talks to hardware. Transcripts arrive over IPC, and speech is
//! written to the log and echoed back to the client. Both report their
//! lifecycle through queued events that [`crate::state::DaemonState`] feeds
//! to the engine, the same way a platform callback would.

use crate::engine::listener::{RecognitionError, RecognitionEvent, RecognizerSettings, SpeechRecognizer};
use crate::engine::speech::{SpeechError, SpeechEvent, SpeechOutput, VoiceSettings};
use std::collections::VecDeque;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct IpcRecognizer {
    running: bool,
    locale: String,
    events: VecDeque<RecognitionEvent>,
}

impl IpcRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn next_event(&mut self) -> Option<RecognitionEvent> {
        self.events.pop_front()
    }
}

impl SpeechRecognizer for IpcRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn configure(&mut self, settings: &RecognizerSettings) {
        self.locale = settings.locale.clone();
    }

    fn start(&mut self) -> Result<(), RecognitionError> {
        if self.running {
            return Err(RecognitionError::AlreadyStarted);
        }
        debug!("Accepting transcripts ({})", self.locale);
        self.running = true;
        self.events.push_back(RecognitionEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.events.push_back(RecognitionEvent::Ended);
        }
    }
}

/// Logs each chunk and completes it immediately.
#[derive(Debug)]
pub struct ConsoleSpeech {
    spoken: Vec<String>,
    events: VecDeque<SpeechEvent>,
}

impl ConsoleSpeech {
    pub fn new() -> Self {
        Self {
            spoken: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn next_event(&mut self) -> Option<SpeechEvent> {
        self.events.pop_front()
    }

    /// Chunks spoken since the last call.
    pub fn take_spoken(&mut self) -> Vec<String> {
        std::mem::take(&mut self.spoken)
    }
}

impl Default for ConsoleSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechOutput for ConsoleSpeech {
    fn is_available(&self) -> bool {
        true
    }

    fn speak(&mut self, chunk: &str, settings: &VoiceSettings) -> Result<(), SpeechError> {
        info!("Speaking (volume {:.1}): {}", settings.volume, chunk);
        self.spoken.push(chunk.to_string());
        self.events.push_back(SpeechEvent::Started);
        self.events.push_back(SpeechEvent::Ended);
        Ok(())
    }

    fn cancel(&mut self) {
        self.events.clear();
    }
}
