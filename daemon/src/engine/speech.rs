//! Spoken feedback: chunking plus queue / interrupt playback.

use super::timer::{TimerTask, Timers};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("Speech synthesis is not supported")]
    Unavailable,

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub rate: f32,
    pub volume: f32,
    pub locale: String,
    pub voice: Option<String>,
}

/// Completion signals from the synthesizer, one set per chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Failed(String),
}

pub trait SpeechOutput {
    fn is_available(&self) -> bool;
    fn speak(&mut self, chunk: &str, settings: &VoiceSettings) -> Result<(), SpeechError>;
    fn cancel(&mut self);
}

/// Splits text at sentence ends and packs sentences into chunks of at most
/// `max_chars` characters. Sentences longer than the budget are split on
/// words; a single word longer than the budget becomes its own chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if joined_len(&current, sentence) <= max_chars {
            push_joined(&mut current, sentence);
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if sentence.chars().count() <= max_chars {
            current.push_str(sentence);
            continue;
        }
        for word in sentence.split_whitespace() {
            if joined_len(&current, word) <= max_chars {
                push_joined(&mut current, word);
            } else {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current.push_str(word);
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn joined_len(current: &str, next: &str) -> usize {
    let sep = usize::from(!current.is_empty());
    current.chars().count() + sep + next.chars().count()
}

fn push_joined(current: &mut String, next: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(next);
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let Some(&(end, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }
        sentences.push(&text[start..end]);
        while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
            chars.next();
        }
        start = chars.peek().map_or(text.len(), |(idx, _)| *idx);
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

/// Result of asking the player to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Playing,
    Queued,
    /// Waiting for an interrupted utterance to be cancelled.
    Deferred,
    /// Nothing is playing any more.
    Drained,
}

/// Result of a synthesizer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerUpdate {
    FirstChunkStarted,
    Continue,
    Drained,
    Ignored,
}

pub struct SpeechPlayer<S> {
    output: S,
    settings: VoiceSettings,
    enabled: bool,
    max_chunk_chars: usize,
    interrupt_settle: Duration,
    chunks: VecDeque<String>,
    queue: VecDeque<String>,
    deferred: Option<String>,
    chunk_number: usize,
    in_flight: bool,
}

impl<S: SpeechOutput> SpeechPlayer<S> {
    pub fn new(
        output: S,
        settings: VoiceSettings,
        enabled: bool,
        max_chunk_chars: usize,
        interrupt_settle: Duration,
    ) -> Self {
        Self {
            output,
            settings,
            enabled,
            max_chunk_chars,
            interrupt_settle,
            chunks: VecDeque::new(),
            queue: VecDeque::new(),
            deferred: None,
            chunk_number: 0,
            in_flight: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.enabled && self.output.is_available()
    }

    pub fn is_speaking(&self) -> bool {
        self.in_flight || self.deferred.is_some() || !self.queue.is_empty()
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn output(&self) -> &S {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut S {
        &mut self.output
    }

    /// Nudges the volume, clamped to `[0.1, 1.0]`; returns the new value.
    pub fn adjust_volume(&mut self, delta: f32) -> f32 {
        let volume = ((self.settings.volume + delta) * 10.0).round() / 10.0;
        self.settings.volume = volume.clamp(0.1, 1.0);
        self.settings.volume
    }

    pub fn speak(&mut self, text: &str, interrupt: bool, timers: &mut Timers) -> Playback {
        if interrupt && (self.in_flight || self.deferred.is_some()) {
            if self.in_flight {
                self.output.cancel();
            }
            self.in_flight = false;
            self.chunks.clear();
            self.queue.clear();
            self.deferred = Some(text.to_string());
            timers.reschedule(self.interrupt_settle, TimerTask::SpeakDeferred);
            debug!("Interrupting speech, waiting {:?}", self.interrupt_settle);
            return Playback::Deferred;
        }
        if self.in_flight || self.deferred.is_some() {
            self.queue.push_back(text.to_string());
            return Playback::Queued;
        }
        self.begin(text)
    }

    /// Plays the utterance held back by an interrupt.
    pub fn play_deferred(&mut self) -> Playback {
        match self.deferred.take() {
            Some(text) => self.begin(&text),
            None if self.in_flight => Playback::Playing,
            None => Playback::Drained,
        }
    }

    pub fn on_event(&mut self, event: SpeechEvent) -> PlayerUpdate {
        if !self.in_flight {
            debug!("Ignoring speech event with nothing in flight: {:?}", event);
            return PlayerUpdate::Ignored;
        }
        match event {
            SpeechEvent::Started if self.chunk_number == 1 => PlayerUpdate::FirstChunkStarted,
            SpeechEvent::Started => PlayerUpdate::Continue,
            SpeechEvent::Ended => self.after_chunk(),
            SpeechEvent::Failed(reason) => {
                warn!("Speech synthesis error on chunk {}: {}", self.chunk_number, reason);
                self.after_chunk()
            }
        }
    }

    fn after_chunk(&mut self) -> PlayerUpdate {
        self.in_flight = false;
        match self.next_chunk() {
            Playback::Drained => PlayerUpdate::Drained,
            _ => PlayerUpdate::Continue,
        }
    }

    fn begin(&mut self, text: &str) -> Playback {
        self.load(text);
        self.next_chunk()
    }

    fn load(&mut self, text: &str) {
        self.chunks = chunk_text(text, self.max_chunk_chars).into();
        self.chunk_number = 0;
        debug!("Speaking text in {} chunks", self.chunks.len());
    }

    fn next_chunk(&mut self) -> Playback {
        loop {
            if let Some(chunk) = self.chunks.pop_front() {
                self.chunk_number += 1;
                match self.output.speak(&chunk, &self.settings) {
                    Ok(()) => {
                        self.in_flight = true;
                        return Playback::Playing;
                    }
                    Err(e) => warn!("Skipping chunk {}: {}", self.chunk_number, e),
                }
                continue;
            }
            match self.queue.pop_front() {
                Some(next) => self.load(&next),
                None => {
                    self.in_flight = false;
                    return Playback::Drained;
                }
            }
        }
    }
}
