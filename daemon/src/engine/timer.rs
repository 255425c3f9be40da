//! Virtual-time task wheel.
//!
//! The engine never sleeps. Every delayed continuation (recognition restart,
//! post-speech resume, duplicate-guard expiry...) is scheduled here and fired
//! when the owner advances the clock, so tests can step time exactly.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Re-open recognition after it ended on its own.
    RestartRecognition,
    /// Re-open recognition once speech output has drained.
    ResumeAfterSpeech,
    /// Speak the deferred utterance after an interrupt was acknowledged.
    SpeakDeferred,
    /// Forget the last dictated fragment.
    ClearDictationGuard,
    /// Drop an unanswered destructive-action confirmation.
    ExpireConfirmation,
    /// Return the status signal from processing to listening.
    ResetProcessingStatus,
}

#[derive(Debug, Default)]
pub struct Timers {
    now: Duration,
    next_id: u64,
    entries: BTreeMap<(Duration, TimerId), TimerTask>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert((self.now + delay, id), task);
        tracing::debug!("Scheduled {:?} in {:?}", task, delay);
        id
    }

    /// Schedules `task`, dropping any earlier schedule of the same task first.
    pub fn reschedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.cancel_task(task);
        self.schedule(delay, task)
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.entries.keys().find(|(_, entry_id)| *entry_id == id).copied();
        match key {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn cancel_task(&mut self, task: TimerTask) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, scheduled| *scheduled != task);
        before - self.entries.len()
    }

    pub fn is_scheduled(&self, task: TimerTask) -> bool {
        self.entries.values().any(|scheduled| *scheduled == task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves the clock forward and returns every task that came due, earliest first.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerTask> {
        self.advance_clock(elapsed);
        self.take_due()
    }

    /// Moves the clock forward without firing anything; drain with [`Timers::pop_due`].
    pub fn advance_clock(&mut self, elapsed: Duration) {
        self.now += elapsed;
    }

    /// Pops the earliest task due at or before the current time.
    pub fn pop_due(&mut self) -> Option<TimerTask> {
        let key = *self.entries.keys().next()?;
        if key.0 > self.now {
            return None;
        }
        self.entries.remove(&key)
    }

    fn take_due(&mut self) -> Vec<TimerTask> {
        let mut due = Vec::new();
        while let Some(task) = self.pop_due() {
            due.push(task);
        }
        due
    }
}
