//! Deterministic speech adapters for tests and dry runs.
//!
//! Neither fake does anything on its own: the test decides when an utterance
//! ends, fails, or finishes playing, so sequences of transcripts and
//! callbacks can be asserted exactly.

use super::{CaptureId, RecognitionEvent, SpeechRecognizer, SpeechSynthesizer};
use crate::error::SpeechError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Calls made on a [`ScriptedRecognizer`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerCall {
    Start,
    Stop,
    Cancel,
    Reset,
}

/// A recognizer whose utterances are finished by the test.
pub struct ScriptedRecognizer {
    supported: bool,
    listening: AtomicBool,
    deny_microphone: AtomicBool,
    last_capture: AtomicU64,
    transcript: Mutex<String>,
    calls: Mutex<Vec<RecognizerCall>>,
    events: broadcast::Sender<RecognitionEvent>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::with_support(true)
    }

    /// A recognizer whose capability probe fails.
    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            supported,
            listening: AtomicBool::new(false),
            deny_microphone: AtomicBool::new(false),
            last_capture: AtomicU64::new(0),
            transcript: Mutex::new(String::new()),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Makes every following `start_listening` fail as if microphone access
    /// had been refused.
    pub fn deny_microphone(&self, deny: bool) {
        self.deny_microphone.store(deny, Ordering::SeqCst);
    }

    /// The id handed out by the most recent `start_listening`.
    pub fn current_capture(&self) -> CaptureId {
        CaptureId(self.last_capture.load(Ordering::SeqCst))
    }

    /// Ends the current utterance with `transcript`. Does nothing if the
    /// recognizer is not listening.
    pub fn finish_with(&self, transcript: &str) {
        if !self.listening.swap(false, Ordering::SeqCst) {
            tracing::debug!("finish_with called while not listening; ignored");
            return;
        }
        *lock(&self.transcript) = transcript.to_string();
        let _ = self.events.send(RecognitionEvent::Ended {
            capture: self.current_capture(),
            transcript: transcript.to_string(),
        });
    }

    /// Fails the current utterance as the engine would on a network or
    /// device error.
    pub fn fail(&self, message: &str) {
        self.listening.store(false, Ordering::SeqCst);
        let _ = self.events.send(RecognitionEvent::Error {
            capture: self.current_capture(),
            message: message.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<RecognizerCall> {
        lock(&self.calls).clone()
    }

    pub fn start_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| **call == RecognizerCall::Start)
            .count()
    }

    fn record(&self, call: RecognizerCall) {
        lock(&self.calls).push(call);
    }
}

impl Default for ScriptedRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn transcript(&self) -> String {
        lock(&self.transcript).clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }

    async fn start_listening(&self) -> Result<CaptureId, SpeechError> {
        self.record(RecognizerCall::Start);
        if !self.supported {
            return Err(SpeechError::Unsupported("scripted recognizer".to_string()));
        }
        let capture = CaptureId(self.last_capture.fetch_add(1, Ordering::SeqCst) + 1);
        if self.deny_microphone.load(Ordering::SeqCst) {
            self.listening.store(false, Ordering::SeqCst);
            let _ = self.events.send(RecognitionEvent::Error {
                capture,
                message: "microphone access denied".to_string(),
            });
            return Err(SpeechError::Capture("microphone access denied".to_string()));
        }
        self.listening.store(true, Ordering::SeqCst);
        let _ = self.events.send(RecognitionEvent::Started { capture });
        Ok(capture)
    }

    async fn stop_listening(&self) {
        self.record(RecognizerCall::Stop);
        if self.listening.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(RecognitionEvent::Ended {
                capture: self.current_capture(),
                transcript: self.transcript(),
            });
        }
    }

    async fn cancel_listening(&self) {
        self.record(RecognizerCall::Cancel);
        self.listening.store(false, Ordering::SeqCst);
    }

    fn reset_transcript(&self) {
        self.record(RecognizerCall::Reset);
        lock(&self.transcript).clear();
    }
}

/// A synthesizer that records what it was asked to say. An utterance keeps
/// "playing" until [`RecordingSynthesizer::finish`] or `stop` is called.
pub struct RecordingSynthesizer {
    supported: bool,
    speaking: AtomicBool,
    spoken: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::with_support(true)
    }

    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            supported,
            speaking: AtomicBool::new(false),
            spoken: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        }
    }

    /// The current utterance finishes playing.
    pub fn finish(&self) {
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// Everything spoken so far, oldest first.
    pub fn spoken(&self) -> Vec<String> {
        lock(&self.spoken).clone()
    }

    pub fn last_spoken(&self) -> Option<String> {
        lock(&self.spoken).last().cloned()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for RecordingSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if !self.supported {
            return Err(SpeechError::Unsupported("recording synthesizer".to_string()));
        }
        lock(&self.spoken).push(text.to_string());
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }
}
