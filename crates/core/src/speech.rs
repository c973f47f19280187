//! Speech capability interfaces.
//!
//! The wizard never talks to an audio engine directly. It is handed a
//! [`SpeechRecognizer`] and a [`SpeechSynthesizer`], each probed once for
//! support when created, so the same sequencing logic runs against live
//! engines in the service and against the deterministic fakes in [`fake`].

pub mod fake;

use crate::error::SpeechError;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Identifies one capture. Every event a recognizer publishes names the
/// capture it belongs to, so a session can tell a late result from the one
/// it is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureId(pub u64);

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events published by a recognizer over its broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Capture began.
    Started { capture: CaptureId },
    /// Capture finished. `transcript` is the final text of the utterance and
    /// may be empty if nothing was heard.
    Ended {
        capture: CaptureId,
        transcript: String,
    },
    /// The engine failed (microphone denied, network, ...). No `Ended`
    /// follows an `Error` for the same capture.
    Error { capture: CaptureId, message: String },
}

impl RecognitionEvent {
    pub fn capture(&self) -> CaptureId {
        match self {
            RecognitionEvent::Started { capture }
            | RecognitionEvent::Ended { capture, .. }
            | RecognitionEvent::Error { capture, .. } => *capture,
        }
    }
}

/// Utterance-based speech-to-text.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Result of the capability probe done when the adapter was created.
    fn is_supported(&self) -> bool;

    /// True from `start_listening` until the engine reports the end of the
    /// utterance or an error, or the capture is cancelled.
    fn is_listening(&self) -> bool;

    /// The transcript currently held by the adapter.
    fn transcript(&self) -> String;

    /// A fresh receiver of this adapter's events.
    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent>;

    /// Begins a new capture and returns its id. On failure the adapter is
    /// left not listening and an `Error` event has been published.
    async fn start_listening(&self) -> Result<CaptureId, SpeechError>;

    /// Ends capture early. The engine still reports `Ended` with whatever it
    /// heard.
    async fn stop_listening(&self);

    /// Abandons the current capture. Nothing it heard is kept or reported,
    /// and `is_listening` is false on return.
    async fn cancel_listening(&self);

    /// Clears the held transcript without touching capture state.
    fn reset_transcript(&self);
}

/// Text-to-speech with at most one active utterance.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_supported(&self) -> bool;

    fn is_speaking(&self) -> bool;

    /// Cancels anything currently playing and starts speaking `text`.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Cancels immediately; `is_speaking` is false afterwards.
    async fn stop(&self);
}

/// Fixed delivery settings, expressed the way the Web Speech API does:
/// rate and pitch are multipliers of 1.0, volume is 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl SpeechSettings {
    pub const DEFAULT: SpeechSettings = SpeechSettings {
        rate: 0.9,
        pitch: 1.0,
        volume: 0.8,
    };
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A voice offered by a synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Identifier passed back to the engine.
    pub id: String,
    pub name: String,
    /// BCP 47 style language tag, e.g. `en-US` or `en-gb`.
    pub lang: String,
}

impl Voice {
    pub fn is_english(&self) -> bool {
        self.lang.to_ascii_lowercase().starts_with("en")
    }
}

/// Picks the voice to speak with: an English voice whose name carries
/// `quality_marker`, else any English voice, else `None` for the engine
/// default.
pub fn select_voice<'a>(voices: &'a [Voice], quality_marker: &str) -> Option<&'a Voice> {
    let marker = quality_marker.to_ascii_lowercase();
    let preferred = (!marker.is_empty())
        .then(|| {
            voices.iter().find(|voice| {
                voice.is_english()
                    && (voice.name.to_ascii_lowercase().contains(&marker)
                        || voice.id.to_ascii_lowercase().contains(&marker))
            })
        })
        .flatten();
    preferred.or_else(|| voices.iter().find(|voice| voice.is_english()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, name: &str, lang: &str) -> Voice {
        Voice {
            id: id.to_string(),
            name: name.to_string(),
            lang: lang.to_string(),
        }
    }

    #[test]
    fn prefers_marked_english_voice() {
        let voices = vec![
            voice("de", "German", "de-DE"),
            voice("en-us", "English (America)", "en-US"),
            voice("google-en", "Google US English", "en-US"),
            voice("google-fr", "Google français", "fr-FR"),
        ];
        let chosen = select_voice(&voices, "Google").unwrap();
        assert_eq!(chosen.id, "google-en");
    }

    #[test]
    fn falls_back_to_any_english_voice() {
        let voices = vec![
            voice("google-fr", "Google français", "fr-FR"),
            voice("en-gb", "English (Great Britain)", "en-gb"),
        ];
        let chosen = select_voice(&voices, "google").unwrap();
        assert_eq!(chosen.id, "en-gb");
    }

    #[test]
    fn no_english_voice_means_engine_default() {
        let voices = vec![voice("es", "Spanish", "es-ES")];
        assert!(select_voice(&voices, "google").is_none());
        assert!(select_voice(&[], "google").is_none());
    }

    #[test]
    fn default_settings_are_fixed() {
        let settings = SpeechSettings::default();
        assert_eq!(settings.rate, 0.9);
        assert_eq!(settings.pitch, 1.0);
        assert_eq!(settings.volume, 0.8);
    }
}
