use anyhow::Context;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use profile_wizard_core::error::SpeechError;
use profile_wizard_core::speech::{CaptureId, RecognitionEvent, SpeechRecognizer};
use profile_wizard_native_utils::audio::{
    Endpoint, EndpointConfig, UtteranceDetector, encode_wav, to_mono,
};
use profile_wizard_native_utils::device;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc as std_mpsc};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Audio blocks buffered between the device callback and the endpointer.
const AUDIO_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Where and how utterances are transcribed.
#[derive(Debug, Clone)]
pub struct WhisperSettings {
    pub url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub input_device: Option<String>,
    pub endpoint: EndpointConfig,
}

/// Records one utterance at a time from the microphone and transcribes it
/// with an OpenAI compatible `/v1/audio/transcriptions` endpoint.
pub struct WhisperRecognizer {
    shared: Arc<Shared>,
}

struct Shared {
    settings: WhisperSettings,
    client: Client,
    supported: bool,
    listening: AtomicBool,
    generation: AtomicU64,
    transcript: Mutex<String>,
    stop_capture: Mutex<Option<std_mpsc::Sender<()>>>,
    events: broadcast::Sender<RecognitionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WhisperRecognizer {
    pub fn new(settings: WhisperSettings) -> Self {
        let has_key = settings.api_key.is_some();
        let has_device = device::get_or_default_input(settings.input_device.as_deref())
            .map_err(|e| tracing::warn!("No usable microphone: {:#}", e))
            .is_ok();
        if !has_key {
            tracing::warn!("OPENAI_API_KEY is not set; speech input disabled.");
        }
        Self::with_support(settings, has_key && has_device)
    }

    fn with_support(settings: WhisperSettings, supported: bool) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            shared: Arc::new(Shared {
                settings,
                client: Client::new(),
                supported,
                listening: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                transcript: Mutex::new(String::new()),
                stop_capture: Mutex::new(None),
                events,
            }),
        }
    }
}

impl Shared {
    fn publish(&self, event: RecognitionEvent) {
        // No receivers just means no session is open.
        let _ = self.events.send(event);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn fail(&self, generation: u64, message: String) {
        tracing::warn!("Speech recognition failed: {}", message);
        if self.is_current(generation) {
            self.listening.store(false, Ordering::SeqCst);
            self.publish(RecognitionEvent::Error {
                capture: CaptureId(generation),
                message,
            });
        }
    }

    /// Publishes the result of a capture unless it was cancelled or
    /// replaced in the meantime.
    fn finish(&self, generation: u64, transcript: String) {
        if !self.is_current(generation) {
            tracing::debug!("Dropping transcript of a superseded capture.");
            return;
        }
        *lock(&self.transcript) = transcript.clone();
        self.listening.store(false, Ordering::SeqCst);
        self.publish(RecognitionEvent::Ended {
            capture: CaptureId(generation),
            transcript,
        });
    }

    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, SpeechError> {
        self.post_audio(wav)
            .await
            .map_err(|e| SpeechError::Transcription(format!("{:#}", e)))
    }

    async fn post_audio(&self, wav: Vec<u8>) -> anyhow::Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_ref()
            .context("no API key configured")?;
        let part = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.settings.model.clone())
            .text("response_format", "json")
            .part("file", part);

        let response = self
            .client
            .post(&self.settings.url)
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("posting audio to {}", self.settings.url))?
            .error_for_status()?
            .json::<TranscriptionResponse>()
            .await
            .context("decoding transcription")?;
        Ok(response.text.trim().to_string())
    }

    /// Feeds captured blocks to the endpointer until the utterance ends or
    /// the capture is stopped, then transcribes what was heard.
    async fn collect_utterance(
        self: Arc<Self>,
        generation: u64,
        mut audio: mpsc::Receiver<Vec<f32>>,
        sample_rate: u32,
        stop: std_mpsc::Sender<()>,
    ) {
        let mut detector = UtteranceDetector::new(self.settings.endpoint, sample_rate);
        let mut samples = Vec::new();
        while let Some(block) = audio.recv().await {
            samples.extend_from_slice(&block);
            if let Endpoint::Ended { .. } = detector.push(&block) {
                break;
            }
        }
        let _ = stop.send(());
        tracing::debug!(
            "Captured {} samples at {} Hz (speech: {}).",
            samples.len(),
            sample_rate,
            detector.heard_speech()
        );

        if !self.is_current(generation) {
            tracing::debug!("Capture was cancelled, not transcribing.");
            return;
        }

        let transcript = if detector.heard_speech() {
            let wav = match encode_wav(&samples, sample_rate) {
                Ok(wav) => wav,
                Err(e) => {
                    let error = SpeechError::Capture(format!("{:#}", e));
                    return self.fail(generation, error.to_string());
                }
            };
            match self.transcribe(wav).await {
                Ok(text) => text,
                Err(e) => return self.fail(generation, e.to_string()),
            }
        } else {
            String::new()
        };

        self.finish(generation, transcript);
    }
}

/// Opens the input stream and keeps it alive until told to stop.
///
/// cpal streams cannot leave the thread that built them, so each capture
/// gets its own thread.
fn run_capture(
    device_name: Option<String>,
    audio_tx: mpsc::Sender<Vec<f32>>,
    ready: oneshot::Sender<Result<u32, String>>,
    stop: std_mpsc::Receiver<()>,
) {
    let stream = match open_stream(device_name.as_deref(), audio_tx) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(format!("{:#}", e)));
            return;
        }
    };
    // Returns on a stop signal or once every sender is gone.
    let _ = stop.recv();
    drop(stream);
    tracing::debug!("Input stream closed.");
}

fn open_stream(
    device_name: Option<&str>,
    audio_tx: mpsc::Sender<Vec<f32>>,
) -> anyhow::Result<(cpal::Stream, u32)> {
    let input = device::get_or_default_input(device_name)
        .context("Failed to get audio input device")?;
    tracing::debug!("Using input device: {:?}", input.name());

    let input_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    let channels = input_config.channels();
    let sample_rate = input_config.sample_rate().0;
    let stream_config = input_config.config();

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if let Err(e) = audio_tx.try_send(to_mono(data, channels)) {
            tracing::debug!("Dropping audio block: {}", e);
        }
    };
    let stream = input.build_input_stream(
        &stream_config,
        input_data_fn,
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, sample_rate))
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    fn is_supported(&self) -> bool {
        self.shared.supported
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }

    fn transcript(&self) -> String {
        lock(&self.shared.transcript).clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.shared.events.subscribe()
    }

    async fn start_listening(&self) -> Result<CaptureId, SpeechError> {
        let shared = &self.shared;
        if !shared.supported {
            return Err(SpeechError::Unsupported("speech input".to_string()));
        }
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let device_name = shared.settings.input_device.clone();
        std::thread::Builder::new()
            .name("wizard-capture".to_string())
            .spawn(move || run_capture(device_name, audio_tx, ready_tx, stop_rx))
            .map_err(|e| SpeechError::Capture(e.to_string()))?;

        let sample_rate = match ready_rx.await {
            Ok(Ok(sample_rate)) => sample_rate,
            Ok(Err(message)) => {
                shared.fail(generation, message.clone());
                return Err(SpeechError::Capture(message));
            }
            Err(_) => {
                let message = "capture thread exited early".to_string();
                shared.fail(generation, message.clone());
                return Err(SpeechError::Capture(message));
            }
        };

        *lock(&shared.stop_capture) = Some(stop_tx.clone());
        shared.listening.store(true, Ordering::SeqCst);
        let capture = CaptureId(generation);
        shared.publish(RecognitionEvent::Started { capture });
        tracing::debug!("Listening at {} Hz (capture {}).", sample_rate, capture);

        tokio::spawn(
            shared
                .clone()
                .collect_utterance(generation, audio_rx, sample_rate, stop_tx),
        );
        Ok(capture)
    }

    async fn stop_listening(&self) {
        let stop = lock(&self.shared.stop_capture).take();
        if let Some(stop) = stop {
            // The collector still transcribes what was captured so far.
            let _ = stop.send(());
        }
    }

    async fn cancel_listening(&self) {
        // Moving the generation on makes the collector discard its result.
        let cancelled = self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let stop = lock(&self.shared.stop_capture).take();
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        self.shared.listening.store(false, Ordering::SeqCst);
        tracing::debug!("Cancelled capture {}.", CaptureId(cancelled));
    }

    fn reset_transcript(&self) {
        lock(&self.shared.transcript).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> WhisperSettings {
        WhisperSettings {
            url: "http://127.0.0.1:9/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            input_device: None,
            endpoint: EndpointConfig::default(),
        }
    }

    #[test]
    fn transcription_response_text_is_read() {
        let response: TranscriptionResponse =
            serde_json::from_str(r#"{"text":" Sam Rivera. "}"#).unwrap();
        assert_eq!(response.text.trim(), "Sam Rivera.");
    }

    #[tokio::test]
    async fn unsupported_recognizer_refuses_to_listen() {
        let recognizer = WhisperRecognizer::with_support(settings(), false);
        assert!(!recognizer.is_supported());
        assert!(matches!(
            recognizer.start_listening().await,
            Err(SpeechError::Unsupported(_))
        ));
        assert!(!recognizer.is_listening());
    }

    #[tokio::test]
    async fn transcribe_without_key_fails() {
        let recognizer = WhisperRecognizer::with_support(settings(), true);
        let err = recognizer.shared.transcribe(Vec::new()).await.unwrap_err();
        assert!(matches!(err, SpeechError::Transcription(_)));
        assert!(err.to_string().contains("no API key"));
    }

    #[tokio::test]
    async fn failure_of_current_capture_is_published() {
        let recognizer = WhisperRecognizer::with_support(settings(), true);
        let mut events = recognizer.subscribe();
        recognizer.shared.listening.store(true, Ordering::SeqCst);
        recognizer.shared.generation.store(3, Ordering::SeqCst);

        recognizer.shared.fail(2, "stale".to_string());
        assert!(recognizer.is_listening());

        recognizer.shared.fail(3, "network down".to_string());
        assert!(!recognizer.is_listening());
        assert_eq!(
            events.recv().await.unwrap(),
            RecognitionEvent::Error {
                capture: CaptureId(3),
                message: "network down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn finished_capture_publishes_its_transcript() {
        let recognizer = WhisperRecognizer::with_support(settings(), true);
        let mut events = recognizer.subscribe();
        recognizer.shared.listening.store(true, Ordering::SeqCst);
        recognizer.shared.generation.store(4, Ordering::SeqCst);

        recognizer.shared.finish(4, "Sam Rivera".to_string());

        assert!(!recognizer.is_listening());
        assert_eq!(recognizer.transcript(), "Sam Rivera");
        assert_eq!(
            events.recv().await.unwrap(),
            RecognitionEvent::Ended {
                capture: CaptureId(4),
                transcript: "Sam Rivera".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cancelled_capture_leaves_no_trace() {
        // --- 1. Arrange ---
        // Pretend capture 5 is recording and still uploading its audio.
        let recognizer = WhisperRecognizer::with_support(settings(), true);
        let mut events = recognizer.subscribe();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        *lock(&recognizer.shared.stop_capture) = Some(stop_tx);
        recognizer.shared.listening.store(true, Ordering::SeqCst);
        recognizer.shared.generation.store(5, Ordering::SeqCst);

        // --- 2. Act ---
        // The step is skipped, then the upload for capture 5 comes back.
        recognizer.cancel_listening().await;
        assert!(!recognizer.is_listening(), "cancel should free the microphone at once");
        recognizer.shared.finish(5, "old words".to_string());
        recognizer.shared.fail(5, "late failure".to_string());

        // --- 3. Assert ---
        // The device thread was told to stop and the old words went nowhere.
        assert!(stop_rx.try_recv().is_ok());
        assert!(!recognizer.is_listening());
        assert_eq!(recognizer.transcript(), "");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn reset_clears_transcript() {
        let recognizer = WhisperRecognizer::with_support(settings(), true);
        *lock(&recognizer.shared.transcript) = "old answer".to_string();
        recognizer.reset_transcript();
        assert_eq!(recognizer.transcript(), "");
    }
}
