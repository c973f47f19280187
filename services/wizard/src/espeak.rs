use async_trait::async_trait;
use profile_wizard_core::error::SpeechError;
use profile_wizard_core::speech::{SpeechSettings, SpeechSynthesizer, Voice, select_voice};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::Command;
use tokio::sync::oneshot;

/// espeak-ng's default speaking rate in words per minute.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Speaks through an espeak-ng compatible command line engine, one child
/// process per utterance.
pub struct EspeakSynthesizer {
    binary: String,
    voice: Option<Voice>,
    settings: SpeechSettings,
    supported: bool,
    speaking: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl EspeakSynthesizer {
    /// Probes `binary` once and picks a voice using `voice_marker`.
    pub async fn new(binary: &str, voice_marker: &str) -> Self {
        let supported = probe(binary).await;
        let voice = if supported {
            match list_voices(binary).await {
                Ok(voices) => select_voice(&voices, voice_marker).cloned(),
                Err(e) => {
                    tracing::warn!("Could not list voices: {}", e);
                    None
                }
            }
        } else {
            tracing::warn!("{} is not available; speech output disabled.", binary);
            None
        };
        match &voice {
            Some(voice) => tracing::info!("Using voice {} ({})", voice.name, voice.id),
            None => tracing::debug!("Using the engine default voice."),
        }

        Self {
            binary: binary.to_string(),
            voice,
            settings: SpeechSettings::DEFAULT,
            supported,
            speaking: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            cancel: Mutex::new(None),
        }
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    fn cancel_current(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            let _ = cancel.send(());
        }
    }
}

async fn probe(binary: &str) -> bool {
    match Command::new(binary).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(e) => {
            tracing::debug!("Probe of {} failed: {}", binary, e);
            false
        }
    }
}

async fn list_voices(binary: &str) -> anyhow::Result<Vec<Voice>> {
    let output = Command::new(binary).arg("--voices=en").output().await?;
    Ok(parse_voices(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  2  en-gb           --/M      English_(Great_Britain) gmw/en       (en 2)
/// ```
pub fn parse_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 5 {
                return None;
            }
            Some(Voice {
                id: columns[4].to_string(),
                name: columns[3].replace('_', " "),
                lang: columns[1].to_string(),
            })
        })
        .collect()
}

/// Maps the fixed delivery settings onto espeak-ng flags.
pub fn espeak_args(settings: &SpeechSettings, voice: Option<&Voice>, text: &str) -> Vec<String> {
    let words_per_minute = (BASE_WORDS_PER_MINUTE * settings.rate).round() as u32;
    let pitch = (settings.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
    let amplitude = (settings.volume * 100.0).round().clamp(0.0, 200.0) as u32;

    let mut args = vec![
        "-s".to_string(),
        words_per_minute.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
    ];
    if let Some(voice) = voice {
        args.push("-v".to_string());
        args.push(voice.id.clone());
    }
    args.push("--".to_string());
    args.push(text.to_string());
    args
}

#[async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if !self.supported {
            return Err(SpeechError::Unsupported(self.binary.clone()));
        }

        // Bump first so the waiter of the utterance being replaced leaves the
        // speaking flag alone.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel_current();

        let mut child = match Command::new(&self.binary)
            .args(espeak_args(&self.settings, self.voice.as_ref(), text))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.speaking.store(false, Ordering::SeqCst);
                return Err(SpeechError::Synthesis(format!(
                    "Failed to spawn {}: {}",
                    self.binary, e
                )));
            }
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel_tx);
        self.speaking.store(true, Ordering::SeqCst);
        tracing::debug!("Speaking: \"{}\"", text);

        let speaking = self.speaking.clone();
        let current = self.generation.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {}
                    Ok(status) => tracing::warn!("Speech engine exited with {}", status),
                    Err(e) => tracing::warn!("Speech engine failed: {}", e),
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!("Could not kill speech process: {}", e);
                    }
                }
            }
            if current.load(Ordering::SeqCst) == generation {
                speaking.store(false, Ordering::SeqCst);
            }
        });
        Ok(())
    }

    async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_current();
        self.speaking.store(false, Ordering::SeqCst);
    }
}
