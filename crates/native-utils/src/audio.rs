use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

/// Averages interleaved frames down to a single channel.
pub fn to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Root mean square level of a block of samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Encodes mono samples as a 16-bit PCM WAV file held in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in convert_f32_to_i16(samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Tuning for end-of-utterance detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointConfig {
    /// RMS level above which a block counts as speech.
    pub speech_threshold: f32,
    /// Silence after speech that ends the utterance.
    pub trailing_silence: Duration,
    /// Give up if nobody speaks for this long.
    pub no_speech_timeout: Duration,
    /// Hard cap on a single utterance.
    pub max_utterance: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 0.02,
            trailing_silence: Duration::from_millis(1200),
            no_speech_timeout: Duration::from_secs(6),
            max_utterance: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Continue,
    /// The utterance is over. `heard_speech` is false when it timed out
    /// without anything above the threshold.
    Ended { heard_speech: bool },
}

/// Energy based endpointer fed with mono blocks as they arrive.
#[derive(Debug)]
pub struct UtteranceDetector {
    config: EndpointConfig,
    sample_rate: u32,
    heard_speech: bool,
    total_samples: u64,
    silent_samples: u64,
}

impl UtteranceDetector {
    pub fn new(config: EndpointConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            heard_speech: false,
            total_samples: 0,
            silent_samples: 0,
        }
    }

    fn samples_for(&self, duration: Duration) -> u64 {
        duration.as_millis() as u64 * self.sample_rate as u64 / 1000
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    pub fn push(&mut self, block: &[f32]) -> Endpoint {
        let len = block.len() as u64;
        self.total_samples += len;

        if rms(block) >= self.config.speech_threshold {
            self.heard_speech = true;
            self.silent_samples = 0;
        } else {
            self.silent_samples += len;
        }

        let ended = if self.heard_speech {
            self.silent_samples >= self.samples_for(self.config.trailing_silence)
                || self.total_samples >= self.samples_for(self.config.max_utterance)
        } else {
            self.total_samples >= self.samples_for(self.config.no_speech_timeout)
        };

        if ended {
            Endpoint::Ended {
                heard_speech: self.heard_speech,
            }
        } else {
            Endpoint::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1_000;

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect()
    }

    fn quick_config() -> EndpointConfig {
        EndpointConfig {
            speech_threshold: 0.1,
            trailing_silence: Duration::from_millis(300),
            no_speech_timeout: Duration::from_secs(1),
            max_utterance: Duration::from_secs(3),
        }
    }

    #[test]
    fn mono_mix_averages_channels() {
        assert_eq!(to_mono(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(to_mono(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn rms_of_silence_and_tone() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 16]), 0.0);
        assert!((rms(&tone(16)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sample_conversion_clamps() {
        assert_eq!(convert_f32_to_i16(&[2.0, -2.0, 0.0]), vec![i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn wav_bytes_decode_back() {
        let bytes = encode_wav(&tone(100), 16_000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 100);
    }

    #[test]
    fn speech_then_silence_ends_utterance() {
        let mut detector = UtteranceDetector::new(quick_config(), RATE);
        assert_eq!(detector.push(&tone(200)), Endpoint::Continue);
        assert_eq!(detector.push(&[0.0; 200]), Endpoint::Continue);
        assert_eq!(
            detector.push(&[0.0; 100]),
            Endpoint::Ended { heard_speech: true }
        );
    }

    #[test]
    fn speech_resets_trailing_silence() {
        let mut detector = UtteranceDetector::new(quick_config(), RATE);
        detector.push(&tone(100));
        detector.push(&[0.0; 250]);
        detector.push(&tone(100));
        assert_eq!(detector.push(&[0.0; 250]), Endpoint::Continue);
        assert!(detector.heard_speech());
    }

    #[test]
    fn nobody_speaks_times_out() {
        let mut detector = UtteranceDetector::new(quick_config(), RATE);
        assert_eq!(detector.push(&[0.0; 900]), Endpoint::Continue);
        assert_eq!(
            detector.push(&[0.0; 100]),
            Endpoint::Ended {
                heard_speech: false
            }
        );
    }

    #[test]
    fn long_speech_is_capped() {
        let mut detector = UtteranceDetector::new(quick_config(), RATE);
        assert_eq!(detector.push(&tone(2_999)), Endpoint::Continue);
        assert_eq!(detector.push(&tone(1)), Endpoint::Ended { heard_speech: true });
    }
}
