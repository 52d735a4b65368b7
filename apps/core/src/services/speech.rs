//! Voice input: fixed-length capture and speech-to-text.
//!
//! Audio is kept as mono 16-bit PCM. The recognizer only accepts 16 kHz WAV, so clips are
//! resampled before upload.

use crate::config::SpeechConfig;
use crate::error::AppError;
use crate::services::{ensure_success, http_client, AudioRecorder, Transcriber};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

pub const RECOGNIZER_SAMPLE_RATE: u32 = 16_000;
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

pub const NO_MATCH_REPLY: &str = "Sorry, I couldn't understand what you said.";
pub const CANCELED_REPLY: &str = "Speech recognition was canceled.";

/// Mono 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Keeps at most `duration` worth of samples.
    pub fn truncate(mut self, duration: Duration) -> Self {
        let max = (duration.as_secs_f64() * self.sample_rate as f64).round() as usize;
        self.samples.truncate(max);
        self
    }

    /// Linear-interpolation resample to `target_rate`.
    pub fn resample(&self, target_rate: u32) -> AudioClip {
        if self.sample_rate == target_rate || self.samples.is_empty() || self.sample_rate == 0 {
            return AudioClip::new(self.samples.clone(), target_rate.max(1));
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len =
            (self.samples.len() as u64 * target_rate as u64 / self.sample_rate as u64) as usize;
        let last = self.samples.len() - 1;
        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = (pos.floor() as usize).min(last);
                let next = (idx + 1).min(last);
                let frac = pos - idx as f64;
                let a = self.samples[idx] as f64;
                let b = self.samples[next] as f64;
                (a + (b - a) * frac).round() as i16
            })
            .collect();
        AudioClip::new(samples, target_rate)
    }

    /// Encodes the clip as a RIFF/WAV byte buffer.
    pub fn to_wav(&self) -> Result<Vec<u8>, AppError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for sample in &self.samples {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Decodes 16-bit integer WAV data, keeping only the first channel.
    pub fn from_wav<R: std::io::Read>(reader: R) -> Result<AudioClip, AppError> {
        let mut reader = hound::WavReader::new(reader)?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(AppError::Audio(format!(
                "Unsupported WAV format: {:?} {}-bit",
                spec.sample_format, spec.bits_per_sample
            )));
        }
        let channels = spec.channels.max(1) as usize;
        let interleaved = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
        let samples = interleaved.into_iter().step_by(channels).collect();
        Ok(AudioClip::new(samples, spec.sample_rate))
    }
}

/// Plays back a pre-recorded WAV file instead of capturing live audio.
pub struct WavFileRecorder {
    path: PathBuf,
}

impl WavFileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AudioRecorder for WavFileRecorder {
    async fn record(&self, duration: Duration) -> Result<AudioClip, AppError> {
        let path = self.path.clone();
        info!("Reading voice input from {:?}", path);
        let clip = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path)?;
            AudioClip::from_wav(std::io::BufReader::new(file))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Recording task failed: {}", e)))??;
        Ok(clip.truncate(duration))
    }
}

/// Used when no capture backend is available.
pub struct UnavailableRecorder;

#[async_trait]
impl AudioRecorder for UnavailableRecorder {
    async fn record(&self, _duration: Duration) -> Result<AudioClip, AppError> {
        Err(AppError::Config(
            "No audio input configured: build with the `microphone` feature or set VOICE_INPUT_WAV"
                .to_string(),
        ))
    }
}

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneRecorder;

#[cfg(feature = "microphone")]
mod microphone {
    use super::{AudioClip, AudioRecorder};
    use crate::error::AppError;
    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::{error, info};

    /// Captures from the default input device.
    pub struct MicrophoneRecorder;

    #[async_trait]
    impl AudioRecorder for MicrophoneRecorder {
        async fn record(&self, duration: Duration) -> Result<AudioClip, AppError> {
            // cpal streams are not Send; keep the whole capture on one blocking thread.
            tokio::task::spawn_blocking(move || capture(duration))
                .await
                .map_err(|e| AppError::Internal(format!("Recording task failed: {}", e)))?
        }
    }

    fn audio_err<E: std::fmt::Display>(err: E) -> AppError {
        AppError::Audio(err.to_string())
    }

    fn push_first_channel<T: Copy>(
        sink: &Mutex<Vec<i16>>,
        data: &[T],
        channels: usize,
        convert: impl Fn(T) -> i16,
    ) {
        if let Ok(mut buffer) = sink.lock() {
            buffer.extend(data.chunks(channels).map(|frame| convert(frame[0])));
        }
    }

    fn capture(duration: Duration) -> Result<AudioClip, AppError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AppError::Audio("No input device available".to_string()))?;
        let supported = device.default_input_config().map_err(audio_err)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels().max(1) as usize;
        let config: cpal::StreamConfig = supported.config();

        let samples = Arc::new(Mutex::new(Vec::<i16>::new()));
        let err_fn = |e: cpal::StreamError| error!("Input stream error: {}", e);

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                let sink = samples.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        push_first_channel(&sink, data, channels, |s| {
                            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                        })
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let sink = samples.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        push_first_channel(&sink, data, channels, |s| s)
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let sink = samples.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        push_first_channel(&sink, data, channels, |s| (s as i32 - 32_768) as i16)
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(AppError::Audio(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(audio_err)?;

        info!("Recording...");
        stream.play().map_err(audio_err)?;
        std::thread::sleep(duration);
        drop(stream);
        info!("Recording finished.");

        let samples = samples
            .lock()
            .map(|buffer| buffer.clone())
            .map_err(|_| AppError::Internal("Sample buffer poisoned".to_string()))?;
        Ok(AudioClip::new(samples, sample_rate).truncate(duration))
    }
}

/// Picks the capture backend for the current build and configuration.
pub fn recorder_from_config(config: &SpeechConfig) -> Arc<dyn AudioRecorder> {
    match &config.input_wav {
        Some(path) => Arc::new(WavFileRecorder::new(path)),
        None => live_recorder(),
    }
}

#[cfg(feature = "microphone")]
fn live_recorder() -> Arc<dyn AudioRecorder> {
    Arc::new(MicrophoneRecorder)
}

#[cfg(not(feature = "microphone"))]
fn live_recorder() -> Arc<dyn AudioRecorder> {
    Arc::new(UnavailableRecorder)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

/// Maps a recognizer status to the text used as the user's message.
fn interpret_recognition(status: &str, display_text: Option<String>) -> String {
    match status {
        "Success" => display_text.unwrap_or_default(),
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => NO_MATCH_REPLY.to_string(),
        "Error" => CANCELED_REPLY.to_string(),
        other => {
            warn!("Unexpected recognition status: {}", other);
            String::new()
        }
    }
}

/// Speech-to-text over the Azure short-audio REST endpoint.
pub struct AzureSpeechTranscriber {
    client: reqwest::Client,
    endpoint: Option<String>,
    key: Option<String>,
    language: String,
}

impl AzureSpeechTranscriber {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: http_client(TRANSCRIBE_TIMEOUT),
            endpoint: config.endpoint(),
            key: config.azure_key.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for AzureSpeechTranscriber {
    #[instrument(skip(self, clip), fields(secs = clip.duration().as_secs_f32()))]
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, AppError> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| AppError::Config("AZURE_SPEECH_KEY is not set".to_string()))?;
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            AppError::Config("AZURE_SPEECH_REGION or AZURE_SPEECH_ENDPOINT must be set".to_string())
        })?;

        let wav = clip.resample(RECOGNIZER_SAMPLE_RATE).to_wav()?;
        let url = Url::parse_with_params(
            endpoint,
            &[("language", self.language.as_str()), ("format", "simple")],
        )?;

        let response = self
            .client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", key)
            .header(
                CONTENT_TYPE,
                format!(
                    "audio/wav; codecs=audio/pcm; samplerate={}",
                    RECOGNIZER_SAMPLE_RATE
                ),
            )
            .header(ACCEPT, "application/json")
            .body(wav)
            .send()
            .await?;
        let recognition: RecognitionResponse =
            ensure_success(response, "Transcription").await?.json().await?;

        let text = interpret_recognition(&recognition.recognition_status, recognition.display_text);
        info!("Transcript: {}", text);
        Ok(text)
    }
}
