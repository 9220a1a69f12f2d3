//! ElevenLabs 语音接口
//!
//! - 转写：`POST /v1/speech-to-text`（multipart：file + model_id + language_code）
//! - 合成：`POST /v1/text-to-speech/{voice_id}?output_format=...`，返回 MP3 字节

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::VoiceSection;
use crate::voice::{Transcriber, VoiceError, VoiceSynthesizer};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    stt_model: String,
    language: String,
    tts_model: String,
    output_format: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, VoiceError> {
        Self::from_config(&VoiceSection::default(), &api_key.into())
    }

    pub fn from_config(voice: &VoiceSection, api_key: &str) -> Result<Self, VoiceError> {
        if api_key.is_empty() {
            return Err(VoiceError::Config("ElevenLabs API key required".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(voice.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: voice
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            stt_model: voice.stt_model.clone(),
            language: voice.language.clone(),
            tts_model: voice.tts_model.clone(),
            output_format: voice.output_format.clone(),
        })
    }

    fn stt_url(&self) -> String {
        format!("{}/v1/speech-to-text", self.base_url)
    }

    fn tts_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, voice_id, self.output_format
        )
    }
}

async fn api_error(response: reqwest::Response) -> VoiceError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = %status, body = %body, "ElevenLabs API error");
    VoiceError::Api {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl Transcriber for ElevenLabsClient {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, VoiceError> {
        let file = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("model_id", self.stt_model.clone())
            .text("language_code", self.language.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.stt_url())
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError> {
        let request = SynthesisRequest {
            text,
            model_id: &self.tts_model,
        };
        let response = self
            .client
            .post(self.tts_url(voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}
