//! 语音层：麦克风 / 扬声器 / 转写 / 合成 的抽象与组合
//!
//! 调度循环只看到两个接口：UtteranceSource（下一条用户语句）与 VoiceOutput（把文本说出来）。
//! 实时模式下二者分别由 麦克风→转写、合成→扬声器 组成；文本与 dead 模式下退化为控制台读写。

pub mod console;
pub mod elevenlabs;

#[cfg(feature = "audio")]
pub mod audio;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AppConfig;

pub use console::{ConsoleVoice, LineInput, RecordingVoice};
pub use elevenlabs::ElevenLabsClient;

/// 语音链路错误
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("audio error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("voice config error: {0}")]
    Config(String),
}

/// 语音转文字
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, VoiceError>;
}

/// 文字转语音，返回编码后的音频字节
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError>;
}

/// 录制固定时长，返回 WAV 字节
#[async_trait]
pub trait Microphone: Send + Sync {
    async fn record(&self, duration: Duration) -> Result<Vec<u8>, VoiceError>;
}

/// 播放编码后的音频（采样率转换由设备侧负责）
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn play(&self, audio: Vec<u8>) -> Result<(), VoiceError>;
}

/// 调度循环使用的输出端：返回时语音已播完
#[async_trait]
pub trait VoiceOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), VoiceError>;
}

/// 用户语句来源；Ok(None) 表示输入已结束
#[async_trait]
pub trait UtteranceSource: Send + Sync {
    async fn next_utterance(&self) -> Result<Option<String>, VoiceError>;
}

/// 合成 → 扬声器
pub struct SpokenVoice {
    synthesizer: Arc<dyn VoiceSynthesizer>,
    speaker: Arc<dyn Speaker>,
    voice_id: String,
}

impl SpokenVoice {
    pub fn new(
        synthesizer: Arc<dyn VoiceSynthesizer>,
        speaker: Arc<dyn Speaker>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            speaker,
            voice_id: voice_id.into(),
        }
    }
}

#[async_trait]
impl VoiceOutput for SpokenVoice {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        println!("Speaking: {text}");
        let audio = self.synthesizer.synthesize(text, &self.voice_id).await?;
        tracing::debug!(bytes = audio.len(), "synthesized speech");
        self.speaker.play(audio).await
    }
}

/// 麦克风 → 转写
pub struct ListeningInput {
    microphone: Arc<dyn Microphone>,
    transcriber: Arc<dyn Transcriber>,
    duration: Duration,
}

impl ListeningInput {
    pub fn new(
        microphone: Arc<dyn Microphone>,
        transcriber: Arc<dyn Transcriber>,
        duration: Duration,
    ) -> Self {
        Self {
            microphone,
            transcriber,
            duration,
        }
    }
}

#[async_trait]
impl UtteranceSource for ListeningInput {
    async fn next_utterance(&self) -> Result<Option<String>, VoiceError> {
        println!("Listening...");
        let wav = self.microphone.record(self.duration).await?;
        let text = self.transcriber.transcribe(wav).await?;
        tracing::info!(transcript = %text, "heard");
        Ok(Some(text))
    }
}

/// 语音输入输出的装配选项（来自配置与命令行）
#[derive(Debug, Clone, Copy)]
pub struct VoiceMode {
    /// 从麦克风听取（否则读标准输入）
    pub listen: bool,
}

/// 按配置创建输入与输出端
///
/// - 有 ELEVENLABS_API_KEY 且启用了 audio 特性：合成并播放；否则打印到控制台
/// - listen 为真时需要 API Key 与 audio 特性，否则报配置错误
pub fn create_voice_io(
    cfg: &AppConfig,
    mode: VoiceMode,
) -> Result<(Arc<dyn UtteranceSource>, Arc<dyn VoiceOutput>), VoiceError> {
    let api_key = std::env::var("ELEVENLABS_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let voice_id = cfg.voice.voice_id()?;
    let client = match api_key {
        Some(key) => Some(Arc::new(ElevenLabsClient::from_config(&cfg.voice, &key)?)),
        None => None,
    };

    let output = build_output(&cfg.voice, client.clone(), voice_id);
    let input: Arc<dyn UtteranceSource> = if mode.listen {
        build_listener(&cfg.voice, client)?
    } else {
        Arc::new(LineInput::stdin())
    };
    Ok((input, output))
}

#[cfg(feature = "audio")]
fn build_output(
    voice: &crate::config::VoiceSection,
    client: Option<Arc<ElevenLabsClient>>,
    voice_id: String,
) -> Arc<dyn VoiceOutput> {
    match client {
        Some(client) => {
            let speaker = Arc::new(audio::CpalSpeaker::new(voice.output_device.clone()));
            Arc::new(SpokenVoice::new(client, speaker, voice_id))
        }
        None => {
            tracing::warn!("ELEVENLABS_API_KEY not set, replies are printed instead of spoken");
            Arc::new(ConsoleVoice)
        }
    }
}

#[cfg(not(feature = "audio"))]
fn build_output(
    _voice: &crate::config::VoiceSection,
    _client: Option<Arc<ElevenLabsClient>>,
    _voice_id: String,
) -> Arc<dyn VoiceOutput> {
    tracing::info!("built without the `audio` feature, replies are printed");
    Arc::new(ConsoleVoice)
}

#[cfg(feature = "audio")]
fn build_listener(
    voice: &crate::config::VoiceSection,
    client: Option<Arc<ElevenLabsClient>>,
) -> Result<Arc<dyn UtteranceSource>, VoiceError> {
    let client = client.ok_or_else(|| {
        VoiceError::Config("listening requires ELEVENLABS_API_KEY for transcription".to_string())
    })?;
    let microphone = Arc::new(audio::CpalMicrophone::new(
        voice.input_device.clone(),
        voice.sample_rate,
    ));
    Ok(Arc::new(ListeningInput::new(
        microphone,
        client,
        Duration::from_secs(voice.recording_secs),
    )))
}

#[cfg(not(feature = "audio"))]
fn build_listener(
    _voice: &crate::config::VoiceSection,
    _client: Option<Arc<ElevenLabsClient>>,
) -> Result<Arc<dyn UtteranceSource>, VoiceError> {
    Err(VoiceError::Config(
        "built without the `audio` feature; run with --text or --dead".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedMic;

    #[async_trait]
    impl Microphone for FixedMic {
        async fn record(&self, duration: Duration) -> Result<Vec<u8>, VoiceError> {
            Ok(vec![0u8; duration.as_secs() as usize])
        }
    }

    struct LenTranscriber;

    #[async_trait]
    impl Transcriber for LenTranscriber {
        async fn transcribe(&self, audio: Vec<u8>) -> Result<String, VoiceError> {
            Ok(format!("{} bytes", audio.len()))
        }
    }

    struct EchoSynth;

    #[async_trait]
    impl VoiceSynthesizer for EchoSynth {
        async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError> {
            Ok(format!("{voice_id}:{text}").into_bytes())
        }
    }

    #[derive(Default)]
    struct CollectSpeaker(Mutex<Vec<Vec<u8>>>);

    #[async_trait]
    impl Speaker for CollectSpeaker {
        async fn play(&self, audio: Vec<u8>) -> Result<(), VoiceError> {
            self.0.lock().unwrap().push(audio);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_listening_input_records_then_transcribes() {
        let input = ListeningInput::new(Arc::new(FixedMic), Arc::new(LenTranscriber), Duration::from_secs(5));
        assert_eq!(input.next_utterance().await.unwrap().as_deref(), Some("5 bytes"));
    }

    #[tokio::test]
    async fn test_spoken_voice_uses_voice_id() {
        let speaker = Arc::new(CollectSpeaker::default());
        let voice = SpokenVoice::new(Arc::new(EchoSynth), speaker.clone(), "burt-id");
        voice.speak("woof").await.unwrap();
        let played = speaker.0.lock().unwrap().clone();
        assert_eq!(played, vec![b"burt-id:woof".to_vec()]);
    }
}
