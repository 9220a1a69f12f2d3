//! 控制台输入输出：文本模式 / dead 模式，以及测试用的记录型输出

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::voice::{UtteranceSource, VoiceError, VoiceOutput};

/// 逐行读取用户语句
pub struct LineInput<R> {
    lines: tokio::sync::Mutex<Lines<R>>,
    prompt: bool,
}

impl LineInput<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self {
            lines: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            prompt: true,
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineInput<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: tokio::sync::Mutex::new(reader.lines()),
            prompt: false,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> UtteranceSource for LineInput<R> {
    async fn next_utterance(&self) -> Result<Option<String>, VoiceError> {
        if self.prompt {
            print!("> ");
            let _ = std::io::stdout().flush();
        }
        let mut lines = self.lines.lock().await;
        Ok(lines.next_line().await?)
    }
}

/// 把回复打印到标准输出
#[derive(Debug, Default)]
pub struct ConsoleVoice;

#[async_trait]
impl VoiceOutput for ConsoleVoice {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        println!("Doggo: {text}");
        Ok(())
    }
}

/// 记录每一句输出；可设置为失败以模拟播放故障
#[derive(Debug, Default)]
pub struct RecordingVoice {
    spoken: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let voice = Self::default();
        voice.fail.store(true, Ordering::SeqCst);
        voice
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VoiceOutput for RecordingVoice {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        if let Ok(mut s) = self.spoken.lock() {
            s.push(text.to_string());
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Audio("playback device unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_input_reads_until_eof() {
        let input = LineInput::from_reader("stand up\n\ngo to sleep\n".as_bytes());
        assert_eq!(input.next_utterance().await.unwrap().as_deref(), Some("stand up"));
        assert_eq!(input.next_utterance().await.unwrap().as_deref(), Some(""));
        assert_eq!(input.next_utterance().await.unwrap().as_deref(), Some("go to sleep"));
        assert_eq!(input.next_utterance().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_recording_voice() {
        let voice = RecordingVoice::new();
        voice.speak("woof").await.unwrap();
        assert_eq!(voice.spoken(), vec!["woof".to_string()]);

        let broken = RecordingVoice::failing();
        assert!(broken.speak("ruff").await.is_err());
        assert_eq!(broken.spoken(), vec!["ruff".to_string()]);
    }
}
