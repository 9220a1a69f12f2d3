//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DOGGO__*` 覆盖（双下划线表示嵌套，如 `DOGGO__VOICE__VOICE=pirate`）。
//! API Key 不进配置文件：OPENAI_API_KEY / ELEVENLABS_API_KEY 直接从环境读取。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::Mode;
use crate::robot::SPORT_TOPIC;
use crate::voice::VoiceError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub voice: VoiceSection,
    pub robot: RobotSection,
}

/// [app] 段：运行方式
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// false 即 dead 模式：不听麦克风、不连机器人
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// 处理前先把听到的内容复述一遍
    #[serde(default)]
    pub echo: bool,
    #[serde(default = "default_initial_mode")]
    pub initial_mode: Mode,
}

fn default_alive() -> bool {
    true
}

fn default_initial_mode() -> Mode {
    Mode::Awake
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            alive: default_alive(),
            echo: false,
            initial_mode: default_initial_mode(),
        }
    }
}

/// [agent] 段：调度循环
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 每条 utterance 最多几轮补全
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// 单个动作回调超时（秒）
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
    /// awake.md / asleep.md 所在目录
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
    /// <action>.json 参数 schema 覆盖目录
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: PathBuf,
}

fn default_max_rounds() -> usize {
    5
}

fn default_action_timeout_secs() -> u64 {
    15
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("config/prompts")
}

fn default_schemas_dir() -> PathBuf {
    PathBuf::from("config/actions")
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            action_timeout_secs: default_action_timeout_secs(),
            prompts_dir: default_prompts_dir(),
            schemas_dir: default_schemas_dir(),
        }
    }
}

/// [llm] 段：补全服务
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI 兼容 endpoint，未设置时用官方地址
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// [voice] 段：语音角色、ElevenLabs 模型、录音参数与设备
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceSection {
    /// 选中的角色名（presets 的键）
    #[serde(default = "default_voice")]
    pub voice: String,
    /// 角色名 → ElevenLabs voice id
    #[serde(default = "default_presets")]
    pub presets: HashMap<String, String>,
    pub base_url: Option<String>,
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_recording_secs")]
    pub recording_secs: u64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// 录音设备名，未设置用系统默认
    pub input_device: Option<String>,
    /// 播放设备名，未设置用系统默认
    pub output_device: Option<String>,
    #[serde(default = "default_voice_timeout")]
    pub request_timeout_secs: u64,
}

fn default_voice() -> String {
    "burt".to_string()
}

fn default_presets() -> HashMap<String, String> {
    [
        ("burt", "4YYIPFl9wE5c4L2eu2Gb"),
        ("drill_seargent", "DGzg6RaUqxGRTHSBjfgF"),
        ("knox", "dPah2VEoifKnZT37774q"),
        ("pirate", "PPzYpIqttlTYA83688JI"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_stt_model() -> String {
    "scribe_v1".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_tts_model() -> String {
    "eleven_turbo_v2_5".to_string()
}

fn default_output_format() -> String {
    "mp3_22050_32".to_string()
}

fn default_recording_secs() -> u64 {
    5
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_voice_timeout() -> u64 {
    30
}

impl Default for VoiceSection {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            presets: default_presets(),
            base_url: None,
            stt_model: default_stt_model(),
            language: default_language(),
            tts_model: default_tts_model(),
            output_format: default_output_format(),
            recording_secs: default_recording_secs(),
            sample_rate: default_sample_rate(),
            input_device: None,
            output_device: None,
            request_timeout_secs: default_voice_timeout(),
        }
    }
}

impl VoiceSection {
    /// 当前角色对应的 voice id；未知角色是配置错误
    pub fn voice_id(&self) -> Result<String, VoiceError> {
        self.presets.get(&self.voice).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.presets.keys().map(String::as_str).collect();
            known.sort_unstable();
            VoiceError::Config(format!(
                "unknown voice '{}', expected one of: {}",
                self.voice,
                known.join(", ")
            ))
        })
    }
}

/// [robot] 段：命令通道
#[derive(Debug, Clone, Deserialize)]
pub struct RobotSection {
    /// 机器人侧 WebSocket 中继地址
    #[serde(default = "default_robot_url")]
    pub url: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,
}

fn default_robot_url() -> String {
    "ws://192.168.50.191:8765".to_string()
}

fn default_topic() -> String {
    SPORT_TOPIC.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_ack_timeout() -> u64 {
    5
}

impl Default for RobotSection {
    fn default() -> Self {
        Self {
            url: default_robot_url(),
            topic: default_topic(),
            connect_timeout_secs: default_connect_timeout(),
            ack_timeout_secs: default_ack_timeout(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 DOGGO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DOGGO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DOGGO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!(cfg.app.alive);
        assert!(!cfg.app.echo);
        assert_eq!(cfg.app.initial_mode, Mode::Awake);
        assert_eq!(cfg.agent.max_rounds, 5);
        assert_eq!(cfg.llm.model, "gpt-4.1-mini");
        assert_eq!(cfg.voice.recording_secs, 5);
        assert_eq!(cfg.voice.sample_rate, 16000);
        assert_eq!(cfg.robot.topic, "rt/api/sport/request");
    }

    #[test]
    fn test_voice_presets() {
        let mut voice = VoiceSection::default();
        assert_eq!(voice.voice_id().unwrap(), "4YYIPFl9wE5c4L2eu2Gb");
        voice.voice = "pirate".to_string();
        assert_eq!(voice.voice_id().unwrap(), "PPzYpIqttlTYA83688JI");
        voice.voice = "robot".to_string();
        let err = voice.voice_id().unwrap_err();
        assert!(err.to_string().contains("burt, drill_seargent, knox, pirate"));
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doggo.toml");
        std::fs::write(
            &path,
            r#"
[app]
alive = false
initial_mode = "asleep"

[agent]
max_rounds = 3

[voice]
voice = "knox"
"#,
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert!(!cfg.app.alive);
        assert_eq!(cfg.app.initial_mode, Mode::Asleep);
        assert_eq!(cfg.agent.max_rounds, 3);
        assert_eq!(cfg.voice.voice_id().unwrap(), "dPah2VEoifKnZT37774q");
        assert_eq!(cfg.voice.tts_model, "eleven_turbo_v2_5");
    }
}
