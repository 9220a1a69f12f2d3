//! Agent 运行时装配
//!
//! create_agent_components 按配置构建 动作目录 / 执行器 / 重连守卫 / system prompt / 补全服务，
//! process_utterance 对单条用户语句跑调度循环（空语句直接跳过）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::core::{AgentError, ModeState, RecoveryEngine};
use crate::llm::{CompletionService, MockCompletion, OpenAiClient};
use crate::react::{dispatch_loop, DispatchEvent, DispatchOutcome, DispatchSession, SystemPrompts};
use crate::robot::{CommandChannel, ReconnectGuard};
use crate::tools::{builtin_catalog, ActionExecutor};
use crate::voice::VoiceOutput;

/// 预构建的 Agent 组件；ModeState 是唯一跨 utterance 的状态
pub struct AgentComponents {
    pub completion: Arc<dyn CompletionService>,
    pub executor: ActionExecutor,
    pub mode: Arc<ModeState>,
    pub prompts: SystemPrompts,
    pub voice: Arc<dyn VoiceOutput>,
    pub recovery: RecoveryEngine,
    pub guard: Arc<ReconnectGuard>,
    pub max_rounds: usize,
    /// 处理前先复述听到的内容
    pub echo: bool,
}

impl AgentComponents {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn session(&self) -> DispatchSession<'_> {
        DispatchSession::new(
            self.completion.as_ref(),
            &self.executor,
            &self.mode,
            &self.prompts,
            self.voice.as_ref(),
            &self.recovery,
        )
        .with_max_rounds(self.max_rounds)
    }
}

/// 根据配置与环境变量选择补全服务：有 OPENAI_API_KEY 走 OpenAI 兼容接口，否则用离线 Mock
pub fn create_completion_from_config(
    cfg: &AppConfig,
) -> Result<Arc<dyn CompletionService>, AgentError> {
    match std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            tracing::info!("Using OpenAI completion ({})", cfg.llm.model);
            let client = OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                &key,
                cfg.llm.request_timeout_secs,
            );
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, using Mock completion");
            Ok(Arc::new(MockCompletion))
        }
    }
}

/// 按配置装配 Agent 组件；通道、语音输出与补全服务由调用方注入
pub fn create_agent_components(
    cfg: &AppConfig,
    channel: Arc<dyn CommandChannel>,
    voice: Arc<dyn VoiceOutput>,
    completion: Arc<dyn CompletionService>,
) -> Result<AgentComponents, AgentError> {
    let mode = Arc::new(ModeState::new(cfg.app.initial_mode));
    let guard = Arc::new(
        ReconnectGuard::new(
            channel,
            Duration::from_secs(cfg.robot.connect_timeout_secs),
            Duration::from_secs(cfg.robot.ack_timeout_secs),
        )
        .with_topic(cfg.robot.topic.clone()),
    );
    let catalog = builtin_catalog(mode.clone(), guard.clone(), Some(cfg.agent.schemas_dir.as_path()))?;
    let executor = ActionExecutor::new(catalog, cfg.agent.action_timeout_secs);
    let prompts = SystemPrompts::load(&cfg.agent.prompts_dir);

    Ok(AgentComponents {
        completion,
        executor,
        mode,
        prompts,
        voice,
        recovery: RecoveryEngine::new(),
        guard,
        max_rounds: cfg.agent.max_rounds,
        echo: cfg.app.echo,
    })
}

/// 去掉首尾空白；空转写返回 None（不是错误，直接跳过）
pub fn normalize_utterance(raw: &str) -> Option<&str> {
    let text = raw.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// 处理一条用户语句；空语句返回 Ok(None)
pub async fn process_utterance(
    components: &AgentComponents,
    utterance: &str,
    event_tx: Option<&mpsc::UnboundedSender<DispatchEvent>>,
) -> Result<Option<DispatchOutcome>, AgentError> {
    let Some(text) = normalize_utterance(utterance) else {
        tracing::debug!("empty transcript, skipping");
        return Ok(None);
    };
    tracing::info!(utterance = %text, mode = %components.mode.current(), "processing utterance");

    if components.echo {
        if let Err(e) = components.voice.speak(text).await {
            tracing::warn!(error = %e, "echo failed");
        }
    }

    let mut session = components.session();
    if let Some(tx) = event_tx {
        session = session.with_event_tx(tx);
    }
    dispatch_loop(&session, text).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Mode;
    use crate::llm::{Completion, ScriptedCompletion};
    use crate::memory::ActionRequest;
    use crate::react::ExitReason;
    use crate::robot::DryRunChannel;
    use crate::voice::RecordingVoice;

    fn components(
        completion: Arc<ScriptedCompletion>,
        voice: Arc<RecordingVoice>,
    ) -> (AgentComponents, Arc<DryRunChannel>) {
        let channel = Arc::new(DryRunChannel::new());
        let components =
            create_agent_components(&AppConfig::default(), channel.clone(), voice, completion)
                .unwrap();
        (components, channel)
    }

    #[test]
    fn test_normalize_utterance() {
        assert_eq!(normalize_utterance("  stand up \n"), Some("stand up"));
        assert_eq!(normalize_utterance(""), None);
        assert_eq!(normalize_utterance(" \t\n"), None);
    }

    #[tokio::test]
    async fn test_empty_utterance_skipped() {
        let completion = Arc::new(ScriptedCompletion::default());
        let (c, _) = components(completion.clone(), Arc::new(RecordingVoice::new()));
        assert!(process_utterance(&c, "   ", None).await.unwrap().is_none());
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stand_up_reaches_robot() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            Completion::actions(vec![ActionRequest::new("call_1", "stand_up", "{}")]),
            Completion::text("I'm up!"),
        ]));
        let voice = Arc::new(RecordingVoice::new());
        let (c, channel) = components(completion, voice.clone());

        let out = process_utterance(&c, "stand up", None).await.unwrap().unwrap();
        assert_eq!(out.exit, ExitReason::NoActionRequests);
        assert_eq!(channel.published().len(), 1);
        assert_eq!(channel.published()[0].1["api_id"], 1004);
        assert_eq!(voice.spoken(), vec!["I'm up!".to_string()]);
        assert_eq!(c.mode.current(), Mode::Awake);
    }

    #[tokio::test]
    async fn test_echo_speaks_transcript_first() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Completion::text("Woof")]));
        let voice = Arc::new(RecordingVoice::new());
        let (c, _) = components(completion, voice.clone());
        let c = c.with_echo(true);

        process_utterance(&c, " hi doggo ", None).await.unwrap();
        assert_eq!(voice.spoken(), vec!["hi doggo".to_string(), "Woof".to_string()]);
    }

    #[test]
    fn test_components_follow_config() {
        let mut cfg = AppConfig::default();
        cfg.app.initial_mode = Mode::Asleep;
        cfg.agent.max_rounds = 2;
        let c = create_agent_components(
            &cfg,
            Arc::new(DryRunChannel::new()),
            Arc::new(RecordingVoice::new()),
            Arc::new(ScriptedCompletion::default()),
        )
        .unwrap();
        assert_eq!(c.mode.current(), Mode::Asleep);
        assert_eq!(c.max_rounds, 2);
        assert_eq!(c.executor.catalog().len(), 7);
    }
}
