//! 调度主循环
//!
//! 一条 utterance → 新建对话缓冲 → 反复「补全 → 说话 → 执行动作 → 写回结果」，直到：
//! 本轮没有动作请求、执行动作后进入睡眠、或达到轮数上限。
//! 可选 event_tx：推送 RoundStarted / Speaking / ActionCall / ActionResult / Finished 等事件。

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::{ActionError, AgentError, Mode, ModeState, RecoveryAction, RecoveryEngine};
use crate::llm::CompletionService;
use crate::memory::{ConversationBuffer, Turn};
use crate::react::{DispatchEvent, SystemPrompts};
use crate::tools::{ActionExecutor, ActionSpec};
use crate::voice::VoiceOutput;

/// 单条 utterance 内最大轮数，防止动作调用链失控
pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// 循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// 本轮补全没有请求任何动作
    NoActionRequests,
    /// 执行动作后处于睡眠模式
    Asleep,
    /// 达到轮数上限
    RoundLimit,
}

/// 一次动作执行的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub round: usize,
    pub call_id: String,
    pub action: String,
    pub raw_arguments: String,
    pub ok: bool,
    pub result: String,
}

/// dispatch_loop 的结果
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub rounds: usize,
    pub exit: ExitReason,
    /// 按顺序说出的文本
    pub spoken: Vec<String>,
    /// 按执行顺序的动作记录
    pub actions: Vec<ActionRecord>,
    /// 结束时的完整对话
    pub turns: Vec<Turn>,
}

/// 调度会话：循环所需的全部依赖（均为借用，由 AgentComponents 持有）
pub struct DispatchSession<'a> {
    pub completion: &'a dyn CompletionService,
    pub executor: &'a ActionExecutor,
    pub mode: &'a ModeState,
    pub prompts: &'a SystemPrompts,
    pub voice: &'a dyn VoiceOutput,
    pub recovery: &'a RecoveryEngine,
    pub max_rounds: usize,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a mpsc::UnboundedSender<DispatchEvent>>,
}

impl<'a> DispatchSession<'a> {
    pub fn new(
        completion: &'a dyn CompletionService,
        executor: &'a ActionExecutor,
        mode: &'a ModeState,
        prompts: &'a SystemPrompts,
        voice: &'a dyn VoiceOutput,
        recovery: &'a RecoveryEngine,
    ) -> Self {
        Self {
            completion,
            executor,
            mode,
            prompts,
            voice,
            recovery,
            max_rounds: DEFAULT_MAX_ROUNDS,
            event_tx: None,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_event_tx(mut self, tx: &'a mpsc::UnboundedSender<DispatchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: DispatchEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn halt(&self, err: AgentError) -> AgentError {
        let action = self.recovery.handle(&err);
        tracing::error!(error = %err, recovery = ?action, "utterance halted");
        self.send_event(DispatchEvent::Halted {
            reason: err.to_string(),
        });
        err
    }
}

/// 处理一条 utterance
///
/// 每轮：按当前模式取可见动作 → 补全 → 有文本先说完 → 校验全部请求都在本轮可见目录中 →
/// 合并追加一条 AssistantActionRequest → 按序执行并逐条写回 ActionResult。
/// 请求了不可见的动作属于协议违例：立即中止，不写回任何结果、不执行任何动作。
pub async fn dispatch_loop(
    session: &DispatchSession<'_>,
    utterance: &str,
) -> Result<DispatchOutcome, AgentError> {
    let mut buffer =
        ConversationBuffer::new(session.prompts.for_mode(session.mode.current()), utterance);
    let mut rounds = 0usize;
    let mut spoken = Vec::new();
    let mut records = Vec::new();
    let usage_before = session.completion.token_usage();

    let exit = loop {
        if rounds >= session.max_rounds {
            tracing::warn!(max_rounds = session.max_rounds, "round limit reached");
            break ExitReason::RoundLimit;
        }
        rounds += 1;

        let round_mode = session.mode.current();
        let visible = session.executor.catalog().visible(round_mode);
        let specs: Vec<ActionSpec> = visible.iter().map(|a| a.spec()).collect();
        session.send_event(DispatchEvent::RoundStarted {
            round: rounds,
            max_rounds: session.max_rounds,
            mode: round_mode,
        });
        tracing::debug!(round = rounds, mode = %round_mode, actions = specs.len(), "requesting completion");

        let completion = match session.completion.complete(buffer.turns(), &specs).await {
            Ok(c) => c,
            Err(e) => return Err(session.halt(AgentError::Completion(e))),
        };

        if let Some(text) = completion.text.filter(|t| !t.trim().is_empty()) {
            buffer.push_assistant_text(text.clone());
            session.send_event(DispatchEvent::Speaking { text: text.clone() });
            if let Err(e) = session.voice.speak(&text).await {
                let err = AgentError::Voice(e);
                match session.recovery.handle(&err) {
                    RecoveryAction::Continue => {
                        tracing::warn!(error = %err, "speech failed, continuing");
                        session.send_event(DispatchEvent::Recovery {
                            action: "continue".to_string(),
                            detail: err.to_string(),
                        });
                    }
                    RecoveryAction::Abort => return Err(session.halt(err)),
                }
            }
            spoken.push(text);
        }

        let requests = completion.action_requests;
        if requests.is_empty() {
            break ExitReason::NoActionRequests;
        }

        let catalog = session.executor.catalog();
        let mut resolved = Vec::with_capacity(requests.len());
        for request in &requests {
            match catalog.lookup_visible(round_mode, &request.action_name) {
                Ok(action) => resolved.push(action),
                Err(e) => return Err(session.halt(e)),
            }
        }

        buffer.push_action_requests(requests.clone());
        for (request, action) in requests.into_iter().zip(resolved) {
            session.send_event(DispatchEvent::ActionCall {
                action: action.name.clone(),
                call_id: request.call_id.clone(),
                args: request.raw_arguments.clone(),
            });

            // 同一轮内前一个动作可能已切换模式
            let current = session.mode.current();
            let result = if action.mode_scope.admits(current) {
                session
                    .executor
                    .execute(&action, request.raw_arguments.clone())
                    .await
            } else {
                Err(ActionError::NotAvailable(current))
            };

            let (ok, text) = match result {
                Ok(text) => (true, text),
                Err(e) => {
                    tracing::warn!(action = %action.name, error = %e, "action failed");
                    (false, session.recovery.describe_action_failure(&action.name, &e))
                }
            };
            buffer.push_action_result(&request.call_id, text.clone())?;
            session.send_event(DispatchEvent::ActionResult {
                action: action.name.clone(),
                call_id: request.call_id.clone(),
                ok,
                result: text.clone(),
            });
            records.push(ActionRecord {
                round: rounds,
                call_id: request.call_id,
                action: action.name.clone(),
                raw_arguments: request.raw_arguments,
                ok,
                result: text,
            });
        }

        if session.mode.current() == Mode::Asleep {
            break ExitReason::Asleep;
        }
    };

    let (p0, c0, t0) = usage_before;
    let (p1, c1, t1) = session.completion.token_usage();
    if t1 > t0 {
        tracing::info!(
            prompt_tokens = p1.saturating_sub(p0),
            completion_tokens = c1.saturating_sub(c0),
            total_tokens = t1 - t0,
            cumulative_total = t1,
            "token usage"
        );
        session.send_event(DispatchEvent::TokenUsage {
            prompt_tokens: p1.saturating_sub(p0),
            completion_tokens: c1.saturating_sub(c0),
            total_tokens: t1 - t0,
        });
    }

    tracing::info!(rounds, exit = ?exit, actions = records.len(), "utterance handled");
    session.send_event(DispatchEvent::Finished { rounds, exit });

    Ok(DispatchOutcome {
        rounds,
        exit,
        spoken,
        actions: records,
        turns: buffer.into_turns(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, ScriptedCompletion};
    use crate::memory::ActionRequest;
    use crate::tools::{Action, ActionCatalog, ModeScope};
    use crate::voice::RecordingVoice;
    use std::sync::Arc;

    fn catalog(mode: Arc<ModeState>) -> ActionCatalog {
        let mut c = ActionCatalog::new();
        for action in crate::tools::control_actions(mode) {
            c.register(action).unwrap();
        }
        c.register(Action::new("wag", "Wag the tail", ModeScope::AwakeOnly, |_| async {
            Ok("Doggo is wagging".to_string())
        }))
        .unwrap();
        c
    }

    struct Fixture {
        mode: Arc<ModeState>,
        executor: ActionExecutor,
        prompts: SystemPrompts,
        voice: RecordingVoice,
        recovery: RecoveryEngine,
    }

    impl Fixture {
        fn new(initial: Mode) -> Self {
            let mode = Arc::new(ModeState::new(initial));
            Self {
                executor: ActionExecutor::new(catalog(mode.clone()), 5),
                mode,
                prompts: SystemPrompts::default(),
                voice: RecordingVoice::new(),
                recovery: RecoveryEngine::new(),
            }
        }

        fn session<'a>(&'a self, completion: &'a ScriptedCompletion) -> DispatchSession<'a> {
            DispatchSession::new(
                completion,
                &self.executor,
                &self.mode,
                &self.prompts,
                &self.voice,
                &self.recovery,
            )
        }
    }

    fn call(id: &str, name: &str) -> ActionRequest {
        ActionRequest::new(id, name, "{}")
    }

    #[tokio::test]
    async fn test_text_only_round_ends_loop() {
        let f = Fixture::new(Mode::Awake);
        let completion = ScriptedCompletion::new(vec![Completion::text("Woof!")]);
        let out = dispatch_loop(&f.session(&completion), "hi").await.unwrap();
        assert_eq!(out.rounds, 1);
        assert_eq!(out.exit, ExitReason::NoActionRequests);
        assert_eq!(f.voice.spoken(), vec!["Woof!".to_string()]);
        assert_eq!(out.turns.len(), 3);
    }

    #[tokio::test]
    async fn test_round_limit_never_exceeded() {
        let f = Fixture::new(Mode::Awake);
        let completion = ScriptedCompletion::new(
            (0..10).map(|i| Completion::actions(vec![call(&format!("call_{i}"), "wag")])),
        );
        let session = f.session(&completion).with_max_rounds(3);
        let out = dispatch_loop(&session, "wag forever").await.unwrap();
        assert_eq!(out.rounds, 3);
        assert_eq!(out.exit, ExitReason::RoundLimit);
        assert_eq!(completion.call_count(), 3);
        assert_eq!(out.actions.len(), 3);
    }

    #[tokio::test]
    async fn test_sleep_mid_round_blocks_later_requests() {
        let f = Fixture::new(Mode::Awake);
        let completion = ScriptedCompletion::new(vec![Completion::actions(vec![
            call("call_1", "sleep"),
            call("call_2", "wag"),
        ])]);
        let out = dispatch_loop(&f.session(&completion), "sleep then wag").await.unwrap();
        assert_eq!(out.exit, ExitReason::Asleep);
        assert_eq!(f.mode.current(), Mode::Asleep);
        assert!(out.actions[0].ok);
        assert!(!out.actions[1].ok);
        assert!(out.actions[1].result.starts_with("Not executed"));
    }

    #[tokio::test]
    async fn test_unknown_action_halts_without_result() {
        let f = Fixture::new(Mode::Awake);
        let completion = ScriptedCompletion::new(vec![Completion::actions(vec![
            call("call_1", "wag"),
            call("call_2", "fly"),
        ])]);
        let err = dispatch_loop(&f.session(&completion), "fly").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction(n) if n == "fly"));
        assert_eq!(completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_registered_but_hidden_action_is_unknown() {
        let f = Fixture::new(Mode::Asleep);
        let completion = ScriptedCompletion::new(vec![Completion::actions(vec![call(
            "call_1", "wag",
        )])]);
        let err = dispatch_loop(&f.session(&completion), "wag").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction(n) if n == "wag"));
        assert!(f.executor.catalog().lookup("wag").is_ok());
        assert_eq!(f.mode.current(), Mode::Asleep);
    }

    #[tokio::test]
    async fn test_speech_failure_continues() {
        let mut f = Fixture::new(Mode::Awake);
        f.voice = RecordingVoice::failing();
        let completion = ScriptedCompletion::new(vec![
            Completion::actions(vec![call("call_1", "wag")]).with_text("Here I go"),
            Completion::text("Done"),
        ]);
        let out = dispatch_loop(&f.session(&completion), "wag").await.unwrap();
        assert_eq!(out.rounds, 2);
        assert_eq!(out.spoken, vec!["Here I go".to_string(), "Done".to_string()]);
        assert_eq!(out.actions.len(), 1);
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let f = Fixture::new(Mode::Awake);
        let completion = ScriptedCompletion::new(vec![
            Completion::actions(vec![call("call_1", "wag")]),
            Completion::text("wagged"),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = f.session(&completion).with_event_tx(&tx);
        dispatch_loop(&session, "wag").await.unwrap();
        drop(session);
        drop(tx);

        let mut kinds = Vec::new();
        while let Some(ev) = rx.recv().await {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "round_started",
                "action_call",
                "action_result",
                "round_started",
                "speaking",
                "finished"
            ]
        );
    }
}
