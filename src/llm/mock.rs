//! Mock 补全服务（无需 API）
//!
//! - MockCompletion：按关键词把最后一条 User 文本映射到当前可见的动作，离线也能跑通整条链路；
//! - ScriptedCompletion：按顺序回放预设 Completion，并记录每次调用看到的对话与动作目录（测试用）。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completion, CompletionService, LlmError};
use crate::memory::{ActionRequest, Turn};
use crate::tools::ActionSpec;

/// 关键词 → (动作名, 参数)
const KEYWORDS: &[(&str, &str, &str)] = &[
    ("wake", "awake", "{}"),
    ("sleep", "sleep", "{}"),
    ("stand", "stand_up", "{}"),
    ("lie down", "lie_down", "{}"),
    ("relax", "lie_down", "{}"),
    ("hello", "hello", "{}"),
    ("wave", "hello", "{}"),
    ("stop", "stop", "{}"),
    ("forward", "move", r#"{"x":0.3,"y":0,"z":0}"#),
    ("back", "move", r#"{"x":-0.3,"y":0,"z":0}"#),
    ("left", "move", r#"{"x":0,"y":0.3,"z":0}"#),
    ("right", "move", r#"{"x":0,"y":-0.3,"z":0}"#),
];

/// Mock 客户端：关键词匹配可见动作；上一条是动作结果时直接口头确认并结束
#[derive(Debug, Default)]
pub struct MockCompletion;

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(
        &self,
        turns: &[Turn],
        actions: &[ActionSpec],
    ) -> Result<Completion, LlmError> {
        if let Some(Turn::ActionResult { result, .. }) = turns.last() {
            return Ok(Completion::text(format!("Woof! {result}.")));
        }

        let last_user = turns
            .iter()
            .rev()
            .find_map(|t| match t {
                Turn::User { text } => Some(text.to_lowercase()),
                _ => None,
            })
            .unwrap_or_default();

        let hit = KEYWORDS
            .iter()
            .find(|(kw, name, _)| last_user.contains(kw) && actions.iter().any(|a| a.name == *name));

        Ok(match hit {
            Some((_, name, args)) => Completion::actions(vec![ActionRequest::new(
                format!("call_{}", uuid::Uuid::new_v4().simple()),
                *name,
                *args,
            )]),
            None => Completion::text("Ruff? I can't do that right now."),
        })
    }
}

/// ScriptedCompletion 记录的一次调用
#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub turns: Vec<Turn>,
    pub action_names: Vec<String>,
}

/// 回放预设 Completion；脚本耗尽后返回空 Completion（无文本、无请求）
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Completion>>,
    calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedCompletion {
    pub fn new(script: impl IntoIterator<Item = Completion>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加脚本（多条 utterance 共用一个实例时）
    pub fn push(&self, completion: Completion) {
        if let Ok(mut s) = self.script.lock() {
            s.push_back(completion);
        }
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        turns: &[Turn],
        actions: &[ActionSpec],
    ) -> Result<Completion, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(CompletionCall {
                turns: turns.to_vec(),
                action_names: actions.iter().map(|a| a.name.clone()).collect(),
            });
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_default();
        Ok(next)
    }
}
