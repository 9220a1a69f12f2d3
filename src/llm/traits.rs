//! 补全服务抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 CompletionService：
//! 输入有序 Turn 与当前可见动作目录，输出一个 Completion（可选文本 + 有序动作请求）。

use async_openai::error::OpenAIError;
use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{ActionRequest, Turn};
use crate::tools::ActionSpec;

/// 补全服务的一次选择结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// 要说给用户听的文本
    pub text: Option<String>,
    /// 按返回顺序排列的动作请求
    pub action_requests: Vec<ActionRequest>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            action_requests: Vec::new(),
        }
    }

    pub fn actions(requests: Vec<ActionRequest>) -> Self {
        Self {
            text: None,
            action_requests: requests,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// 补全服务错误
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OpenAI error: {0}")]
    OpenAi(#[from] OpenAIError),

    #[error("Completion timed out after {0}s")]
    Timeout(u64),

    #[error("Response carried no choices")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// 补全服务 trait
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        actions: &[ActionSpec],
    ) -> Result<Completion, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
