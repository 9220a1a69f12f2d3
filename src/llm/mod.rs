//! LLM 层：补全服务抽象与实现（OpenAI 兼容 / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{CompletionCall, MockCompletion, ScriptedCompletion};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{Completion, CompletionService, LlmError};
