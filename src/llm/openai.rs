//! OpenAI 兼容 Chat Completions 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），可见动作以 function tools 下发。
//! Turn → 请求消息：AssistantActionRequest 映射为带 tool_calls 的 assistant 消息，ActionResult 映射为 tool 消息。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    FunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{Completion, CompletionService, LlmError};
use crate::memory::{ActionRequest, Turn};
use crate::tools::ActionSpec;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, request_timeout_secs: u64) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            usage: TokenUsage::new(),
        }
    }

    fn build_request(
        &self,
        turns: &[Turn],
        actions: &[ActionSpec],
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.as_str())
            .messages(to_request_messages(turns)?);
        if !actions.is_empty() {
            args.tools(to_request_tools(actions)?);
        }
        args.build()
    }
}

fn tool_call(request: &ActionRequest) -> ChatCompletionMessageToolCalls {
    ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
        id: request.call_id.clone(),
        function: FunctionCall {
            name: request.action_name.clone(),
            arguments: request.raw_arguments.clone(),
        },
    })
}

/// Turn → Chat Completions 请求消息
pub(crate) fn to_request_messages(
    turns: &[Turn],
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    turns
        .iter()
        .map(|turn| {
            Ok(match turn {
                Turn::System { text } => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(text.clone())
                        .build()?,
                ),
                Turn::User { text } => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(text.clone())
                        .build()?,
                ),
                Turn::AssistantText { text } => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(text.clone())
                        .build()?,
                ),
                Turn::AssistantActionRequest { requests } => {
                    ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .tool_calls(requests.iter().map(tool_call).collect::<Vec<_>>())
                            .build()?,
                    )
                }
                Turn::ActionResult { call_id, result } => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call_id.clone())
                        .content(result.clone())
                        .build()?,
                ),
            })
        })
        .collect()
}

/// 可见动作 → function tools
pub(crate) fn to_request_tools(
    actions: &[ActionSpec],
) -> Result<Vec<ChatCompletionTools>, OpenAIError> {
    actions
        .iter()
        .map(|a| {
            let function = FunctionObjectArgs::default()
                .name(a.name.clone())
                .description(a.description.clone())
                .parameters(a.parameters.clone())
                .build()?;
            Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
        })
        .collect()
}

fn parse_response(response: CreateChatCompletionResponse) -> Result<Completion, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;
    let text = choice.message.content.filter(|c| !c.trim().is_empty());

    let mut action_requests = Vec::new();
    for call in choice.message.tool_calls.unwrap_or_default() {
        match call {
            ChatCompletionMessageToolCalls::Function(call) => action_requests.push(
                ActionRequest::new(call.id, call.function.name, call.function.arguments),
            ),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(LlmError::Malformed(
                    "only function tool calls are supported".to_string(),
                ))
            }
        }
    }

    Ok(Completion {
        text,
        action_requests,
    })
}

#[async_trait]
impl CompletionService for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        turns: &[Turn],
        actions: &[ActionSpec],
    ) -> Result<Completion, LlmError> {
        let request = self.build_request(turns, actions)?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(self.request_timeout.as_secs()))?
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion failed");
                LlmError::OpenAi(e)
            })?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        parse_response(response)
    }
}
