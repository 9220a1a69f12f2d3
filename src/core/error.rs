//! 错误类型与恢复动作
//!
//! - AgentError：整条 utterance 级别的失败（目录/协议违例、补全服务、配置、语音），由 RecoveryEngine 决定继续还是终止；
//! - ActionError：单个动作回调的失败（参数校验、机器人通道、超时），不会中止本次处理，而是作为结果文本写回对话。

use thiserror::Error;

use crate::core::Mode;
use crate::llm::LlmError;
use crate::robot::ChannelError;
use crate::voice::VoiceError;

/// 调度过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Duplicate action name: {0}")]
    DuplicateActionName(String),

    /// 补全服务返回了当前可见目录之外的动作名：目录与提示词不同步，属于协议违例
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action result without matching request: {0}")]
    UnmatchedActionResult(String),

    #[error("Completion failed: {0}")]
    Completion(#[from] LlmError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 外壳工作任务已退出，命令无法投递
    #[error("Shell closed")]
    ShellClosed,
}

/// 动作回调失败（ActionExecutionFailure）
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("robot channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("timed out after {0}s")]
    Timeout(u64),

    /// 同一轮内模式已切换，该动作在当前模式下不再可用
    #[error("not available while {0}")]
    NotAvailable(Mode),
}

/// 恢复引擎根据 AgentError 给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 记录后继续当前轮（如语音播放失败）
    Continue,
    /// 终止当前 utterance 的处理并报告给操作者
    Abort,
}
