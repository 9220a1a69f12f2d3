//! 调度过程事件：轮次、说话、动作调用与结果、终止原因

use serde::Serialize;

use crate::core::Mode;
use crate::react::ExitReason;

/// 单步过程事件（可序列化为 JSON 供日志或前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// 新一轮开始（round 从 1 计）
    RoundStarted {
        round: usize,
        max_rounds: usize,
        mode: Mode,
    },
    /// 说出模型给出的文本
    Speaking { text: String },
    /// 调用动作
    ActionCall {
        action: String,
        call_id: String,
        args: String,
    },
    /// 动作返回（失败时 result 为写回对话的错误描述）
    ActionResult {
        action: String,
        call_id: String,
        ok: bool,
        result: String,
    },
    /// 错误恢复动作（Continue / Abort）
    Recovery { action: String, detail: String },
    /// 本条 utterance 的 token 增量
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    /// 正常结束
    Finished { rounds: usize, exit: ExitReason },
    /// 协议违例或补全失败导致中止
    Halted { reason: String },
}
