//! 错误恢复引擎
//!
//! 动作级失败在本地恢复：转成描述性结果文本写回对话，让模型下一轮道歉或重试；
//! 目录/协议级失败终止当前 utterance，只出现在日志里，绝不触发机器人动作。

use crate::core::{ActionError, AgentError, RecoveryAction};

/// 语义化错误恢复：AgentError → 继续 / 终止；ActionError → 给模型看的结果文本
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::Voice(_) => RecoveryAction::Continue,
            _ => RecoveryAction::Abort,
        }
    }

    /// 将动作失败描述为 ActionResult 文本
    pub fn describe_action_failure(&self, action: &str, err: &ActionError) -> String {
        match err {
            ActionError::InvalidArguments(msg) => {
                format!("Error: {action} rejected its arguments: {msg}")
            }
            ActionError::Channel(e) => {
                format!("Error: {action} could not reach the robot: {e}")
            }
            ActionError::Timeout(secs) => {
                format!("Error: {action} did not finish within {secs}s")
            }
            ActionError::NotAvailable(mode) => {
                format!("Not executed: {action} is not available while the doggo is {mode}")
            }
        }
    }
}
