//! 对话缓冲：单条 utterance 的运行上下文
//!
//! 每条 utterance 新建一份：一条 System（按当时模式选择）+ 一条 User，之后只追加。
//! ActionResult 必须与此前 AssistantActionRequest 中的 call_id 一一对应，且按请求顺序追加。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 补全服务请求执行的一个动作
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub call_id: String,
    pub action_name: String,
    /// 原样透传给动作回调（约定为 JSON 编码的对象）
    pub raw_arguments: String,
}

impl ActionRequest {
    pub fn new(
        call_id: impl Into<String>,
        action_name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            action_name: action_name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }
}

/// 对话中的一条记录
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    System { text: String },
    User { text: String },
    AssistantText { text: String },
    AssistantActionRequest { requests: Vec<ActionRequest> },
    ActionResult { call_id: String, result: String },
}

/// 只追加的对话缓冲；pending 记录尚未写回结果的 call_id（按请求顺序）
#[derive(Clone, Debug)]
pub struct ConversationBuffer {
    turns: Vec<Turn>,
    pending: VecDeque<String>,
}

impl ConversationBuffer {
    pub fn new(system_prompt: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            turns: vec![
                Turn::System {
                    text: system_prompt.into(),
                },
                Turn::User {
                    text: utterance.into(),
                },
            ],
            pending: VecDeque::new(),
        }
    }

    pub fn push_assistant_text(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::AssistantText { text: text.into() });
    }

    /// 一轮内的全部请求合并为一条 AssistantActionRequest
    pub fn push_action_requests(&mut self, requests: Vec<ActionRequest>) {
        if requests.is_empty() {
            return;
        }
        self.pending
            .extend(requests.iter().map(|r| r.call_id.clone()));
        self.turns.push(Turn::AssistantActionRequest { requests });
    }

    /// 追加动作结果；call_id 必须是下一个待回填的请求
    pub fn push_action_result(
        &mut self,
        call_id: &str,
        result: impl Into<String>,
    ) -> Result<(), AgentError> {
        match self.pending.front() {
            Some(expected) if expected == call_id => {
                self.pending.pop_front();
                self.turns.push(Turn::ActionResult {
                    call_id: call_id.to_string(),
                    result: result.into(),
                });
                Ok(())
            }
            _ => Err(AgentError::UnmatchedActionResult(call_id.to_string())),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    /// 尚未回填结果的请求数
    pub fn pending_results(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_system_and_user() {
        let buf = ConversationBuffer::new("be a good dog", "stand up");
        assert_eq!(buf.len(), 2);
        assert!(matches!(&buf.turns()[0], Turn::System { text } if text == "be a good dog"));
        assert!(matches!(&buf.turns()[1], Turn::User { text } if text == "stand up"));
    }

    #[test]
    fn test_results_follow_request_order() {
        let mut buf = ConversationBuffer::new("sys", "hi");
        buf.push_action_requests(vec![
            ActionRequest::new("call_a", "hello", "{}"),
            ActionRequest::new("call_b", "stand_up", "{}"),
        ]);
        assert_eq!(buf.pending_results(), 2);

        let err = buf.push_action_result("call_b", "out of order").unwrap_err();
        assert!(matches!(err, AgentError::UnmatchedActionResult(id) if id == "call_b"));

        buf.push_action_result("call_a", "ok a").unwrap();
        buf.push_action_result("call_b", "ok b").unwrap();
        assert_eq!(buf.pending_results(), 0);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_result_without_request_rejected() {
        let mut buf = ConversationBuffer::new("sys", "hi");
        assert!(buf.push_action_result("call_x", "ghost").is_err());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_empty_request_list_not_appended() {
        let mut buf = ConversationBuffer::new("sys", "hi");
        buf.push_action_requests(Vec::new());
        buf.push_assistant_text("woof");
        assert_eq!(buf.len(), 3);
        assert!(matches!(buf.turns().last(), Some(Turn::AssistantText { .. })));
    }

    #[test]
    fn test_turn_serializes_with_kind_tag() {
        let turn = Turn::ActionResult {
            call_id: "call_1".to_string(),
            result: "done".to_string(),
        };
        let v = serde_json::to_value(&turn).unwrap();
        assert_eq!(v["kind"], "action_result");
        assert_eq!(v["call_id"], "call_1");
    }
}
