//! 运动控制命令（sport API）
//!
//! 每条命令发布到 `rt/api/sport/request`，载荷为 `{api_id, parameter?}`。

use serde::Serialize;
use serde_json::Value;

pub const SPORT_TOPIC: &str = "rt/api/sport/request";

/// 本外壳用到的运动命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SportCommand {
    Damp,
    StopMove,
    StandUp,
    Move,
    Hello,
}

impl SportCommand {
    pub fn api_id(self) -> u32 {
        match self {
            SportCommand::Damp => 1001,
            SportCommand::StopMove => 1003,
            SportCommand::StandUp => 1004,
            SportCommand::Move => 1008,
            SportCommand::Hello => 1016,
        }
    }
}

/// 一条 sport 请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SportRequest {
    pub api_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Value>,
}

impl SportRequest {
    pub fn new(command: SportCommand) -> Self {
        Self {
            api_id: command.api_id(),
            parameter: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Value) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<SportCommand> for SportRequest {
    fn from(command: SportCommand) -> Self {
        Self::new(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_without_parameter() {
        let payload = SportRequest::from(SportCommand::StandUp).to_payload();
        assert_eq!(payload, json!({"api_id": 1004}));
    }

    #[test]
    fn test_payload_with_parameter() {
        let payload = SportRequest::new(SportCommand::Move)
            .with_parameter(json!({"x": 0.3, "y": 0.0, "z": 0.0}))
            .to_payload();
        assert_eq!(payload["api_id"], 1008);
        assert_eq!(payload["parameter"]["x"], 0.3);
    }

    #[test]
    fn test_api_ids() {
        assert_eq!(SportCommand::Damp.api_id(), 1001);
        assert_eq!(SportCommand::StopMove.api_id(), 1003);
        assert_eq!(SportCommand::Hello.api_id(), 1016);
    }
}
