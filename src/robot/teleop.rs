//! 键盘遥控映射：1 站起 / 2 放松 / 3 打招呼 / w s a d 平移 / q 退出

use serde_json::json;

use crate::robot::{SportCommand, SportRequest};

/// 平移速度
pub const TELEOP_SPEED: f64 = 0.3;

pub const TELEOP_HELP: &str = "Commands:
  1 - Stand up
  2 - Damp (relax)
  3 - Hello wave
  w - Move forward
  s - Move backward
  a - Move left
  d - Move right
  q - Quit";

/// 一次按键的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum TeleopKey {
    Send {
        label: &'static str,
        request: SportRequest,
    },
    Quit,
    Unknown(String),
}

fn move_by(x: f64, y: f64) -> SportRequest {
    SportRequest::new(SportCommand::Move).with_parameter(json!({"x": x, "y": y, "z": 0.0}))
}

/// 解析一行输入（忽略大小写与首尾空白）
pub fn parse_key(input: &str) -> TeleopKey {
    let key = input.trim().to_lowercase();
    let (label, request) = match key.as_str() {
        "1" => ("Standing up...", SportCommand::StandUp.into()),
        "2" => ("Damping (relaxing)...", SportCommand::Damp.into()),
        "3" => ("Saying hello...", SportCommand::Hello.into()),
        "w" => ("Moving forward...", move_by(TELEOP_SPEED, 0.0)),
        "s" => ("Moving backward...", move_by(-TELEOP_SPEED, 0.0)),
        "a" => ("Moving left...", move_by(0.0, TELEOP_SPEED)),
        "d" => ("Moving right...", move_by(0.0, -TELEOP_SPEED)),
        "q" => return TeleopKey::Quit,
        _ => return TeleopKey::Unknown(key),
    };
    TeleopKey::Send { label, request }
}
