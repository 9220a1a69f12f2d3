//! 运动动作：stand_up / lie_down / hello / move / stop
//!
//! 全部仅在清醒时可见；每个动作经重连守卫发布一条 sport 命令，返回固定的确认文本。

use std::sync::Arc;

use serde_json::json;

use crate::core::ActionError;
use crate::robot::{ReconnectGuard, SportCommand, SportRequest};
use crate::tools::schema::{schema_of, MoveArgs};
use crate::tools::{Action, ModeScope};

pub const STAND_UP: &str = "stand_up";
pub const LIE_DOWN: &str = "lie_down";
pub const HELLO: &str = "hello";
pub const MOVE: &str = "move";
pub const STOP: &str = "stop";

/// 校验 move 参数：必须能解析为三个数值轴
pub fn parse_move_args(raw: &str) -> Result<MoveArgs, ActionError> {
    let args: MoveArgs = serde_json::from_str(raw)
        .map_err(|e| ActionError::InvalidArguments(format!("expected numeric x, y, z: {e}")))?;
    if !(args.x.is_finite() && args.y.is_finite() && args.z.is_finite()) {
        return Err(ActionError::InvalidArguments(
            "x, y and z must be finite numbers".to_string(),
        ));
    }
    Ok(args)
}

fn fixed_command(
    guard: &Arc<ReconnectGuard>,
    name: &'static str,
    description: &'static str,
    command: SportCommand,
    confirmation: &'static str,
) -> Action {
    let guard = guard.clone();
    Action::new(name, description, ModeScope::AwakeOnly, move |_args| {
        let guard = guard.clone();
        async move {
            guard.send_sport(SportRequest::new(command)).await?;
            Ok(confirmation.to_string())
        }
    })
}

/// 运动动作列表，按注册顺序
pub fn motion_actions(guard: Arc<ReconnectGuard>) -> Vec<Action> {
    let move_guard = guard.clone();
    let move_action = Action::new(
        MOVE,
        "Move the doggo with a velocity vector: x forward/backward, y left/right, z turning",
        ModeScope::AwakeOnly,
        move |args| {
            let guard = move_guard.clone();
            async move {
                let MoveArgs { x, y, z } = parse_move_args(&args)?;
                guard
                    .send_sport(
                        SportRequest::new(SportCommand::Move)
                            .with_parameter(json!({"x": x, "y": y, "z": z})),
                    )
                    .await?;
                Ok("Doggo is now moving".to_string())
            }
        },
    )
    .with_schema(schema_of::<MoveArgs>());

    vec![
        fixed_command(
            &guard,
            STAND_UP,
            "Make the doggo stand up",
            SportCommand::StandUp,
            "Doggo is now standing up",
        ),
        fixed_command(
            &guard,
            LIE_DOWN,
            "Make the doggo relax and lie down",
            SportCommand::Damp,
            "Doggo is now damping",
        ),
        fixed_command(
            &guard,
            HELLO,
            "Make the doggo wave hello",
            SportCommand::Hello,
            "Doggo is now saying hello",
        ),
        move_action,
        fixed_command(
            &guard,
            STOP,
            "Stop whatever movement the doggo is doing",
            SportCommand::StopMove,
            "Doggo is now stopping",
        ),
    ]
}
