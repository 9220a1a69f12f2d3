//! 机器人侧：命令通道、sport 命令、重连守卫、键盘遥控映射

pub mod channel;
pub mod dry_run;
pub mod guard;
pub mod sport;
pub mod teleop;
pub mod websocket;

pub use channel::{ChannelError, CommandChannel};
pub use dry_run::DryRunChannel;
pub use guard::ReconnectGuard;
pub use sport::{SportCommand, SportRequest, SPORT_TOPIC};
pub use teleop::{parse_key, TeleopKey, TELEOP_HELP};
pub use websocket::WsCommandChannel;
