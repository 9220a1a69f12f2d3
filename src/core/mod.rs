//! 核心层：错误与恢复、模式状态、命令队列编排、优雅关闭

pub mod error;
pub mod mode;
pub mod orchestrator;
pub mod recovery;
pub mod shutdown;

pub use error::{ActionError, AgentError, RecoveryAction};
pub use mode::{Mode, ModeState};
pub use orchestrator::{spawn_shell, Command, ShellHandle};
pub use recovery::RecoveryEngine;
pub use shutdown::{
    RobotStopCleanup, ShutdownCleanup, ShutdownCoordinator, ShutdownManager, ShutdownReason,
};
