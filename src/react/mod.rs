//! 调度层：有界的补全-动作循环、按模式选择的 system prompt、过程事件

pub mod events;
pub mod loop_;
pub mod prompts;

pub use events::DispatchEvent;
pub use loop_::{
    dispatch_loop, ActionRecord, DispatchOutcome, DispatchSession, ExitReason, DEFAULT_MAX_ROUNDS,
};
pub use prompts::SystemPrompts;
