//! 记忆层：单条 utterance 的对话缓冲（每次处理新建，结束即丢弃）

pub mod conversation;

pub use conversation::{ActionRequest, ConversationBuffer, Turn};
