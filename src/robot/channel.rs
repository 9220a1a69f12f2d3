//! 机器人命令通道抽象

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 命令通道错误
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{op} timed out after {secs}s")]
    Timeout { op: &'static str, secs: u64 },

    #[error("robot rejected request: {0}")]
    Rejected(String),
}

/// 与机器人的会话：建立连接、查询存活、发布请求并等待确认
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn connect(&self) -> Result<(), ChannelError>;

    fn is_connected(&self) -> bool;

    /// 重新建立连接；默认等同于 connect
    async fn reconnect(&self) -> Result<(), ChannelError> {
        self.connect().await
    }

    /// 发布一条请求到 topic，返回机器人的确认数据
    async fn publish(&self, topic: &str, payload: Value) -> Result<Value, ChannelError>;
}
