//! 重连守卫
//!
//! 每条发往机器人的命令先经过这里：查询通道存活，断开则在限定时间内重连，再发布并等待确认。
//! 守卫本身不缓存连接状态，每次都重新查询。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::robot::{ChannelError, CommandChannel, SportRequest, SPORT_TOPIC};

pub struct ReconnectGuard {
    channel: Arc<dyn CommandChannel>,
    topic: String,
    connect_timeout: Duration,
    ack_timeout: Duration,
}

impl ReconnectGuard {
    pub fn new(channel: Arc<dyn CommandChannel>, connect_timeout: Duration, ack_timeout: Duration) -> Self {
        Self {
            channel,
            topic: SPORT_TOPIC.to_string(),
            connect_timeout,
            ack_timeout,
        }
    }

    /// 覆盖 sport 请求的 topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn channel(&self) -> &Arc<dyn CommandChannel> {
        &self.channel
    }

    /// 通道断开时重连；重连失败或超时即返回错误
    pub async fn ensure_connected(&self) -> Result<(), ChannelError> {
        if self.channel.is_connected() {
            return Ok(());
        }
        tracing::warn!("robot channel is stale, reconnecting");
        match timeout(self.connect_timeout, self.channel.reconnect()).await {
            Ok(Ok(())) => {
                tracing::info!("robot channel reconnected");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "robot reconnect failed");
                Err(e)
            }
            Err(_) => Err(ChannelError::Timeout {
                op: "reconnect",
                secs: self.connect_timeout.as_secs(),
            }),
        }
    }

    pub async fn publish(&self, topic: &str, payload: Value) -> Result<Value, ChannelError> {
        self.ensure_connected().await?;
        tracing::debug!(topic = %topic, payload = %payload, "publishing robot request");
        timeout(self.ack_timeout, self.channel.publish(topic, payload))
            .await
            .map_err(|_| ChannelError::Timeout {
                op: "publish",
                secs: self.ack_timeout.as_secs(),
            })?
    }

    pub async fn send_sport(&self, request: SportRequest) -> Result<Value, ChannelError> {
        self.publish(&self.topic, request.to_payload()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::{DryRunChannel, SportCommand};

    fn guard(channel: Arc<DryRunChannel>) -> ReconnectGuard {
        ReconnectGuard::new(channel, Duration::from_secs(1), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_reconnects_stale_channel() {
        let channel = Arc::new(DryRunChannel::new());
        let g = guard(channel.clone());
        assert!(!channel.is_connected());

        g.send_sport(SportCommand::Hello.into()).await.unwrap();
        assert_eq!(channel.connect_count(), 1);
        assert_eq!(channel.published().len(), 1);
        assert_eq!(channel.published()[0].0, SPORT_TOPIC);
    }

    #[tokio::test]
    async fn test_skips_reconnect_when_live() {
        let channel = Arc::new(DryRunChannel::connected());
        let g = guard(channel.clone());
        g.send_sport(SportCommand::StandUp.into()).await.unwrap();
        g.send_sport(SportCommand::Damp.into()).await.unwrap();
        assert_eq!(channel.connect_count(), 0);
        assert_eq!(channel.published().len(), 2);
    }

    #[tokio::test]
    async fn test_reconnect_failure_surfaces() {
        let channel = Arc::new(DryRunChannel::new());
        channel.fail_reconnects(true);
        let g = guard(channel.clone());
        let err = g.send_sport(SportCommand::Hello.into()).await.unwrap_err();
        assert!(matches!(err, ChannelError::Connect(_)));
        assert!(channel.published().is_empty());
    }

    #[tokio::test]
    async fn test_custom_topic() {
        let channel = Arc::new(DryRunChannel::connected());
        let g = guard(channel.clone()).with_topic("rt/test");
        g.send_sport(SportCommand::StopMove.into()).await.unwrap();
        assert_eq!(channel.published()[0].0, "rt/test");
    }
}
