//! 空跑通道：不连接真实机器人，只记录并打印每条请求（dead 模式与测试使用）

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::robot::{ChannelError, CommandChannel};

#[derive(Debug, Default)]
pub struct DryRunChannel {
    connected: AtomicBool,
    fail_reconnects: AtomicBool,
    connects: AtomicUsize,
    published: Mutex<Vec<(String, Value)>>,
}

impl DryRunChannel {
    /// 初始为断开状态，首次发布前会被守卫重连
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let channel = Self::default();
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    /// 模拟链路掉线
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// 之后的 connect/reconnect 全部失败
    pub fn fail_reconnects(&self, fail: bool) {
        self.fail_reconnects.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// 已发布的 (topic, payload)，按发布顺序
    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandChannel for DryRunChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        if self.fail_reconnects.load(Ordering::SeqCst) {
            return Err(ChannelError::Connect("dry run: connection refused".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Value) -> Result<Value, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        tracing::info!(topic = %topic, payload = %payload, "dry run: robot request");
        if let Ok(mut p) = self.published.lock() {
            p.push((topic.to_string(), payload));
        }
        Ok(json!({"status": "dry_run"}))
    }
}
