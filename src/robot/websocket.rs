//! WebSocket 命令通道
//!
//! 连接机器人侧的中继服务，JSON 帧协议：
//! - 请求 `{"type":"request","id","topic","data"}`
//! - 确认 `{"type":"response","id","ok","data","error"}`
//!
//! 写任务从 mpsc 取帧发送；读任务按 id 把确认交给等待中的 oneshot。连接断开时所有等待方收到 Transport 错误。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::robot::{ChannelError, CommandChannel};

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, ChannelError>>>>>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundFrame<'a> {
    Request {
        id: &'a str,
        topic: &'a str,
        data: &'a Value,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    Response {
        id: String,
        #[serde(default)]
        ok: bool,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(other)]
    Other,
}

pub struct WsCommandChannel {
    url: String,
    connected: Arc<AtomicBool>,
    /// 每次 connect 递增；旧连接的读任务退出时不会覆盖新连接的状态
    generation: Arc<AtomicU64>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Pending,
}

impl WsCommandChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connected: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            outbound: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// 等待确认期间持有；无论收到确认、出错还是被超时丢弃，都会移除 pending 中的条目
struct PendingEntry {
    pending: Pending,
    id: String,
}

impl PendingEntry {
    fn register(pending: &Pending, id: String) -> (Self, oneshot::Receiver<Result<Value, ChannelError>>) {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut map) = pending.lock() {
            map.insert(id.clone(), tx);
        }
        (
            Self {
                pending: pending.clone(),
                id,
            },
            rx,
        )
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        if let Ok(mut map) = self.pending.lock() {
            map.remove(&self.id);
        }
    }
}

fn fail_all(pending: &Pending, reason: &str) {
    if let Ok(mut map) = pending.lock() {
        for (_, tx) in map.drain() {
            let _ = tx.send(Err(ChannelError::Transport(reason.to_string())));
        }
    }
}

fn handle_inbound(text: &str, pending: &Pending) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("Ignoring unparseable robot frame: {e}");
            return;
        }
    };
    if let InboundFrame::Response { id, ok, data, error } = frame {
        let waiter = pending.lock().ok().and_then(|mut map| map.remove(&id));
        match waiter {
            Some(tx) => {
                let result = if ok {
                    Ok(data)
                } else {
                    Err(ChannelError::Rejected(
                        error.unwrap_or_else(|| "unspecified".to_string()),
                    ))
                };
                let _ = tx.send(result);
            }
            None => tracing::debug!(id = %id, "response for unknown request"),
        }
    }
}

#[async_trait]
impl CommandChannel for WsCommandChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let writer_connected = self.connected.clone();
        let writer_generation = self.generation.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write.send(Message::Text(frame)).await {
                    tracing::warn!("robot channel send error: {e}");
                    if writer_generation.load(Ordering::SeqCst) == generation {
                        writer_connected.store(false, Ordering::SeqCst);
                    }
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader_connected = self.connected.clone();
        let reader_generation = self.generation.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => handle_inbound(&text, &pending),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::warn!("robot channel closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("robot channel read error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            if reader_generation.load(Ordering::SeqCst) == generation {
                reader_connected.store(false, Ordering::SeqCst);
                fail_all(&pending, "connection closed");
            }
        });

        if let Ok(mut slot) = self.outbound.lock() {
            *slot = Some(tx);
        }
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(url = %self.url, "robot channel connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Value) -> Result<Value, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let id = uuid::Uuid::new_v4().to_string();
        let frame = serde_json::to_string(&OutboundFrame::Request {
            id: &id,
            topic,
            data: &payload,
        })
        .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let (_entry, rx) = PendingEntry::register(&self.pending, id);

        let sent = self
            .outbound
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|out| out.send(frame).is_ok()))
            .unwrap_or(false);
        if !sent {
            self.connected.store(false, Ordering::SeqCst);
            return Err(ChannelError::NotConnected);
        }

        rx.await
            .map_err(|_| ChannelError::Transport("connection closed".to_string()))?
    }
}

impl WsCommandChannel {
    /// 仍在等待确认的请求数
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().map(|map| map.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// 本地中继：把每个请求回显为确认，api_id 为 0 时拒绝
    async fn spawn_relay() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut tx, mut rx) = ws.split();
            while let Some(Ok(msg)) = rx.next().await {
                if let Message::Text(text) = msg {
                    let req: Value = serde_json::from_str(&text).unwrap();
                    let reply = if req["data"]["api_id"] == 0 {
                        json!({"type": "response", "id": req["id"], "ok": false, "error": "bad api"})
                    } else {
                        json!({"type": "response", "id": req["id"], "ok": true, "data": {"topic": req["topic"]}})
                    };
                    tx.send(Message::Text(reply.to_string())).await.unwrap();
                }
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_publish_roundtrip_through_relay() {
        let url = spawn_relay().await;
        let channel = WsCommandChannel::new(url);
        assert!(!channel.is_connected());
        channel.connect().await.unwrap();
        assert!(channel.is_connected());

        let ack = channel
            .publish("rt/api/sport/request", json!({"api_id": 1004}))
            .await
            .unwrap();
        assert_eq!(ack["topic"], "rt/api/sport/request");

        let err = channel.publish("rt/api/sport/request", json!({"api_id": 0})).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(m) if m == "bad api"));
    }

    /// 只收帧、从不确认的中继
    async fn spawn_silent_relay() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (_tx, mut rx) = ws.split();
            while let Some(Ok(_)) = rx.next().await {}
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_unacknowledged_publishes_do_not_accumulate() {
        use crate::robot::ReconnectGuard;
        use std::time::Duration;

        let url = spawn_silent_relay().await;
        let channel = Arc::new(WsCommandChannel::new(url));
        channel.connect().await.unwrap();
        let guard = ReconnectGuard::new(
            channel.clone(),
            Duration::from_secs(1),
            Duration::from_millis(50),
        );

        for _ in 0..3 {
            let err = guard
                .publish("rt/api/sport/request", json!({"api_id": 1004}))
                .await
                .unwrap_err();
            assert!(matches!(err, ChannelError::Timeout { op: "publish", .. }));
        }
        assert!(channel.is_connected());
        assert_eq!(channel.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_acknowledged_publish_clears_pending() {
        let url = spawn_relay().await;
        let channel = WsCommandChannel::new(url);
        channel.connect().await.unwrap();
        channel
            .publish("rt/api/sport/request", json!({"api_id": 1016}))
            .await
            .unwrap();
        assert_eq!(channel.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_publish_before_connect() {
        let channel = WsCommandChannel::new("ws://127.0.0.1:1");
        assert!(matches!(
            channel.publish("t", json!({})).await,
            Err(ChannelError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let channel = WsCommandChannel::new(format!("ws://{addr}"));
        assert!(matches!(channel.connect().await, Err(ChannelError::Connect(_))));
    }

    #[test]
    fn test_inbound_frame_for_unknown_id_is_ignored() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        handle_inbound(r#"{"type":"response","id":"nope","ok":true}"#, &pending);
        handle_inbound(r#"{"type":"heartbeat"}"#, &pending);
        handle_inbound("garbage", &pending);
        assert!(pending.lock().unwrap().is_empty());
    }
}
