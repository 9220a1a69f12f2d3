//! 外壳编排器：单消费者命令队列
//!
//! 后台任务独占 AgentComponents，按到达顺序逐条处理 utterance；处理期间到达的语句排队等待，不会交错。

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::agent::{process_utterance, AgentComponents};
use crate::core::AgentError;
use crate::react::{DispatchEvent, DispatchOutcome};

type Reply = oneshot::Sender<Result<Option<DispatchOutcome>, AgentError>>;

/// 发往编排器的命令
#[derive(Debug)]
pub enum Command {
    /// 处理一条用户语句；reply 为 None 时不回传结果
    Utterance { text: String, reply: Option<Reply> },
    /// 处理完已排队的语句后退出
    Quit,
}

/// 编排器句柄：投递命令、等待结果、关闭
pub struct ShellHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

/// 启动后台工作任务
pub fn spawn_shell(
    components: AgentComponents,
    event_tx: Option<mpsc::UnboundedSender<DispatchEvent>>,
) -> ShellHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();

    let worker = tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Utterance { text, reply } => {
                    let result = process_utterance(&components, &text, event_tx.as_ref()).await;
                    if let Err(e) = &result {
                        tracing::error!(error = %e, utterance = %text, "utterance failed");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                Command::Quit => break,
            }
        }
        tracing::debug!("shell worker stopped");
    });

    ShellHandle { cmd_tx, worker }
}

impl ShellHandle {
    /// 投递语句，不等待结果
    pub fn enqueue(&self, text: impl Into<String>) -> Result<(), AgentError> {
        self.cmd_tx
            .send(Command::Utterance {
                text: text.into(),
                reply: None,
            })
            .map_err(|_| AgentError::ShellClosed)
    }

    /// 投递语句并等待其处理完成
    pub async fn submit(
        &self,
        text: impl Into<String>,
    ) -> Result<Option<DispatchOutcome>, AgentError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Utterance {
                text: text.into(),
                reply: Some(tx),
            })
            .map_err(|_| AgentError::ShellClosed)?;
        rx.await.map_err(|_| AgentError::ShellClosed)?
    }

    /// 发送 Quit 并等待工作任务结束（已排队的语句会先处理完）
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(Command::Quit);
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "shell worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::create_agent_components;
    use crate::config::AppConfig;
    use crate::llm::{Completion, ScriptedCompletion};
    use crate::memory::ActionRequest;
    use crate::robot::DryRunChannel;
    use crate::voice::RecordingVoice;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_queued_utterances_run_in_order() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            Completion::actions(vec![ActionRequest::new("call_1", "hello", "{}")]),
            Completion::text("Hi!"),
            Completion::text("Bye!"),
        ]));
        let voice = Arc::new(RecordingVoice::new());
        let channel = Arc::new(DryRunChannel::connected());
        let components = create_agent_components(
            &AppConfig::default(),
            channel.clone(),
            voice.clone(),
            completion.clone(),
        )
        .unwrap();

        let shell = spawn_shell(components, None);
        shell.enqueue("say hello").unwrap();
        shell.enqueue("   ").unwrap();
        let last = shell.submit("goodbye").await.unwrap().unwrap();
        assert_eq!(last.spoken, vec!["Bye!".to_string()]);
        shell.shutdown().await;

        assert_eq!(voice.spoken(), vec!["Hi!".to_string(), "Bye!".to_string()]);
        assert_eq!(channel.published().len(), 1);
        assert_eq!(completion.call_count(), 3);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let components = create_agent_components(
            &AppConfig::default(),
            Arc::new(DryRunChannel::new()),
            Arc::new(RecordingVoice::new()),
            Arc::new(ScriptedCompletion::default()),
        )
        .unwrap();
        let shell = spawn_shell(components, None);
        let tx = shell.cmd_tx.clone();
        shell.shutdown().await;
        assert!(tx
            .send(Command::Utterance {
                text: "hi".into(),
                reply: None
            })
            .is_err());
    }
}
