//! 动作执行器
//!
//! 持有 ActionCatalog 与全局超时，execute(action, args) 在超时内调用回调，
//! 超时转为 ActionError::Timeout；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::ActionError;
use crate::tools::{Action, ActionCatalog};

/// 动作执行器：对每次回调施加超时并记录审计日志
pub struct ActionExecutor {
    catalog: ActionCatalog,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(catalog: ActionCatalog, timeout_secs: u64) -> Self {
        Self::with_timeout(catalog, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(catalog: ActionCatalog, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub async fn execute(
        &self,
        action: &Arc<Action>,
        raw_arguments: String,
    ) -> Result<String, ActionError> {
        let start = Instant::now();
        let args_preview = args_preview(&raw_arguments);
        let result = timeout(self.timeout, action.invoke(raw_arguments)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": action.name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "action");

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ActionError::Timeout(self.timeout.as_secs())),
        }
    }
}

fn args_preview(args: &str) -> String {
    if args.chars().count() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ModeScope;

    #[tokio::test]
    async fn test_execute_passes_result_through() {
        let action = Arc::new(Action::new("hello", "", ModeScope::AwakeOnly, |args| async move {
            Ok(format!("got {args}"))
        }));
        let executor = ActionExecutor::new(ActionCatalog::new(), 5);
        let out = executor.execute(&action, "{}".to_string()).await.unwrap();
        assert_eq!(out, "got {}");
    }

    #[tokio::test]
    async fn test_execute_maps_timeout() {
        let action = Arc::new(Action::new("slow", "", ModeScope::AwakeOnly, |_| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }));
        let executor = ActionExecutor::with_timeout(ActionCatalog::new(), Duration::from_millis(20));
        let err = executor.execute(&action, String::new()).await.unwrap_err();
        assert!(matches!(err, ActionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_execute_keeps_action_error() {
        let action = Arc::new(Action::new("move", "", ModeScope::AwakeOnly, |_| async move {
            Err(ActionError::InvalidArguments("bad".to_string()))
        }));
        let executor = ActionExecutor::new(ActionCatalog::new(), 5);
        let err = executor.execute(&action, "nope".to_string()).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments(m) if m == "bad"));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = "x".repeat(500);
        let preview = args_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
        assert_eq!(args_preview("{}"), "{}");
    }
}
