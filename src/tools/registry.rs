//! 动作目录
//!
//! 每个动作是一条扁平记录：名称、描述（供模型理解）、参数 schema、模式范围、回调函数引用。
//! ActionCatalog 保持注册顺序且名称唯一；visible(mode) 给出当前模式可用的子序列，lookup 按名查找。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;

use crate::core::{ActionError, AgentError, Mode};
use crate::tools::schema::empty_schema;

/// 动作回调：接收原始参数字符串，返回简短的结果文本
pub type ActionFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String, ActionError>> + Send + Sync>;

/// 动作在哪些模式下对模型可见
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeScope {
    AwakeOnly,
    AsleepOnly,
    Both,
}

impl ModeScope {
    pub fn admits(self, mode: Mode) -> bool {
        matches!(
            (self, mode),
            (ModeScope::Both, _)
                | (ModeScope::AwakeOnly, Mode::Awake)
                | (ModeScope::AsleepOnly, Mode::Asleep)
        )
    }
}

/// 发给补全服务的动作描述 {name, description, parameters}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 动作记录；启动时构建，之后不可变
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
    pub mode_scope: ModeScope,
    callback: ActionFn,
}

impl Action {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        mode_scope: ModeScope,
        callback: F,
    ) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ActionError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: empty_schema(),
            mode_scope,
            callback: Arc::new(move |args: String| callback(args).boxed()),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = schema;
        self
    }

    pub fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameter_schema.clone(),
        }
    }

    /// 直接调用回调（不带超时与审计，见 ActionExecutor）
    pub async fn invoke(&self, raw_arguments: String) -> Result<String, ActionError> {
        (self.callback)(raw_arguments).await
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("mode_scope", &self.mode_scope)
            .finish_non_exhaustive()
    }
}

/// 有序动作目录，名称唯一
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    actions: Vec<Arc<Action>>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Action) -> Result<(), AgentError> {
        if self.actions.iter().any(|a| a.name == action.name) {
            return Err(AgentError::DuplicateActionName(action.name));
        }
        self.actions.push(Arc::new(action));
        Ok(())
    }

    /// 当前模式可见的动作，保持注册顺序
    pub fn visible(&self, mode: Mode) -> Vec<Arc<Action>> {
        self.actions
            .iter()
            .filter(|a| a.mode_scope.admits(mode))
            .cloned()
            .collect()
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Action>, AgentError> {
        self.actions
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAction(name.to_string()))
    }

    /// 在某一模式的可见子集中查找；不在其中即视为 UnknownAction
    pub fn lookup_visible(&self, mode: Mode, name: &str) -> Result<Arc<Action>, AgentError> {
        self.actions
            .iter()
            .find(|a| a.name == name && a.mode_scope.admits(mode))
            .cloned()
            .ok_or_else(|| AgentError::UnknownAction(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
