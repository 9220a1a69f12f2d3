//! 动作参数 schema
//!
//! 优先读取 schemas_dir/<name>.json 覆盖文件，否则由 schemars 从类型化参数结构体生成。

use std::path::Path;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::AgentError;

/// move 动作参数：三个数值轴
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, JsonSchema)]
pub struct MoveArgs {
    /// 前后速度（正值向前）
    pub x: f64,
    /// 左右速度（正值向左）
    pub y: f64,
    /// 转向速度
    pub z: f64,
}

/// 由类型生成 JSON schema，去掉 $schema/title 等模型不需要的顶层键
pub fn schema_of<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| empty_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// 无参数动作的 schema
pub fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// 读取 dir/<name>.json；文件不存在返回 None，内容非法返回 ConfigError
pub fn load_schema_override(dir: &Path, name: &str) -> Result<Option<Value>, AgentError> {
    let path = dir.join(format!("{name}.json"));
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| AgentError::ConfigError(format!("{}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| AgentError::ConfigError(format!("{}: {e}", path.display())))?;
    if !value.is_object() {
        return Err(AgentError::ConfigError(format!(
            "{}: schema must be a JSON object",
            path.display()
        )));
    }
    tracing::debug!(action = %name, path = %path.display(), "loaded schema override");
    Ok(Some(value))
}
