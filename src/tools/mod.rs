pub mod control;
pub mod executor;
pub mod motion;
pub mod registry;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use crate::core::{AgentError, ModeState};
use crate::robot::ReconnectGuard;

pub use control::control_actions;
pub use executor::ActionExecutor;
pub use motion::{motion_actions, parse_move_args};
pub use registry::{Action, ActionCatalog, ActionFn, ActionSpec, ModeScope};
pub use schema::{empty_schema, load_schema_override, schema_of, MoveArgs};

/// 内置动作目录：awake, sleep, stand_up, lie_down, hello, move, stop
///
/// schemas_dir 中存在 `<name>.json` 时覆盖对应动作的参数 schema。
pub fn builtin_catalog(
    mode: Arc<ModeState>,
    guard: Arc<ReconnectGuard>,
    schemas_dir: Option<&Path>,
) -> Result<ActionCatalog, AgentError> {
    let mut catalog = ActionCatalog::new();
    for mut action in control_actions(mode).into_iter().chain(motion_actions(guard)) {
        if let Some(dir) = schemas_dir {
            if let Some(schema) = load_schema_override(dir, &action.name)? {
                action = action.with_schema(schema);
            }
        }
        catalog.register(action)?;
    }
    tracing::debug!(actions = ?catalog.names(), "action catalog built");
    Ok(catalog)
}
