//! 模式切换动作：awake（仅睡眠时可见）/ sleep（仅清醒时可见）

use std::sync::Arc;

use crate::core::{Mode, ModeState};
use crate::tools::{Action, ModeScope};

pub const AWAKE: &str = "awake";
pub const SLEEP: &str = "sleep";

/// 两个切换动作；共享同一个注入的 ModeState
pub fn control_actions(mode: Arc<ModeState>) -> Vec<Action> {
    let wake_state = mode.clone();
    let awake = Action::new(
        AWAKE,
        "Wake up the doggo so it can move again",
        ModeScope::AsleepOnly,
        move |_args| {
            let state = wake_state.clone();
            async move { Ok(state.set(Mode::Awake).to_string()) }
        },
    );

    let sleep_state = mode;
    let sleep = Action::new(
        SLEEP,
        "Put the doggo to sleep; it ignores movement commands until woken up",
        ModeScope::AwakeOnly,
        move |_args| {
            let state = sleep_state.clone();
            async move { Ok(state.set(Mode::Asleep).to_string()) }
        },
    );

    vec![awake, sleep]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_then_awake() {
        let state = Arc::new(ModeState::new(Mode::Awake));
        let actions = control_actions(state.clone());
        let sleep = actions.iter().find(|a| a.name == SLEEP).unwrap();
        let awake = actions.iter().find(|a| a.name == AWAKE).unwrap();

        assert_eq!(sleep.invoke("{}".into()).await.unwrap(), "Doggo is now sleeping");
        assert_eq!(state.current(), Mode::Asleep);
        assert_eq!(awake.invoke(String::new()).await.unwrap(), "Doggo is now awake");
        assert_eq!(state.current(), Mode::Awake);
    }

    #[test]
    fn test_scopes_are_exclusive() {
        let actions = control_actions(Arc::new(ModeState::default()));
        assert_eq!(actions[0].mode_scope, ModeScope::AsleepOnly);
        assert_eq!(actions[1].mode_scope, ModeScope::AwakeOnly);
    }
}
