//! 模式状态：清醒 / 睡眠
//!
//! 进程内唯一跨 utterance 的共享状态。由调用方以 Arc<ModeState> 注入调度循环与两个切换动作，
//! 只有 awake / sleep 动作会写入；目录可见性与 system prompt 选择都从这里读。

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// 模式取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Awake,
    Asleep,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Awake => write!(f, "awake"),
            Mode::Asleep => write!(f, "asleep"),
        }
    }
}

/// 模式开关；仅存于内存，进程重启后回到启动参数
#[derive(Debug)]
pub struct ModeState {
    awake: AtomicBool,
}

impl ModeState {
    pub fn new(initial: Mode) -> Self {
        Self {
            awake: AtomicBool::new(initial == Mode::Awake),
        }
    }

    pub fn current(&self) -> Mode {
        if self.awake.load(Ordering::SeqCst) {
            Mode::Awake
        } else {
            Mode::Asleep
        }
    }

    /// 记录新模式并返回给模型看的确认文本；幂等，不会失败
    pub fn set(&self, mode: Mode) -> &'static str {
        let previous = self.awake.swap(mode == Mode::Awake, Ordering::SeqCst);
        if previous != (mode == Mode::Awake) {
            tracing::info!(mode = %mode, "mode changed");
        }
        match mode {
            Mode::Asleep => "Doggo is now sleeping",
            Mode::Awake => "Doggo is now awake",
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(Mode::Awake)
    }
}
