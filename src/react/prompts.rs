//! 按模式选择的 system prompt
//!
//! 从 prompts_dir 读取 awake.md / asleep.md，缺失时使用内置文本。

use std::path::Path;

use crate::core::Mode;

const AWAKE_FALLBACK: &str = "You are Doggo, a friendly robot dog. You are awake. \
Use the available actions to do what the user asks, and answer with a short, playful spoken reply.";

const ASLEEP_FALLBACK: &str = "You are Doggo, a robot dog, and you are asleep. \
You cannot move. Only wake up if the user clearly asks you to; otherwise reply with a short sleepy answer.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompts {
    pub awake: String,
    pub asleep: String,
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self {
            awake: AWAKE_FALLBACK.to_string(),
            asleep: ASLEEP_FALLBACK.to_string(),
        }
    }
}

fn read_prompt(dir: &Path, file: &str, fallback: &str) -> String {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "prompt file is empty, using built-in prompt");
            fallback.to_string()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "prompt file unavailable, using built-in prompt");
            fallback.to_string()
        }
    }
}

impl SystemPrompts {
    pub fn load(dir: &Path) -> Self {
        Self {
            awake: read_prompt(dir, "awake.md", AWAKE_FALLBACK),
            asleep: read_prompt(dir, "asleep.md", ASLEEP_FALLBACK),
        }
    }

    pub fn for_mode(&self, mode: Mode) -> &str {
        match mode {
            Mode::Awake => &self.awake,
            Mode::Asleep => &self.asleep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("awake.md"), "be bouncy\n").unwrap();
        let prompts = SystemPrompts::load(dir.path());
        assert_eq!(prompts.for_mode(Mode::Awake), "be bouncy");
        assert_eq!(prompts.for_mode(Mode::Asleep), ASLEEP_FALLBACK);
    }

    #[test]
    fn test_missing_dir_falls_back() {
        let prompts = SystemPrompts::load(Path::new("/nonexistent/prompts"));
        assert_eq!(prompts, SystemPrompts::default());
    }
}
