//! Doggo - 语音控制外壳
//!
//! 入口：初始化日志、加载配置、连接机器人（alive 模式），然后循环 听取 → 转写 → 调度，直到 Ctrl+C / SIGTERM。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use doggo::agent::{create_agent_components, create_completion_from_config};
use doggo::config::{load_config, AppConfig};
use doggo::core::{
    spawn_shell, Mode, RobotStopCleanup, ShutdownCoordinator, ShutdownManager, ShutdownReason,
};
use doggo::robot::{CommandChannel, DryRunChannel, WsCommandChannel};
use doggo::voice::{create_voice_io, VoiceMode};

/// Doggo - voice control shell for a legged robot
#[derive(Parser)]
#[command(name = "doggo", version, about)]
struct Cli {
    /// Extra config file layered over config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Voice preset (burt, drill_seargent, knox, pirate)
    #[arg(short, long, env = "DOGGO_VOICE")]
    voice: Option<String>,

    /// Dead mode: no microphone and no robot connection, commands are only logged
    #[arg(long)]
    dead: bool,

    /// Start asleep
    #[arg(long)]
    asleep: bool,

    /// Repeat each heard utterance before acting on it
    #[arg(long)]
    echo: bool,

    /// Read utterances from stdin instead of the microphone
    #[arg(long)]
    text: bool,

    /// Input audio device name
    #[arg(long)]
    input_device: Option<String>,

    /// Output audio device name
    #[arg(long)]
    output_device: Option<String>,
}

impl Cli {
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(voice) = &self.voice {
            cfg.voice.voice = voice.clone();
        }
        if self.dead {
            cfg.app.alive = false;
        }
        if self.asleep {
            cfg.app.initial_mode = Mode::Asleep;
        }
        if self.echo {
            cfg.app.echo = true;
        }
        if self.input_device.is_some() {
            cfg.voice.input_device = self.input_device.clone();
        }
        if self.output_device.is_some() {
            cfg.voice.output_device = self.output_device.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    doggo::observability::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    cli.apply(&mut cfg);
    let alive = cfg.app.alive;

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let channel: Arc<dyn CommandChannel> = if alive {
        Arc::new(WsCommandChannel::new(cfg.robot.url.clone()))
    } else {
        tracing::info!("dead mode: robot commands are logged, not sent");
        Arc::new(DryRunChannel::new())
    };

    let (input, output) = create_voice_io(
        &cfg,
        VoiceMode {
            listen: alive && !cli.text,
        },
    )
    .context("Failed to set up voice")?;
    let completion = create_completion_from_config(&cfg).context("Failed to create completion service")?;
    let components = create_agent_components(&cfg, channel, output, completion)
        .context("Failed to build agent")?;
    let guard = components.guard.clone();

    if alive {
        if let Err(e) = guard.ensure_connected().await {
            tracing::warn!(error = %e, url = %cfg.robot.url, "robot not reachable yet, will retry on first command");
        }
    }

    if alive && !cli.text {
        println!("Starting doggo, listening on audio input...");
    } else {
        println!("Starting doggo, type what you want it to do (Ctrl+D to quit)");
    }

    let shell = spawn_shell(components, None);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait_for_shutdown() => break,
            next = input.next_utterance() => match next {
                Ok(Some(text)) => {
                    if let Ok(Some(outcome)) = shell.submit(text).await {
                        tracing::debug!(rounds = outcome.rounds, exit = ?outcome.exit, "done");
                    }
                }
                Ok(None) => {
                    shutdown.shutdown(ShutdownReason::InputClosed);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not get utterance");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
        }
    }

    shell.shutdown().await;
    let mut coordinator = ShutdownCoordinator::new();
    if alive {
        coordinator.register(RobotStopCleanup::new(guard));
    }
    coordinator.run_cleanup().await;
    Ok(())
}
