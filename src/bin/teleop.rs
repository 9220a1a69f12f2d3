//! Doggo 键盘遥控：逐行读取按键，经重连守卫直接发送 sport 命令（不经过模型）

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use doggo::config::{load_config, AppConfig};
use doggo::robot::{
    parse_key, CommandChannel, DryRunChannel, ReconnectGuard, TeleopKey, WsCommandChannel,
    TELEOP_HELP,
};

/// Doggo teleop - drive the robot from the keyboard
#[derive(Parser)]
#[command(name = "doggo-teleop", version, about)]
struct Cli {
    /// Extra config file layered over config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot relay URL (overrides config)
    #[arg(long, env = "DOGGO_ROBOT_URL")]
    url: Option<String>,

    /// Log commands instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    doggo::observability::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    if let Some(url) = cli.url {
        cfg.robot.url = url;
    }

    let channel: Arc<dyn CommandChannel> = if cli.dry_run {
        Arc::new(DryRunChannel::new())
    } else {
        Arc::new(WsCommandChannel::new(cfg.robot.url.clone()))
    };
    let guard = ReconnectGuard::new(
        channel,
        Duration::from_secs(cfg.robot.connect_timeout_secs),
        Duration::from_secs(cfg.robot.ack_timeout_secs),
    )
    .with_topic(cfg.robot.topic.clone());

    println!("Connecting to robot at {}...", cfg.robot.url);
    guard
        .ensure_connected()
        .await
        .context("Failed to connect to robot")?;
    println!("Connected successfully!\n\n{TELEOP_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("\nEnter command: ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_key(&line) {
            TeleopKey::Send { label, request } => {
                println!("{label}");
                if let Err(e) = guard.send_sport(request).await {
                    eprintln!("Error: {e}");
                }
            }
            TeleopKey::Quit => {
                println!("Exiting...");
                break;
            }
            TeleopKey::Unknown(key) => println!("Unknown command: {key}"),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}
