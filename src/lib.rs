//! Doggo - 语音驱动的四足机器人控制外壳
//!
//! 模块划分：
//! - **agent**: 组件装配与单条语句处理入口
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、清醒/睡眠模式、命令队列编排、优雅关闭
//! - **llm**: 补全服务抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 单条语句的对话缓冲
//! - **react**: 有界调度循环、按模式选择的 system prompt、过程事件
//! - **robot**: 命令通道（WebSocket / 空跑）、sport 命令、重连守卫
//! - **tools**: 动作目录、执行器、参数 schema、内置动作
//! - **voice**: 麦克风 / 扬声器 / 转写 / 合成（ElevenLabs、cpal、控制台）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod robot;
pub mod tools;
pub mod voice;
