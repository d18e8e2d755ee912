//! # OneHop Runner Library / OneHop Runner 库
//!
//! This library provides the core functionality for the OneHop Runner tool,
//! an orchestrator for long-running, out-of-process TRAPI one-hop test
//! executions with addressable JSON report storage.
//!
//! 此库为 OneHop Runner 工具提供核心功能，
//! 这是一个用于长时间运行的、进程外 TRAPI one-hop 测试执行的编排器，
//! 并提供可寻址的 JSON 报告存储。
//!
//! ## Modules / 模块
//!
//! - `core` - Run lifecycle models, worker process management and the test harness
//! - `infra` - Infrastructure services like command spawning and output bridging
//! - `report` - Report addressing and the pluggable report storage backends
//!
//! - `core` - 运行生命周期模型、工作进程管理和测试编排器
//! - `infra` - 基础设施服务，如命令派生和输出桥接
//! - `report` - 报告寻址和可插拔的报告存储后端

pub mod core;
pub mod infra;
pub mod report;

// Re-export commonly used items
pub use self::core::config;
pub use self::core::harness;
pub use self::core::worker;
pub use self::report::addressing;

/// Initializes the application's logging based on the `RUST_LOG` environment
/// variable.
///
/// Binaries and test harnesses call this once at startup; the library itself
/// only emits `tracing` events and never installs a subscriber on its own.
/// Falls back to the `info` level when `RUST_LOG` is unset or unparsable, and
/// is a no-op if a global subscriber is already installed.
///
/// 基于 `RUST_LOG` 环境变量初始化应用程序的日志。
/// 二进制程序和测试装置在启动时调用一次；库本身只发出 `tracing` 事件，
/// 绝不会自行安装订阅器。`RUST_LOG` 未设置或无法解析时回退到 `info` 级别，
/// 已安装全局订阅器时则为空操作。
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
